// src/services/booking_service.rs

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{provider_cache_keys, BookingCache},
    common::error::AppError,
    db::BookingStore,
    models::{
        booking::{
            format_booking_number, Booking, BookingStatus, CancellationDetails,
            CreateBookingRequest, NewBooking, MAX_DAILY_SEQUENCE,
        },
        history::{BookingHistory, NewBookingHistory},
    },
    services::{
        audit::AuditTrail,
        availability::{window_end, AvailabilityEngine, SlotQuery, TimeSlot, TimeSlotCheckOptions},
        cancellation::{clamp_fee, CancellationPolicy},
        pricing::{calculate_pricing, PricingBreakdown},
        state_machine::{ensure_transition, is_terminal_state},
    },
};

const DEFAULT_WORKDAY_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
const DEFAULT_WORKDAY_CLOSE: NaiveTime = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

// Prazo da invalidação em segundo plano
const CACHE_INVALIDATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Regras operacionais da barbearia (vêm da configuração).
#[derive(Debug, Clone, Copy)]
pub struct BookingRules {
    /// Folga entre atendimentos aplicada na remarcação e na grade de horários.
    pub buffer_minutes: i64,
    pub workday_open: NaiveTime,
    pub workday_close: NaiveTime,
    pub slot_step_minutes: i64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            buffer_minutes: 0,
            workday_open: DEFAULT_WORKDAY_OPEN,
            workday_close: DEFAULT_WORKDAY_CLOSE,
            slot_step_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TipQuote {
    pub booking_id: i64,
    #[schema(example = "15.00")]
    pub tip_amount: Decimal,
    #[schema(example = "112.20")]
    pub total_with_tip: Decimal,
    pub currency: String,
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    cache: Arc<dyn BookingCache>,
    availability: AvailabilityEngine,
    audit: AuditTrail,
    cancellation_policy: Arc<dyn CancellationPolicy>,
    rules: BookingRules,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        cache: Arc<dyn BookingCache>,
        cancellation_policy: Arc<dyn CancellationPolicy>,
        rules: BookingRules,
    ) -> Self {
        Self {
            availability: AvailabilityEngine::new(store.clone()),
            audit: AuditTrail::new(store.clone()),
            store,
            cache,
            cancellation_policy,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    // =============================================================================
    //  MUTAÇÕES
    // =============================================================================

    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
        actor_id: Option<i64>,
    ) -> Result<Booking, AppError> {
        request.validate()?;

        let pricing = calculate_pricing(
            request.service_price,
            request.discount_amount,
            request.tax_rate,
            request.currency.as_deref(),
        )?;

        // Criação não usa buffer nem exclusão
        let slot = TimeSlotCheckOptions::new(request.scheduled_start_time, request.scheduled_end_time);
        if !self.availability.check_availability(request.provider_id, &slot).await? {
            return Err(AppError::TimeSlotConflict { provider_id: request.provider_id });
        }

        let today = Utc::now().date_naive();
        let booking_number = self.next_booking_number(today).await?;

        let new_booking = NewBooking {
            uuid: Uuid::new_v4(),
            booking_number,
            provider_id: request.provider_id,
            customer_id: request.customer_id,
            time_slot_id: request.time_slot_id,
            guest_name: request.guest_name,
            guest_phone: request.guest_phone,
            guest_email: request.guest_email,
            service_name: request.service_name,
            service_category: request.service_category,
            estimated_duration_minutes: slot.duration_minutes(),
            scheduled_start_time: slot.start(),
            scheduled_end_time: slot.end(),
            service_price: pricing.service_price,
            discount_amount: pricing.discount_amount,
            tax_rate: pricing.tax_rate,
            tax_amount: pricing.tax_amount,
            total_price: pricing.total_price,
            currency: pricing.currency,
            source: request.source,
            notes: request.notes,
        };

        let history = AuditTrail::created(&new_booking, actor_id);
        let booking = self.store.insert(new_booking, &slot, history).await?;

        tracing::info!(
            booking_id = booking.id,
            booking_number = %booking.booking_number,
            provider_id = booking.provider_id,
            total = %booking.total_price,
            "Agendamento criado"
        );

        self.invalidate_provider_cache(booking.provider_id).await;
        Ok(booking)
    }

    pub async fn update_status(
        &self,
        id: i64,
        new_status: BookingStatus,
        actor_id: Option<i64>,
    ) -> Result<Booking, AppError> {
        let booking = self.get_booking(id).await?;
        ensure_transition(booking.status, new_status)?;

        // Cancelamento pelo status calcula multa e metadados, mas registra `status_changed`
        if new_status == BookingStatus::Cancelled {
            return self
                .cancel_loaded(booking, None, actor_id, AuditTrail::cancelled_by_status_change)
                .await;
        }

        let history = AuditTrail::status_changed(booking.status, new_status, actor_id);
        let affected = self.store
            .conditional_update_status(id, booking.status, new_status, history)
            .await?;

        if affected == 0 {
            tracing::warn!(booking_id = id, expected = %booking.status, "Atualização de status perdeu a corrida");
            return Err(AppError::ConcurrentModification { booking_id: id });
        }

        tracing::info!(booking_id = id, from = %booking.status, to = %new_status, "Status do agendamento alterado");

        self.invalidate_provider_cache(booking.provider_id).await;
        self.get_booking(id).await
    }

    pub async fn reschedule_booking(
        &self,
        id: i64,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        actor_id: Option<i64>,
        reason: Option<String>,
    ) -> Result<Booking, AppError> {
        let booking = self.get_booking(id).await?;

        if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(AppError::RescheduleNotAllowed { status: booking.status });
        }

        let slot = TimeSlotCheckOptions::new(new_start, new_end)
            .with_exclude_booking(id)
            .with_buffer_time(self.rules.buffer_minutes);

        if !self.availability.check_availability(booking.provider_id, &slot).await? {
            return Err(AppError::TimeSlotConflict { provider_id: booking.provider_id });
        }

        let history = AuditTrail::rescheduled(&booking, new_start, new_end, actor_id, reason);
        let affected = self.store
            .update_schedule(id, booking.provider_id, booking.status, &slot, history)
            .await?;

        if affected == 0 {
            return Err(AppError::ConcurrentModification { booking_id: id });
        }

        tracing::info!(
            booking_id = id,
            provider_id = booking.provider_id,
            start = %new_start,
            end = %new_end,
            "Agendamento remarcado"
        );

        self.invalidate_provider_cache(booking.provider_id).await;
        self.get_booking(id).await
    }

    pub async fn cancel_booking(
        &self,
        id: i64,
        reason: Option<String>,
        actor_id: Option<i64>,
    ) -> Result<Booking, AppError> {
        let booking = self.get_booking(id).await?;

        if is_terminal_state(booking.status) {
            return Err(AppError::CancellationNotAllowed { status: booking.status });
        }
        ensure_transition(booking.status, BookingStatus::Cancelled)?;

        self.cancel_loaded(booking, reason, actor_id, AuditTrail::cancelled).await
    }

    async fn cancel_loaded(
        &self,
        booking: Booking,
        reason: Option<String>,
        actor_id: Option<i64>,
        history_entry: fn(&Booking, &CancellationDetails) -> NewBookingHistory,
    ) -> Result<Booking, AppError> {
        let now = Utc::now();
        let until_start = booking.scheduled_start_time - now;
        let fee = clamp_fee(
            self.cancellation_policy.fee(until_start, booking.total_price),
            booking.total_price,
        );

        let details = CancellationDetails {
            cancelled_at: now,
            cancelled_by: actor_id,
            reason,
            fee,
        };

        let history = history_entry(&booking, &details);
        let affected = self.store
            .cancel(booking.id, booking.status, details, history)
            .await?;

        if affected == 0 {
            return Err(AppError::ConcurrentModification { booking_id: booking.id });
        }

        tracing::info!(
            booking_id = booking.id,
            previous = %booking.status,
            fee = %fee,
            hours_until_start = until_start.num_hours(),
            "Agendamento cancelado"
        );

        self.invalidate_provider_cache(booking.provider_id).await;
        self.get_booking(booking.id).await
    }

    // =============================================================================
    //  CONSULTAS
    // =============================================================================

    /// Sem buffer, com a mesma regra usada na criação.
    pub async fn check_availability(
        &self,
        provider_id: i64,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<bool, AppError> {
        if duration_minutes <= 0 {
            return Err(AppError::InvalidInput("A duração deve ser positiva.".into()));
        }

        let slot = TimeSlotCheckOptions::new(start, window_end(start, duration_minutes)?);
        self.availability.check_availability(provider_id, &slot).await
    }

    pub async fn get_booking(&self, id: i64) -> Result<Booking, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AppError::BookingNotFound(id))
    }

    pub async fn get_booking_by_number(&self, booking_number: &str) -> Result<Booking, AppError> {
        self.store
            .find_by_number(booking_number)
            .await?
            .ok_or_else(|| AppError::BookingNumberNotFound(booking_number.to_string()))
    }

    pub async fn booking_history(&self, id: i64) -> Result<Vec<BookingHistory>, AppError> {
        // Garante 404 para agendamento inexistente (e não lista vazia)
        self.get_booking(id).await?;
        self.audit.history(id).await
    }

    pub async fn provider_schedule(
        &self,
        provider_id: i64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        if range_end <= range_start {
            return Err(AppError::InvalidInput("O período informado é inválido.".into()));
        }
        self.store.find_active_bookings(provider_id, range_start, range_end).await
    }

    pub async fn available_slots(
        &self,
        provider_id: i64,
        day: NaiveDate,
        duration_minutes: i64,
    ) -> Result<Vec<TimeSlot>, AppError> {
        let query = SlotQuery {
            day,
            open: self.rules.workday_open,
            close: self.rules.workday_close,
            duration_minutes,
            step_minutes: self.rules.slot_step_minutes,
            buffer_minutes: self.rules.buffer_minutes,
        };
        self.availability.available_slots(provider_id, &query).await
    }

    pub async fn quote_tip(&self, id: i64, tip_amount: Decimal) -> Result<TipQuote, AppError> {
        let booking = self.get_booking(id).await?;
        let pricing = PricingBreakdown::from(&booking);

        Ok(TipQuote {
            booking_id: booking.id,
            tip_amount,
            total_with_tip: pricing.add_tip(tip_amount)?,
            currency: pricing.currency,
        })
    }

    // =============================================================================
    //  AUXILIARES
    // =============================================================================

    async fn next_booking_number(&self, day: NaiveDate) -> Result<String, AppError> {
        let sequence = self.store.next_booking_sequence(day).await?;
        if sequence == 0 || sequence > MAX_DAILY_SEQUENCE {
            return Err(AppError::InternalServerError(anyhow!(
                "Sequência diária de agendamentos esgotada para {day} ({sequence})"
            )));
        }
        Ok(format_booking_number(day, sequence))
    }

    /// Dispara a invalidação em segundo plano; a mutação já foi confirmada no banco.
    async fn invalidate_provider_cache(&self, provider_id: i64) {
        let cache = Arc::clone(&self.cache);
        let keys = provider_cache_keys(provider_id);

        tokio::spawn(async move {
            match tokio::time::timeout(CACHE_INVALIDATION_TIMEOUT, cache.invalidate(&keys)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(provider_id, error = %e, "Falha ao invalidar o cache do barbeiro");
                }
                Err(_) => {
                    tracing::warn!(
                        provider_id,
                        timeout_ms = CACHE_INVALIDATION_TIMEOUT.as_millis() as u64,
                        "Invalidação do cache do barbeiro expirou"
                    );
                }
            }
        });
    }
}
