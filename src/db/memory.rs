//! Store em memória para testes.
//!
//! Reproduz as mesmas garantias do `PgBookingStore`: a revalidação do horário
//! e a escrita acontecem sob o mesmo lock, e as escritas condicionais
//! respeitam o status esperado.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::BookingStore,
    models::{
        booking::{Booking, BookingStatus, CancellationDetails, NewBooking, PaymentStatus},
        history::{BookingHistory, NewBookingHistory},
    },
    services::availability::TimeSlotCheckOptions,
};

#[derive(Default)]
struct MemoryState {
    bookings: Vec<Booking>,
    history: Vec<BookingHistory>,
    sequences: HashMap<NaiveDate, u32>,
    next_booking_id: i64,
    next_history_id: i64,
    // Simula outro escritor vencendo a corrida na próxima escrita condicional
    interfering_status: Option<BookingStatus>,
}

impl MemoryState {
    fn booking_mut(&mut self, id: i64) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    fn push_history(&mut self, booking_id: i64, entry: NewBookingHistory) {
        self.next_history_id += 1;
        self.history.push(BookingHistory {
            id: self.next_history_id,
            booking_id,
            actor_id: entry.actor_id,
            change_type: entry.change_type,
            old_values: entry.old_values,
            new_values: entry.new_values,
            reason: entry.reason,
            created_at: Utc::now(),
        });
    }

    fn has_conflict(&self, provider_id: i64, slot: &TimeSlotCheckOptions) -> bool {
        self.bookings
            .iter()
            .any(|b| b.provider_id == provider_id && slot.conflicts_with(b))
    }

    /// Aplica a interferência pendente e devolve se o status esperado ainda vale.
    fn precondition_holds(&mut self, id: i64, expected: BookingStatus) -> bool {
        if let Some(status) = self.interfering_status.take() {
            if let Some(booking) = self.booking_mut(id) {
                booking.status = status;
            }
        }
        self.bookings.iter().any(|b| b.id == id && b.status == expected)
    }
}

#[derive(Default)]
pub struct InMemoryBookingStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("Mutex do store envenenado")))
    }

    /// Na próxima escrita condicional, outro "escritor" muda o status para `status` antes.
    pub fn simulate_concurrent_write(&self, status: BookingStatus) -> Result<(), AppError> {
        self.lock()?.interfering_status = Some(status);
        Ok(())
    }

    pub fn history_len(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.history.len())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError> {
        Ok(self.lock()?.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_number(&self, booking_number: &str) -> Result<Option<Booking>, AppError> {
        Ok(self
            .lock()?
            .bookings
            .iter()
            .find(|b| b.booking_number == booking_number)
            .cloned())
    }

    async fn find_active_bookings(
        &self,
        provider_id: i64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        let state = self.lock()?;
        let mut found: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| {
                b.provider_id == provider_id
                    && b.status.occupies_slot()
                    && b.scheduled_start_time < range_end
                    && b.scheduled_end_time > range_start
            })
            .cloned()
            .collect();
        found.sort_by_key(|b| b.scheduled_start_time);
        Ok(found)
    }

    async fn next_booking_sequence(&self, day: NaiveDate) -> Result<u32, AppError> {
        let mut state = self.lock()?;
        let value = state.sequences.entry(day).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn insert(
        &self,
        booking: NewBooking,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<Booking, AppError> {
        let mut state = self.lock()?;

        if state.has_conflict(booking.provider_id, slot) {
            return Err(AppError::TimeSlotConflict { provider_id: booking.provider_id });
        }

        state.next_booking_id += 1;
        let now = Utc::now();
        let created = Booking {
            id: state.next_booking_id,
            uuid: booking.uuid,
            booking_number: booking.booking_number,
            provider_id: booking.provider_id,
            customer_id: booking.customer_id,
            time_slot_id: booking.time_slot_id,
            guest_name: booking.guest_name,
            guest_phone: booking.guest_phone,
            guest_email: booking.guest_email,
            service_name: booking.service_name,
            service_category: booking.service_category,
            estimated_duration_minutes: booking.estimated_duration_minutes,
            scheduled_start_time: booking.scheduled_start_time,
            scheduled_end_time: booking.scheduled_end_time,
            actual_start_time: None,
            actual_end_time: None,
            status: BookingStatus::Pending,
            service_price: booking.service_price,
            discount_amount: booking.discount_amount,
            tax_rate: booking.tax_rate,
            tax_amount: booking.tax_amount,
            tip_amount: Decimal::ZERO,
            total_price: booking.total_price,
            currency: booking.currency,
            payment_status: PaymentStatus::Pending,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_fee: None,
            source: booking.source,
            notes: booking.notes,
            created_at: now,
            updated_at: now,
        };

        state.bookings.push(created.clone());
        state.push_history(created.id, history);

        Ok(created)
    }

    async fn conditional_update_status(
        &self,
        id: i64,
        expected: BookingStatus,
        new_status: BookingStatus,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        if !state.precondition_holds(id, expected) {
            return Ok(0);
        }

        let now = Utc::now();
        if let Some(booking) = state.booking_mut(id) {
            booking.status = new_status;
            match new_status {
                BookingStatus::InProgress => booking.actual_start_time = Some(now),
                BookingStatus::Completed => booking.actual_end_time = Some(now),
                _ => {}
            }
            booking.updated_at = now;
        }
        state.push_history(id, history);

        Ok(1)
    }

    async fn cancel(
        &self,
        id: i64,
        expected: BookingStatus,
        details: CancellationDetails,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut state = self.lock()?;
        if !state.precondition_holds(id, expected) {
            return Ok(0);
        }

        if let Some(booking) = state.booking_mut(id) {
            booking.status = BookingStatus::Cancelled;
            booking.cancelled_at = Some(details.cancelled_at);
            booking.cancelled_by = details.cancelled_by;
            booking.cancellation_reason = details.reason;
            booking.cancellation_fee = Some(details.fee);
            booking.updated_at = Utc::now();
        }
        state.push_history(id, history);

        Ok(1)
    }

    async fn update_schedule(
        &self,
        id: i64,
        provider_id: i64,
        expected: BookingStatus,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut state = self.lock()?;

        if state.has_conflict(provider_id, slot) {
            return Err(AppError::TimeSlotConflict { provider_id });
        }
        if !state.precondition_holds(id, expected) {
            return Ok(0);
        }

        if let Some(booking) = state.booking_mut(id) {
            booking.scheduled_start_time = slot.start();
            booking.scheduled_end_time = slot.end();
            booking.estimated_duration_minutes = slot.duration_minutes();
            booking.updated_at = Utc::now();
        }
        state.push_history(id, history);

        Ok(1)
    }

    async fn list_history(&self, booking_id: i64) -> Result<Vec<BookingHistory>, AppError> {
        Ok(self
            .lock()?
            .history
            .iter()
            .filter(|h| h.booking_id == booking_id)
            .cloned()
            .collect())
    }
}
