// src/db/booking_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::{
        booking::{Booking, BookingStatus, CancellationDetails, NewBooking},
        history::{BookingHistory, NewBookingHistory},
    },
    services::availability::TimeSlotCheckOptions,
};

/// Contrato de persistência consumido pelo núcleo de agendamentos.
///
/// Toda mutação grava a linha e a entrada de histórico na mesma transação.
/// As escritas condicionais retornam o número de linhas afetadas: `0` significa
/// que outra requisição alterou o status antes (corrida perdida).
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError>;

    async fn find_by_number(&self, booking_number: &str) -> Result<Option<Booking>, AppError>;

    /// Agendamentos ativos (fora `cancelled`/`no_show`) que tocam o intervalo.
    async fn find_active_bookings(
        &self,
        provider_id: i64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    async fn next_booking_sequence(&self, day: NaiveDate) -> Result<u32, AppError>;

    /// Insere revalidando o horário dentro da transação.
    async fn insert(
        &self,
        booking: NewBooking,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<Booking, AppError>;

    async fn conditional_update_status(
        &self,
        id: i64,
        expected: BookingStatus,
        new_status: BookingStatus,
        history: NewBookingHistory,
    ) -> Result<u64, AppError>;

    async fn cancel(
        &self,
        id: i64,
        expected: BookingStatus,
        details: CancellationDetails,
        history: NewBookingHistory,
    ) -> Result<u64, AppError>;

    async fn update_schedule(
        &self,
        id: i64,
        provider_id: i64,
        expected: BookingStatus,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<u64, AppError>;

    async fn list_history(&self, booking_id: i64) -> Result<Vec<BookingHistory>, AppError>;
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  HELPERS (rodam dentro da transação do chamador)
    // =========================================================================

    async fn count_conflicts<'e, E>(
        executor: E,
        provider_id: i64,
        slot: &TimeSlotCheckOptions,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Mesmo predicado do AvailabilityEngine (intervalo semiaberto)
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE provider_id = $1
              AND status NOT IN ('cancelled', 'no_show')
              AND scheduled_start_time < $2
              AND scheduled_end_time > $3
              AND ($4::BIGINT IS NULL OR id <> $4)
            "#,
        )
            .bind(provider_id)
            .bind(slot.effective_end())
            .bind(slot.effective_start())
            .bind(slot.exclude_booking_id())
            .fetch_one(executor)
            .await
            .map_err(|e| AppError::from_slot_write(e, provider_id))
    }

    async fn append_history<'e, E>(
        executor: E,
        booking_id: i64,
        entry: &NewBookingHistory,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO booking_history (
                booking_id, actor_id, change_type, old_values, new_values, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
            .bind(booking_id)
            .bind(entry.actor_id)
            .bind(entry.change_type)
            .bind(&entry.old_values)
            .bind(&entry.new_values)
            .bind(entry.reason.as_deref())
            .execute(executor)
            .await?;

        Ok(())
    }

    async fn begin_serializable(&self) -> Result<sqlx::Transaction<'static, Postgres>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn find_by_number(&self, booking_number: &str) -> Result<Option<Booking>, AppError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_number = $1")
            .bind(booking_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn find_active_bookings(
        &self,
        provider_id: i64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE provider_id = $1
              AND status NOT IN ('cancelled', 'no_show')
              AND scheduled_start_time < $3
              AND scheduled_end_time > $2
            ORDER BY scheduled_start_time ASC
            "#,
        )
            .bind(provider_id)
            .bind(range_start)
            .bind(range_end)
            .fetch_all(&self.pool)
            .await?;

        Ok(bookings)
    }

    async fn next_booking_sequence(&self, day: NaiveDate) -> Result<u32, AppError> {
        // UPSERT atômico: cada chamada reserva o próximo número do dia
        let value = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO booking_number_sequences (day, last_value)
            VALUES ($1, 1)
            ON CONFLICT (day)
            DO UPDATE SET last_value = booking_number_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
            .bind(day)
            .fetch_one(&self.pool)
            .await?;

        u32::try_from(value)
            .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("Sequência inválida: {}", value)))
    }

    async fn insert(
        &self,
        booking: NewBooking,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<Booking, AppError> {
        let provider_id = booking.provider_id;

        // --- INÍCIO DA TRANSAÇÃO (SERIALIZABLE) ---
        // A varredura de conflitos e o INSERT precisam ser atômicos;
        // a EXCLUDE constraint da tabela fecha o mesmo buraco no nível do storage.
        let mut tx = self.begin_serializable().await?;

        if Self::count_conflicts(&mut *tx, provider_id, slot).await? > 0 {
            return Err(AppError::TimeSlotConflict { provider_id });
        }

        let created = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                uuid, booking_number, provider_id, customer_id, time_slot_id,
                guest_name, guest_phone, guest_email,
                service_name, service_category, estimated_duration_minutes,
                scheduled_start_time, scheduled_end_time,
                status, service_price, discount_amount, tax_rate, tax_amount,
                total_price, currency, payment_status, source, notes
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8,
                $9, $10, $11,
                $12, $13,
                'pending', $14, $15, $16, $17,
                $18, $19, 'pending', $20, $21
            )
            RETURNING *
            "#,
        )
            .bind(booking.uuid)
            .bind(&booking.booking_number)
            .bind(booking.provider_id)
            .bind(booking.customer_id)
            .bind(booking.time_slot_id)
            .bind(booking.guest_name.as_deref())
            .bind(booking.guest_phone.as_deref())
            .bind(booking.guest_email.as_deref())
            .bind(&booking.service_name)
            .bind(booking.service_category.as_deref())
            .bind(booking.estimated_duration_minutes)
            .bind(booking.scheduled_start_time)
            .bind(booking.scheduled_end_time)
            .bind(booking.service_price)
            .bind(booking.discount_amount)
            .bind(booking.tax_rate)
            .bind(booking.tax_amount)
            .bind(booking.total_price)
            .bind(&booking.currency)
            .bind(booking.source.as_deref())
            .bind(booking.notes.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::from_slot_write(e, provider_id))?;

        Self::append_history(&mut *tx, created.id, &history).await?;

        tx.commit().await.map_err(|e| AppError::from_slot_write(e, provider_id))?;
        // --- FIM DA TRANSAÇÃO ---

        Ok(created)
    }

    async fn conditional_update_status(
        &self,
        id: i64,
        expected: BookingStatus,
        new_status: BookingStatus,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        // O "AND status = $2" é a trava otimista
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $3,
                actual_start_time = CASE WHEN $3 = 'in_progress'::booking_status THEN NOW() ELSE actual_start_time END,
                actual_end_time = CASE WHEN $3 = 'completed'::booking_status THEN NOW() ELSE actual_end_time END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
            .bind(id)
            .bind(expected)
            .bind(new_status)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        Self::append_history(&mut *tx, id, &history).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn cancel(
        &self,
        id: i64,
        expected: BookingStatus,
        details: CancellationDetails,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                cancelled_at = $3,
                cancelled_by = $4,
                cancellation_reason = $5,
                cancellation_fee = $6,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
            .bind(id)
            .bind(expected)
            .bind(details.cancelled_at)
            .bind(details.cancelled_by)
            .bind(details.reason.as_deref())
            .bind(details.fee)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        Self::append_history(&mut *tx, id, &history).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn update_schedule(
        &self,
        id: i64,
        provider_id: i64,
        expected: BookingStatus,
        slot: &TimeSlotCheckOptions,
        history: NewBookingHistory,
    ) -> Result<u64, AppError> {
        let mut tx = self.begin_serializable().await?;

        if Self::count_conflicts(&mut *tx, provider_id, slot).await? > 0 {
            return Err(AppError::TimeSlotConflict { provider_id });
        }

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET scheduled_start_time = $3,
                scheduled_end_time = $4,
                estimated_duration_minutes = $5,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
            .bind(id)
            .bind(expected)
            .bind(slot.start())
            .bind(slot.end())
            .bind(slot.duration_minutes())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_reschedule_write(e, provider_id, id))?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        Self::append_history(&mut *tx, id, &history).await?;
        tx.commit().await.map_err(|e| AppError::from_reschedule_write(e, provider_id, id))?;

        Ok(result.rows_affected())
    }

    async fn list_history(&self, booking_id: i64) -> Result<Vec<BookingHistory>, AppError> {
        let entries = sqlx::query_as::<_, BookingHistory>(
            "SELECT * FROM booking_history WHERE booking_id = $1 ORDER BY created_at ASC, id ASC",
        )
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }
}
