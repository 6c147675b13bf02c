// src/services/availability.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::BookingStore,
    models::booking::Booking,
};

/// Teto para buffer, passo e duração na geração de horários (um dia).
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;

/// Converte minutos em `Duration` sem pânico para valores fora da faixa.
pub fn minutes(value: i64) -> Result<Duration, AppError> {
    Duration::try_minutes(value)
        .ok_or_else(|| AppError::InvalidInput(format!("Valor de minutos fora da faixa: {value}")))
}

/// Fim da janela `start + minutes`, com erro em vez de estouro.
pub fn window_end(start: DateTime<Utc>, duration_minutes: i64) -> Result<DateTime<Utc>, AppError> {
    start
        .checked_add_signed(minutes(duration_minutes)?)
        .ok_or_else(|| AppError::InvalidInput("A janela ultrapassa o calendário suportado.".into()))
}

/// Consulta de conflito de horário. Imutável depois de montada:
/// os modificadores consomem `self` e devolvem uma nova instância.
///
/// Padrão: sem exclusão e sem buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlotCheckOptions {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_booking_id: Option<i64>,
    buffer_minutes: Option<i64>,
}

impl TimeSlotCheckOptions {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            exclude_booking_id: None,
            buffer_minutes: None,
        }
    }

    /// Ignora o próprio agendamento (usado na remarcação).
    pub fn with_exclude_booking(mut self, booking_id: i64) -> Self {
        self.exclude_booking_id = Some(booking_id);
        self
    }

    /// Folga aplicada nos dois lados da janela candidata. `0` desliga o buffer.
    pub fn with_buffer_time(mut self, minutes: i64) -> Self {
        self.buffer_minutes = (minutes != 0).then_some(minutes);
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn exclude_booking_id(&self) -> Option<i64> {
        self.exclude_booking_id
    }

    pub fn buffer_minutes(&self) -> Option<i64> {
        self.buffer_minutes
    }

    /// Minutos cobertos pela janela; fração de minuto conta como minuto cheio.
    pub fn duration_minutes(&self) -> i32 {
        let seconds = (self.end - self.start).num_seconds();
        let minutes = seconds.div_euclid(60) + i64::from(seconds.rem_euclid(60) > 0);
        i32::try_from(minutes).unwrap_or(i32::MAX)
    }

    // Buffers absurdos saturam nos limites do calendário
    fn buffer(&self) -> Option<Duration> {
        self.buffer_minutes
            .map(|b| Duration::try_minutes(b).unwrap_or(Duration::MAX))
    }

    pub fn effective_start(&self) -> DateTime<Utc> {
        match self.buffer() {
            Some(buffer) => self.start.checked_sub_signed(buffer).unwrap_or(DateTime::<Utc>::MIN_UTC),
            None => self.start,
        }
    }

    pub fn effective_end(&self) -> DateTime<Utc> {
        match self.buffer() {
            Some(buffer) => self.end.checked_add_signed(buffer).unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => self.end,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.end <= self.start {
            return Err(AppError::InvalidInput(
                "O horário de término deve ser posterior ao início.".into(),
            ));
        }
        if self.end - self.start < Duration::minutes(1) {
            return Err(AppError::InvalidInput("A janela precisa ter pelo menos um minuto.".into()));
        }
        if self.buffer_minutes.is_some_and(|b| b < 0) {
            return Err(AppError::InvalidInput("O buffer não pode ser negativo.".into()));
        }
        if self.buffer_minutes.is_some_and(|b| b > MAX_WINDOW_MINUTES) {
            return Err(AppError::InvalidInput(format!(
                "O buffer não pode passar de {MAX_WINDOW_MINUTES} minutos."
            )));
        }
        Ok(())
    }

    /// Predicado de conflito: só a janela candidata recebe o buffer.
    pub fn conflicts_with(&self, existing: &Booking) -> bool {
        existing.status.occupies_slot()
            && Some(existing.id) != self.exclude_booking_id
            && existing.scheduled_start_time < self.effective_end()
            && existing.scheduled_end_time > self.effective_start()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Janela de trabalho de um dia para geração de horários livres.
#[derive(Debug, Clone, Copy)]
pub struct SlotQuery {
    pub day: NaiveDate,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub duration_minutes: i64,
    pub step_minutes: i64,
    pub buffer_minutes: i64,
}

#[derive(Clone)]
pub struct AvailabilityEngine {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityEngine {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn find_conflicts(
        &self,
        provider_id: i64,
        options: &TimeSlotCheckOptions,
    ) -> Result<Vec<Booking>, AppError> {
        options.validate()?;

        let existing = self.store
            .find_active_bookings(provider_id, options.effective_start(), options.effective_end())
            .await?;

        Ok(existing.into_iter().filter(|b| options.conflicts_with(b)).collect())
    }

    pub async fn check_availability(
        &self,
        provider_id: i64,
        options: &TimeSlotCheckOptions,
    ) -> Result<bool, AppError> {
        let conflicts = self.find_conflicts(provider_id, options).await?;

        if !conflicts.is_empty() {
            tracing::debug!(
                provider_id,
                conflicts = conflicts.len(),
                start = %options.start(),
                end = %options.end(),
                "Horário indisponível"
            );
        }

        Ok(conflicts.is_empty())
    }

    pub async fn available_slots(
        &self,
        provider_id: i64,
        query: &SlotQuery,
    ) -> Result<Vec<TimeSlot>, AppError> {
        if query.duration_minutes <= 0 || query.step_minutes <= 0 || query.buffer_minutes < 0 {
            return Err(AppError::InvalidInput(
                "Duração, intervalo e buffer precisam ser valores positivos.".into(),
            ));
        }
        if [query.duration_minutes, query.step_minutes, query.buffer_minutes]
            .iter()
            .any(|m| *m > MAX_WINDOW_MINUTES)
        {
            return Err(AppError::InvalidInput(format!(
                "Duração, intervalo e buffer não podem passar de {MAX_WINDOW_MINUTES} minutos."
            )));
        }
        if query.close <= query.open {
            return Err(AppError::InvalidInput("O expediente informado é inválido.".into()));
        }

        let day_open = query.day.and_time(query.open).and_utc();
        let day_close = query.day.and_time(query.close).and_utc();
        let buffer = minutes(query.buffer_minutes)?;
        let out_of_calendar =
            || AppError::InvalidInput("A data informada está fora do calendário suportado.".into());

        // Uma única leitura cobre o dia inteiro (com as folgas)
        let existing = self.store
            .find_active_bookings(
                provider_id,
                day_open.checked_sub_signed(buffer).ok_or_else(out_of_calendar)?,
                day_close.checked_add_signed(buffer).ok_or_else(out_of_calendar)?,
            )
            .await?;

        let duration = minutes(query.duration_minutes)?;
        let step = minutes(query.step_minutes)?;

        let mut slots = Vec::new();
        let mut cursor = day_open;
        while let Some(end) = cursor.checked_add_signed(duration).filter(|end| *end <= day_close) {
            let candidate = TimeSlotCheckOptions::new(cursor, end)
                .with_buffer_time(query.buffer_minutes);

            if !existing.iter().any(|b| candidate.conflicts_with(b)) {
                slots.push(TimeSlot { start: cursor, end });
            }
            cursor = match cursor.checked_add_signed(step) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn effective_window_equals_raw_without_buffer() {
        let opts = TimeSlotCheckOptions::new(at(10, 0), at(11, 0));
        assert_eq!(opts.effective_start(), at(10, 0));
        assert_eq!(opts.effective_end(), at(11, 0));

        let zero = opts.with_buffer_time(0);
        assert_eq!(zero.buffer_minutes(), None);
        assert_eq!(zero.effective_end(), at(11, 0));
    }

    #[test]
    fn buffer_widens_both_ends() {
        let opts = TimeSlotCheckOptions::new(at(10, 0), at(11, 0)).with_buffer_time(15);
        assert_eq!(opts.effective_start(), at(9, 45));
        assert_eq!(opts.effective_end(), at(11, 15));
        assert_eq!(opts.start(), at(10, 0));
        assert_eq!(opts.duration_minutes(), 60);
    }

    #[test]
    fn rejects_inverted_window_and_negative_buffer() {
        assert!(TimeSlotCheckOptions::new(at(11, 0), at(10, 0)).validate().is_err());
        assert!(TimeSlotCheckOptions::new(at(10, 0), at(10, 0)).validate().is_err());
        assert!(TimeSlotCheckOptions::new(at(10, 0), at(11, 0)).with_buffer_time(-5).validate().is_err());
        assert!(TimeSlotCheckOptions::new(at(10, 0), at(11, 0))
            .with_buffer_time(i64::MAX / 2)
            .validate()
            .is_err());
    }

    #[test]
    fn windows_shorter_than_a_minute_are_rejected() {
        let start = at(10, 0);
        let opts = TimeSlotCheckOptions::new(start, start + Duration::seconds(30));
        assert!(matches!(opts.validate(), Err(AppError::InvalidInput(_))));

        // Fração restante arredonda para cima
        let opts = TimeSlotCheckOptions::new(start, start + Duration::seconds(90));
        assert!(opts.validate().is_ok());
        assert_eq!(opts.duration_minutes(), 2);
    }

    #[test]
    fn huge_buffer_saturates_instead_of_panicking() {
        let opts = TimeSlotCheckOptions::new(at(10, 0), at(11, 0)).with_buffer_time(i64::MAX);
        assert_eq!(opts.effective_start(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(opts.effective_end(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn window_end_reports_out_of_range_minutes() {
        assert_eq!(window_end(at(10, 0), 30).ok(), Some(at(10, 30)));
        assert!(matches!(window_end(at(10, 0), i64::MAX / 2), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            window_end(DateTime::<Utc>::MAX_UTC, 1),
            Err(AppError::InvalidInput(_))
        ));
    }
}
