// src/common/validation.rs

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use crate::{common::error::AppError, models::booking::is_valid_booking_number};

// Limites de sanidade para janelas de atendimento
const MAX_SERVICE_MINUTES: i64 = 12 * 60;
const MAX_QUERY_RANGE_DAYS: i64 = 62;

/// Serviço de validação montado no `AppState` e repassado explicitamente
/// (sem instância global).
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_service_minutes: i64,
    max_query_range: Duration,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestValidator {
    pub fn new() -> Self {
        Self {
            max_service_minutes: MAX_SERVICE_MINUTES,
            max_query_range: Duration::days(MAX_QUERY_RANGE_DAYS),
        }
    }

    pub fn validate<T: Validate>(&self, payload: &T) -> Result<(), AppError> {
        payload.validate()?;
        Ok(())
    }

    pub fn time_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
        if end <= start {
            return Err(AppError::InvalidInput(
                "O horário de término deve ser posterior ao início.".into(),
            ));
        }
        if end - start < Duration::minutes(1) {
            return Err(AppError::InvalidInput("O atendimento precisa durar pelo menos um minuto.".into()));
        }
        if (end - start).num_minutes() > self.max_service_minutes {
            return Err(AppError::InvalidInput(format!(
                "A duração máxima de um atendimento é de {} minutos.",
                self.max_service_minutes
            )));
        }
        Ok(())
    }

    pub fn duration_minutes(&self, minutes: i64) -> Result<(), AppError> {
        if minutes <= 0 || minutes > self.max_service_minutes {
            return Err(AppError::InvalidInput(format!(
                "A duração deve estar entre 1 e {} minutos.",
                self.max_service_minutes
            )));
        }
        Ok(())
    }

    pub fn query_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), AppError> {
        if to <= from {
            return Err(AppError::InvalidInput("O período informado é inválido.".into()));
        }
        if to - from > self.max_query_range {
            return Err(AppError::InvalidInput(format!(
                "O período máximo de consulta é de {} dias.",
                self.max_query_range.num_days()
            )));
        }
        Ok(())
    }

    pub fn booking_number(&self, value: &str) -> Result<(), AppError> {
        if !is_valid_booking_number(value) {
            return Err(AppError::InvalidInput(format!(
                "Número de agendamento inválido: '{value}' (formato BK-AAAAMMDD-NNNN)."
            )));
        }
        Ok(())
    }
}
