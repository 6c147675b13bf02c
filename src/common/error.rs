use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::booking::BookingStatus;
use crate::services::{pricing::PricingError, state_machine::TransitionError};

/// Categoria fechada do erro. Quem chama decide pelo `kind()`, nunca pelo texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidStateTransition,
    Validation,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Agendamento {0} não encontrado")]
    BookingNotFound(i64),

    #[error("Agendamento '{0}' não encontrado")]
    BookingNumberNotFound(String),

    #[error("O horário solicitado já está ocupado para o barbeiro {provider_id}")]
    TimeSlotConflict { provider_id: i64 },

    // Perdeu a corrida do UPDATE condicional
    #[error("O agendamento {booking_id} foi alterado por outra requisição")]
    ConcurrentModification { booking_id: i64 },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Agendamentos com status '{status}' não podem ser cancelados")]
    CancellationNotAllowed { status: BookingStatus },

    #[error("Agendamentos com status '{status}' não podem ser remarcados")]
    RescheduleNotAllowed { status: BookingStatus },

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de cache: {0}")]
    Cache(String),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) | AppError::Pricing(_) => {
                ErrorKind::Validation
            }
            AppError::BookingNotFound(_) | AppError::BookingNumberNotFound(_) => ErrorKind::NotFound,
            AppError::TimeSlotConflict { .. } | AppError::ConcurrentModification { .. } => {
                ErrorKind::Conflict
            }
            AppError::Transition(_)
            | AppError::CancellationNotAllowed { .. }
            | AppError::RescheduleNotAllowed { .. } => ErrorKind::InvalidStateTransition,
            AppError::DatabaseError(_) | AppError::Cache(_) | AppError::InternalServerError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Converte falhas de escrita do Postgres que significam "horário ocupado".
    pub fn from_slot_write(e: sqlx::Error, provider_id: i64) -> Self {
        if let Some(db_err) = e.as_database_error() {
            // 23P01 = exclusion_violation, 40001 = serialization_failure
            if matches!(db_err.code().as_deref(), Some("23P01") | Some("40001")) {
                return AppError::TimeSlotConflict { provider_id };
            }
        }
        AppError::DatabaseError(e)
    }

    /// Na remarcação a varredura de conflitos já voltou vazia: falha de
    /// serialização indica outro escritor, não horário ocupado.
    pub fn from_reschedule_write(e: sqlx::Error, provider_id: i64, booking_id: i64) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().as_deref() == Some("40001") {
                return AppError::ConcurrentModification { booking_id };
            }
        }
        Self::from_slot_write(e, provider_id)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidStateTransition => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            // Retornar todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                })
            }
            AppError::Transition(e) => json!({
                "error": e.to_string(),
                "allowedTransitions": e.allowed(),
            }),
            AppError::CancellationNotAllowed { .. } | AppError::RescheduleNotAllowed { .. } => json!({
                "error": self.to_string(),
                "allowedTransitions": [],
            }),
            // O `tracing` loga a mensagem detalhada; o cliente recebe uma resposta opaca.
            e if e.kind() == ErrorKind::Internal => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                json!({ "error": "Ocorreu um erro inesperado." })
            }
            e => json!({ "error": e.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(AppError::BookingNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::TimeSlotConflict { provider_id: 5 }.kind(), ErrorKind::Conflict);
        assert_eq!(AppError::ConcurrentModification { booking_id: 1 }.kind(), ErrorKind::Conflict);
        assert_eq!(
            AppError::from(TransitionError::InvalidTargetStatus("x".into())).kind(),
            ErrorKind::InvalidStateTransition
        );
        assert_eq!(AppError::from(PricingError::NegativeTip).kind(), ErrorKind::Validation);
        assert_eq!(AppError::Cache("down".into()).kind(), ErrorKind::Internal);
    }

    #[derive(Debug)]
    struct PgCode(&'static str);

    impl std::fmt::Display for PgCode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "SQLSTATE {}", self.0)
        }
    }

    impl std::error::Error for PgCode {}

    impl sqlx::error::DatabaseError for PgCode {
        fn message(&self) -> &str {
            self.0
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn pg_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgCode(code)))
    }

    #[test]
    fn write_failures_map_by_sqlstate() {
        assert!(matches!(
            AppError::from_slot_write(pg_error("23P01"), 5),
            AppError::TimeSlotConflict { provider_id: 5 }
        ));
        assert!(matches!(
            AppError::from_slot_write(pg_error("40001"), 5),
            AppError::TimeSlotConflict { provider_id: 5 }
        ));
        assert!(matches!(AppError::from_slot_write(pg_error("23505"), 5), AppError::DatabaseError(_)));

        // Remarcação: só a exclusão é horário ocupado
        assert!(matches!(
            AppError::from_reschedule_write(pg_error("40001"), 5, 9),
            AppError::ConcurrentModification { booking_id: 9 }
        ));
        assert!(matches!(
            AppError::from_reschedule_write(pg_error("23P01"), 5, 9),
            AppError::TimeSlotConflict { provider_id: 5 }
        ));
    }

    #[test]
    fn maps_kinds_to_http_status() {
        let cases = [
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::BookingNumberNotFound("BK-20240115-0001".into()), StatusCode::NOT_FOUND),
            (AppError::TimeSlotConflict { provider_id: 5 }, StatusCode::CONFLICT),
            (
                AppError::CancellationNotAllowed { status: BookingStatus::Completed },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::InternalServerError(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
