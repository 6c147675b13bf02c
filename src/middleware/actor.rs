// src/middleware/actor.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::common::error::AppError;

// O nome do nosso cabeçalho HTTP customizado
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Quem está executando a ação. `None` = ação do sistema (cabeçalho ausente).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext(pub Option<i64>);

impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_ID_HEADER) else {
            return Ok(ActorContext(None));
        };

        let value_str = value.to_str().map_err(|_| {
            AppError::InvalidInput("Cabeçalho X-Actor-ID contém caracteres inválidos.".into())
        })?;

        let actor_id = value_str.trim().parse::<i64>().map_err(|_| {
            AppError::InvalidInput("Cabeçalho X-Actor-ID inválido (não é numérico).".into())
        })?;

        Ok(ActorContext(Some(actor_id)))
    }
}
