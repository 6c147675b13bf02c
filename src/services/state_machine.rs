// src/services/state_machine.rs

use thiserror::Error;

use crate::models::booking::BookingStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Status atual inválido: '{0}'")]
    InvalidCurrentStatus(String),

    #[error("Status de destino inválido: '{0}'")]
    InvalidTargetStatus(String),

    #[error("Não é possível mudar de '{from}' para '{to}'")]
    DisallowedTransition {
        from: BookingStatus,
        to: BookingStatus,
        allowed: Vec<BookingStatus>,
    },
}

impl TransitionError {
    /// Lista de transições permitidas a partir do status atual (para a UX do cliente).
    pub fn allowed(&self) -> &[BookingStatus] {
        match self {
            TransitionError::DisallowedTransition { allowed, .. } => allowed,
            _ => &[],
        }
    }
}

// =========================================================================
//  TABELA DE TRANSIÇÕES
// =========================================================================

pub fn allowed_transitions(status: BookingStatus) -> &'static [BookingStatus] {
    use crate::models::booking::BookingStatus::*;

    match status {
        Pending => &[Confirmed, Cancelled, NoShow],
        Confirmed => &[InProgress, Cancelled, NoShow],
        InProgress => &[Completed, Cancelled],
        Completed | Cancelled | NoShow => &[],
    }
}

pub fn allowed_transitions_for(status: &str) -> Result<&'static [BookingStatus], TransitionError> {
    let status = status
        .parse::<BookingStatus>()
        .map_err(|e| TransitionError::InvalidCurrentStatus(e.0))?;
    Ok(allowed_transitions(status))
}

pub fn is_terminal_state(status: BookingStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Valida a aresta `current -> target`. `current == target` nunca é permitido.
pub fn ensure_transition(current: BookingStatus, target: BookingStatus) -> Result<(), TransitionError> {
    let allowed = allowed_transitions(current);
    if allowed.contains(&target) {
        return Ok(());
    }
    Err(TransitionError::DisallowedTransition {
        from: current,
        to: target,
        allowed: allowed.to_vec(),
    })
}

/// Versão "wire": valida os dois valores como chegam da API ou do banco.
pub fn validate_transition(
    current: &str,
    target: &str,
) -> Result<(BookingStatus, BookingStatus), TransitionError> {
    let from = current
        .parse::<BookingStatus>()
        .map_err(|e| TransitionError::InvalidCurrentStatus(e.0))?;
    let to = target
        .parse::<BookingStatus>()
        .map_err(|e| TransitionError::InvalidTargetStatus(e.0))?;

    ensure_transition(from, to)?;
    Ok((from, to))
}
