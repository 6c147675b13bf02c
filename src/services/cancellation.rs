// src/services/cancellation.rs

use chrono::Duration;
use rust_decimal::Decimal;

use crate::services::pricing::round_money;

/// Política de multa por cancelamento: recebe quanto falta para o início
/// (negativo se o horário já passou) e o total do agendamento.
pub trait CancellationPolicy: Send + Sync {
    fn fee(&self, until_start: Duration, total_price: Decimal) -> Decimal;
}

// Qualquer closure serve como política
impl<F> CancellationPolicy for F
where
    F: Fn(Duration, Decimal) -> Decimal + Send + Sync,
{
    fn fee(&self, until_start: Duration, total_price: Decimal) -> Decimal {
        self(until_start, total_price)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCancellationFee;

impl CancellationPolicy for NoCancellationFee {
    fn fee(&self, _until_start: Duration, _total_price: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

/// Cobra `late_fee_rate` do total quando o aviso é menor que `min_notice`.
#[derive(Debug, Clone, Copy)]
pub struct NoticeWindowPolicy {
    pub min_notice: Duration,
    pub late_fee_rate: Decimal,
}

impl NoticeWindowPolicy {
    pub fn new(min_notice_hours: i64, late_fee_rate: Decimal) -> Self {
        Self {
            // Valores fora da faixa saturam em vez de estourar
            min_notice: Duration::try_hours(min_notice_hours).unwrap_or(Duration::MAX),
            late_fee_rate,
        }
    }
}

impl CancellationPolicy for NoticeWindowPolicy {
    fn fee(&self, until_start: Duration, total_price: Decimal) -> Decimal {
        if until_start >= self.min_notice {
            return Decimal::ZERO;
        }
        // Estouro vira o total; `clamp_fee` limita de qualquer forma
        total_price
            .checked_mul(self.late_fee_rate)
            .map(round_money)
            .unwrap_or(total_price)
    }
}

/// A multa nunca é negativa nem maior que o total.
pub fn clamp_fee(fee: Decimal, total_price: Decimal) -> Decimal {
    fee.max(Decimal::ZERO).min(total_price.max(Decimal::ZERO))
}
