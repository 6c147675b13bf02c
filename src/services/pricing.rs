// src/services/pricing.rs

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::booking::{Booking, DEFAULT_CURRENCY};

// Centavos
const MONEY_SCALE: u32 = 2;
// Mesma precisão das colunas NUMERIC(12,2) e NUMERIC(5,4)
const RATE_SCALE: u32 = 4;

/// Maior valor que cabe em NUMERIC(12,2).
pub const MAX_MONEY: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("O preço do serviço não pode ser negativo")]
    NegativeServicePrice,

    #[error("O desconto não pode ser negativo")]
    NegativeDiscount,

    #[error("O desconto ({discount}) não pode ser maior que o preço do serviço ({price})")]
    DiscountExceedsPrice { discount: Decimal, price: Decimal },

    #[error("A alíquota de imposto deve estar entre 0 e 1 (recebido {0})")]
    TaxRateOutOfRange(Decimal),

    #[error("A gorjeta não pode ser negativa")]
    NegativeTip,

    #[error("Moeda inválida: '{0}' (use o código ISO de 3 letras)")]
    InvalidCurrency(String),

    #[error("O campo {field} aceita no máximo {max_scale} casas decimais")]
    ExcessivePrecision { field: &'static str, max_scale: u32 },

    #[error("O valor de {field} está fora do limite permitido (9999999999.99)")]
    AmountOutOfRange { field: &'static str },
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    #[schema(example = "100.00")]
    pub service_price: Decimal,
    #[schema(example = "10.00")]
    pub discount_amount: Decimal,
    #[schema(example = "0.08")]
    pub tax_rate: Decimal,
    #[schema(example = "7.20")]
    pub tax_amount: Decimal,
    #[schema(example = "90.00")]
    pub sub_total: Decimal,
    #[schema(example = "97.20")]
    pub total_price: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
}

/// Calcula o detalhamento do preço e já valida as entradas.
pub fn calculate_pricing(
    service_price: Decimal,
    discount_amount: Decimal,
    tax_rate: Decimal,
    currency: Option<&str>,
) -> Result<PricingBreakdown, PricingError> {
    let currency = currency.unwrap_or(DEFAULT_CURRENCY);
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(PricingError::InvalidCurrency(currency.to_string()));
    }

    check_inputs(service_price, discount_amount, tax_rate)?;

    // Entradas já limitadas; as operações checadas só evitam pânico
    let sub_total = service_price
        .checked_sub(discount_amount)
        .ok_or(PricingError::AmountOutOfRange { field: "subTotal" })?;
    let tax_amount = sub_total
        .checked_mul(tax_rate)
        .map(round_money)
        .ok_or(PricingError::AmountOutOfRange { field: "taxAmount" })?;
    let total_price = sub_total
        .checked_add(tax_amount)
        .filter(|total| *total <= MAX_MONEY)
        .ok_or(PricingError::AmountOutOfRange { field: "totalPrice" })?;

    Ok(PricingBreakdown {
        service_price,
        discount_amount,
        tax_rate,
        tax_amount,
        sub_total,
        total_price,
        currency: currency.to_string(),
    })
}

fn check_money(field: &'static str, value: Decimal) -> Result<(), PricingError> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(PricingError::ExcessivePrecision { field, max_scale: MONEY_SCALE });
    }
    if value > MAX_MONEY {
        return Err(PricingError::AmountOutOfRange { field });
    }
    Ok(())
}

/// Regras das entradas, verificadas antes de qualquer conta.
fn check_inputs(
    service_price: Decimal,
    discount_amount: Decimal,
    tax_rate: Decimal,
) -> Result<(), PricingError> {
    if service_price < Decimal::ZERO {
        return Err(PricingError::NegativeServicePrice);
    }
    if discount_amount < Decimal::ZERO {
        return Err(PricingError::NegativeDiscount);
    }
    if discount_amount > service_price {
        return Err(PricingError::DiscountExceedsPrice {
            discount: discount_amount,
            price: service_price,
        });
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
        return Err(PricingError::TaxRateOutOfRange(tax_rate));
    }
    check_money("servicePrice", service_price)?;
    check_money("discountAmount", discount_amount)?;
    if tax_rate.normalize().scale() > RATE_SCALE {
        return Err(PricingError::ExcessivePrecision { field: "taxRate", max_scale: RATE_SCALE });
    }
    Ok(())
}

// Reconstrói o detalhamento a partir dos campos persistidos
impl From<&Booking> for PricingBreakdown {
    fn from(booking: &Booking) -> Self {
        Self {
            service_price: booking.service_price,
            discount_amount: booking.discount_amount,
            tax_rate: booking.tax_rate,
            tax_amount: booking.tax_amount,
            sub_total: booking.service_price - booking.discount_amount,
            total_price: booking.total_price,
            currency: booking.currency.clone(),
        }
    }
}

impl PricingBreakdown {
    pub fn validate(&self) -> Result<(), PricingError> {
        check_inputs(self.service_price, self.discount_amount, self.tax_rate)
    }

    /// Cotação com gorjeta. Não altera o detalhamento salvo;
    /// a gorjeta é conciliada no pagamento.
    pub fn add_tip(&self, amount: Decimal) -> Result<Decimal, PricingError> {
        if amount < Decimal::ZERO {
            return Err(PricingError::NegativeTip);
        }
        check_money("tipAmount", amount)?;

        self.total_price
            .checked_add(amount)
            .ok_or(PricingError::AmountOutOfRange { field: "tipAmount" })
    }

    pub fn savings(&self) -> Decimal {
        self.discount_amount
    }

    pub fn effective_price(&self) -> Decimal {
        self.service_price - self.discount_amount
    }
}
