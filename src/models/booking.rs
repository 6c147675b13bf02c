// src/models/booking.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const DEFAULT_CURRENCY: &str = "USD";

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,    // Aguardando confirmação do barbeiro
    Confirmed,  // Confirmado
    InProgress, // Em atendimento
    Completed,  // Finalizado
    Cancelled,  // Cancelado
    NoShow,     // Cliente não apareceu
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Status que ocupam a agenda do barbeiro (entram no teste de conflito).
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::NoShow)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Status desconhecido: '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,       // Aberto
    Paid,          // Quitado
    PartiallyPaid, // Pago Parcialmente
    Refunded,      // Estornado
    Failed,        // Falhou no gateway
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "partially_paid" => Ok(PaymentStatus::PartiallyPaid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// --- Número do agendamento (BK-YYYYMMDD-NNNN) ---

pub const BOOKING_NUMBER_PREFIX: &str = "BK-";
pub const MAX_DAILY_SEQUENCE: u32 = 9999;

pub fn format_booking_number(day: NaiveDate, sequence: u32) -> String {
    format!("{}{}-{:04}", BOOKING_NUMBER_PREFIX, day.format("%Y%m%d"), sequence)
}

/// Confere o formato `^BK-\d{8}-\d{4}$`.
pub fn is_valid_booking_number(value: &str) -> bool {
    let Some(rest) = value.strip_prefix(BOOKING_NUMBER_PREFIX) else {
        return false;
    };
    let bytes = rest.as_bytes();
    bytes.len() == 13
        && bytes[8] == b'-'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[schema(example = 42)]
    pub id: i64,
    pub uuid: Uuid,
    #[schema(example = "BK-20240115-0001")]
    pub booking_number: String,

    // Vínculos
    #[schema(example = 5)]
    pub provider_id: i64,
    pub customer_id: Option<i64>, // None = cliente avulso (guest)
    pub time_slot_id: Option<i64>,

    // Contato do cliente avulso
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_email: Option<String>,

    // Serviço
    #[schema(example = "Corte + Barba")]
    pub service_name: String,
    pub service_category: Option<String>,
    #[schema(example = 60)]
    pub estimated_duration_minutes: i32,

    // Agenda
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,

    pub status: BookingStatus,

    // Valores
    #[schema(example = "50.00")]
    pub service_price: Decimal,
    #[schema(example = "0.00")]
    pub discount_amount: Decimal,
    #[schema(example = "0.08")]
    pub tax_rate: Decimal,
    #[schema(example = "4.00")]
    pub tax_amount: Decimal,
    #[schema(example = "0.00")]
    pub tip_amount: Decimal,
    #[schema(example = "54.00")]
    pub total_price: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
    pub payment_status: PaymentStatus,

    // Cancelamento
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub cancellation_fee: Option<Decimal>,

    // Origem
    #[schema(example = "mobile_app")]
    pub source: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_guest(&self) -> bool {
        self.customer_id.is_none()
    }
}

/// Dados prontos para inserção (já precificados e numerados pelo service).
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub uuid: Uuid,
    pub booking_number: String,
    pub provider_id: i64,
    pub customer_id: Option<i64>,
    pub time_slot_id: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_email: Option<String>,
    pub service_name: String,
    pub service_category: Option<String>,
    pub estimated_duration_minutes: i32,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub service_price: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub source: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancellationDetails {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Option<i64>,
    pub reason: Option<String>,
    pub fee: Decimal,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_booking"))]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "O barbeiro informado é inválido."))]
    #[schema(example = 5)]
    pub provider_id: i64,

    pub customer_id: Option<i64>,
    pub time_slot_id: Option<i64>,

    #[validate(length(min = 1, max = 120, message = "O nome do serviço é obrigatório."))]
    #[schema(example = "Corte Masculino")]
    pub service_name: String,

    #[validate(length(max = 60))]
    #[schema(example = "haircut")]
    pub service_category: Option<String>,

    #[schema(example = "2024-01-15T10:00:00Z")]
    pub scheduled_start_time: DateTime<Utc>,
    #[schema(example = "2024-01-15T11:00:00Z")]
    pub scheduled_end_time: DateTime<Utc>,

    #[schema(example = "50.00")]
    pub service_price: Decimal,
    #[serde(default)]
    #[schema(example = "0.00")]
    pub discount_amount: Decimal,
    #[serde(default)]
    #[schema(example = "0.08")]
    pub tax_rate: Decimal,
    #[schema(example = "USD")]
    pub currency: Option<String>,

    #[validate(length(min = 1, max = 120))]
    pub guest_name: Option<String>,
    #[validate(length(min = 6, max = 30))]
    pub guest_phone: Option<String>,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub guest_email: Option<String>,

    #[validate(length(max = 40))]
    #[schema(example = "mobile_app")]
    pub source: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn validate_create_booking(request: &CreateBookingRequest) -> Result<(), ValidationError> {
    if request.scheduled_end_time <= request.scheduled_start_time {
        return Err(ValidationError::new("invalid_time_range")
            .with_message("O horário de término deve ser posterior ao início.".into()));
    }
    if request.scheduled_end_time - request.scheduled_start_time < Duration::minutes(1) {
        return Err(ValidationError::new("time_range_too_short")
            .with_message("O atendimento precisa durar pelo menos um minuto.".into()));
    }
    // Agendamento avulso precisa de pelo menos um nome para contato
    if request.customer_id.is_none() && request.guest_name.is_none() {
        return Err(ValidationError::new("guest_name_required")
            .with_message("Agendamentos sem cliente cadastrado exigem o nome do cliente.".into()));
    }
    Ok(())
}
