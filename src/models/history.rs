// src/models/history.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_change_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    StatusChanged,
    Rescheduled,
    Cancelled,
}

// Registro imutável: nunca sofre UPDATE nem DELETE
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistory {
    pub id: i64,
    pub booking_id: i64,
    pub actor_id: Option<i64>, // None = ação do sistema
    pub change_type: ChangeType,
    #[schema(value_type = Object)]
    pub old_values: Option<Value>,
    #[schema(value_type = Object)]
    pub new_values: Option<Value>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entrada ainda não persistida. O `booking_id` é preenchido pelo store,
/// dentro da mesma transação da mutação.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBookingHistory {
    pub actor_id: Option<i64>,
    pub change_type: ChangeType,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub reason: Option<String>,
}
