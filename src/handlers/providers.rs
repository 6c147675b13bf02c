// src/handlers/providers.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    models::booking::Booking,
    services::availability::{window_end, TimeSlot},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    #[schema(example = 5)]
    pub provider_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

// GET /api/providers/{id}/availability
#[utoipa::path(
    get,
    path = "/api/providers/{id}/availability",
    tag = "Providers",
    responses(
        (status = 200, description = "Disponibilidade do horário", body = AvailabilityResponse),
        (status = 400, description = "Duração inválida")
    ),
    params(
        ("id" = i64, Path, description = "ID do barbeiro"),
        ("start" = DateTime<Utc>, Query, description = "Início desejado"),
        ("durationMinutes" = i64, Query, description = "Duração em minutos")
    )
)]
pub async fn check_availability(
    State(app_state): State<AppState>,
    Path(provider_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.duration_minutes(query.duration_minutes)?;

    let available = app_state.booking_service
        .check_availability(provider_id, query.start, query.duration_minutes)
        .await?;

    Ok(Json(AvailabilityResponse {
        provider_id,
        start: query.start,
        end: window_end(query.start, query.duration_minutes)?,
        available,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: i64,
}

// GET /api/providers/{id}/slots
#[utoipa::path(
    get,
    path = "/api/providers/{id}/slots",
    tag = "Providers",
    responses(
        (status = 200, description = "Horários livres no expediente", body = Vec<TimeSlot>)
    ),
    params(
        ("id" = i64, Path, description = "ID do barbeiro"),
        ("date" = NaiveDate, Query, description = "Dia (AAAA-MM-DD)"),
        ("durationMinutes" = i64, Query, description = "Duração em minutos")
    )
)]
pub async fn available_slots(
    State(app_state): State<AppState>,
    Path(provider_id): Path<i64>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.duration_minutes(query.duration_minutes)?;

    let slots = app_state.booking_service
        .available_slots(provider_id, query.date, query.duration_minutes)
        .await?;

    Ok(Json(slots))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

// GET /api/providers/{id}/bookings
#[utoipa::path(
    get,
    path = "/api/providers/{id}/bookings",
    tag = "Providers",
    responses(
        (status = 200, description = "Agenda ativa do barbeiro no período", body = Vec<Booking>)
    ),
    params(
        ("id" = i64, Path, description = "ID do barbeiro"),
        ("from" = DateTime<Utc>, Query, description = "Início do período"),
        ("to" = DateTime<Utc>, Query, description = "Fim do período")
    )
)]
pub async fn provider_schedule(
    State(app_state): State<AppState>,
    Path(provider_id): Path<i64>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.query_range(query.from, query.to)?;

    let bookings = app_state.booking_service
        .provider_schedule(provider_id, query.from, query.to)
        .await?;

    Ok(Json(bookings))
}
