// src/handlers/bookings.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::ActorContext,
    models::{
        booking::{Booking, BookingStatus, CreateBookingRequest},
        history::BookingHistory,
    },
    services::{booking_service::TipQuote, state_machine::TransitionError},
};

// =============================================================================
//  1. CRIAÇÃO E CONSULTA
// =============================================================================

// POST /api/bookings
#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Agendamento criado", body = Booking),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Horário ocupado")
    ),
    params(
        ("x-actor-id" = Option<i64>, Header, description = "Usuário que executa a ação")
    )
)]
pub async fn create_booking(
    State(app_state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.validate(&payload)?;
    app_state.validator.time_window(payload.scheduled_start_time, payload.scheduled_end_time)?;

    let booking = app_state.booking_service
        .create_booking(payload, actor.0)
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/{id}
#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    tag = "Bookings",
    responses(
        (status = 200, description = "Agendamento", body = Booking),
        (status = 404, description = "Não encontrado")
    ),
    params(("id" = i64, Path, description = "ID do agendamento"))
)]
pub async fn get_booking(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let booking = app_state.booking_service.get_booking(id).await?;
    Ok(Json(booking))
}

// GET /api/bookings/by-number/{number}
#[utoipa::path(
    get,
    path = "/api/bookings/by-number/{number}",
    tag = "Bookings",
    responses(
        (status = 200, description = "Agendamento", body = Booking),
        (status = 400, description = "Formato inválido"),
        (status = 404, description = "Não encontrado")
    ),
    params(("number" = String, Path, description = "Número no formato BK-AAAAMMDD-NNNN"))
)]
pub async fn get_booking_by_number(
    State(app_state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.booking_number(&number)?;

    let booking = app_state.booking_service.get_booking_by_number(&number).await?;
    Ok(Json(booking))
}

// GET /api/bookings/{id}/history
#[utoipa::path(
    get,
    path = "/api/bookings/{id}/history",
    tag = "Bookings",
    responses(
        (status = 200, description = "Histórico do agendamento (mais antigo primeiro)", body = Vec<BookingHistory>),
        (status = 404, description = "Não encontrado")
    ),
    params(("id" = i64, Path, description = "ID do agendamento"))
)]
pub async fn get_booking_history(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state.booking_service.booking_history(id).await?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct TipQuoteQuery {
    pub amount: Decimal,
}

// GET /api/bookings/{id}/tip-quote?amount=
#[utoipa::path(
    get,
    path = "/api/bookings/{id}/tip-quote",
    tag = "Bookings",
    responses(
        (status = 200, description = "Total com gorjeta (apenas cotação)", body = TipQuote),
        (status = 400, description = "Gorjeta negativa")
    ),
    params(
        ("id" = i64, Path, description = "ID do agendamento"),
        ("amount" = String, Query, description = "Valor da gorjeta", example = "15.00")
    )
)]
pub async fn quote_tip(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<TipQuoteQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quote = app_state.booking_service.quote_tip(id, query.amount).await?;
    Ok(Json(quote))
}

// =============================================================================
//  2. CICLO DE VIDA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "confirmed")]
    pub status: String,
}

// PATCH /api/bookings/{id}/status
#[utoipa::path(
    patch,
    path = "/api/bookings/{id}/status",
    tag = "Bookings",
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status alterado", body = Booking),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Alterado por outra requisição"),
        (status = 422, description = "Transição não permitida (inclui allowedTransitions)")
    ),
    params(
        ("id" = i64, Path, description = "ID do agendamento"),
        ("x-actor-id" = Option<i64>, Header, description = "Usuário que executa a ação")
    )
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.validate(&payload)?;

    let target = payload.status
        .parse::<BookingStatus>()
        .map_err(|e| TransitionError::InvalidTargetStatus(e.0))?;

    let booking = app_state.booking_service
        .update_status(id, target, actor.0)
        .await?;

    Ok(Json(booking))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReschedulePayload {
    #[schema(example = "2024-01-15T14:00:00Z")]
    pub scheduled_start_time: DateTime<Utc>,
    #[schema(example = "2024-01-15T15:00:00Z")]
    pub scheduled_end_time: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

// POST /api/bookings/{id}/reschedule
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/reschedule",
    tag = "Bookings",
    request_body = ReschedulePayload,
    responses(
        (status = 200, description = "Agendamento remarcado", body = Booking),
        (status = 409, description = "Horário ocupado"),
        (status = 422, description = "Status não permite remarcação")
    ),
    params(
        ("id" = i64, Path, description = "ID do agendamento"),
        ("x-actor-id" = Option<i64>, Header, description = "Usuário que executa a ação")
    )
)]
pub async fn reschedule_booking(
    State(app_state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.validate(&payload)?;
    app_state.validator.time_window(payload.scheduled_start_time, payload.scheduled_end_time)?;

    let booking = app_state.booking_service
        .reschedule_booking(
            id,
            payload.scheduled_start_time,
            payload.scheduled_end_time,
            actor.0,
            payload.reason,
        )
        .await?;

    Ok(Json(booking))
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingPayload {
    #[validate(length(max = 500))]
    #[schema(example = "Cliente pediu para cancelar")]
    pub reason: Option<String>,
}

// POST /api/bookings/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/cancel",
    tag = "Bookings",
    request_body = CancelBookingPayload,
    responses(
        (status = 200, description = "Agendamento cancelado", body = Booking),
        (status = 409, description = "Alterado por outra requisição"),
        (status = 422, description = "Agendamento já finalizado")
    ),
    params(
        ("id" = i64, Path, description = "ID do agendamento"),
        ("x-actor-id" = Option<i64>, Header, description = "Usuário que executa a ação")
    )
)]
pub async fn cancel_booking(
    State(app_state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Json(payload): Json<CancelBookingPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state.validator.validate(&payload)?;

    let booking = app_state.booking_service
        .cancel_booking(id, payload.reason, actor.0)
        .await?;

    Ok(Json(booking))
}
