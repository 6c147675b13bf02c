// src/lib.rs

use axum::{
    routing::{get, patch, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod cache;
pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::{config::AppState, docs::ApiDoc};

/// Monta o router completo da API (rotas + Swagger).
pub fn router(app_state: AppState) -> Router {
    let booking_routes = Router::new()
        .route("/", post(handlers::bookings::create_booking))
        .route("/{id}", get(handlers::bookings::get_booking))
        .route("/by-number/{number}", get(handlers::bookings::get_booking_by_number))
        .route("/{id}/status", patch(handlers::bookings::update_status))
        .route("/{id}/reschedule", post(handlers::bookings::reschedule_booking))
        .route("/{id}/cancel", post(handlers::bookings::cancel_booking))
        .route("/{id}/history", get(handlers::bookings::get_booking_history))
        .route("/{id}/tip-quote", get(handlers::bookings::quote_tip));

    let provider_routes = Router::new()
        .route("/{id}/availability", get(handlers::providers::check_availability))
        .route("/{id}/slots", get(handlers::providers::available_slots))
        .route("/{id}/bookings", get(handlers::providers::provider_schedule));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/bookings", booking_routes)
        .nest("/api/providers", provider_routes)
        .with_state(app_state)
}
