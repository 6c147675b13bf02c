// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Bookings ---
        handlers::bookings::create_booking,
        handlers::bookings::get_booking,
        handlers::bookings::get_booking_by_number,
        handlers::bookings::get_booking_history,
        handlers::bookings::quote_tip,
        handlers::bookings::update_status,
        handlers::bookings::reschedule_booking,
        handlers::bookings::cancel_booking,

        // --- Providers ---
        handlers::providers::check_availability,
        handlers::providers::available_slots,
        handlers::providers::provider_schedule,
    ),
    components(
        schemas(
            // --- Booking ---
            models::booking::BookingStatus,
            models::booking::PaymentStatus,
            models::booking::Booking,
            models::booking::CreateBookingRequest,
            models::history::ChangeType,
            models::history::BookingHistory,

            // --- Serviços ---
            services::pricing::PricingBreakdown,
            services::availability::TimeSlot,
            services::booking_service::TipQuote,

            // --- Payloads ---
            handlers::bookings::UpdateStatusPayload,
            handlers::bookings::ReschedulePayload,
            handlers::bookings::CancelBookingPayload,
            handlers::providers::AvailabilityResponse,
        )
    ),
    tags(
        (name = "Bookings", description = "Ciclo de vida dos agendamentos"),
        (name = "Providers", description = "Agenda e disponibilidade dos barbeiros")
    )
)]
pub struct ApiDoc;
