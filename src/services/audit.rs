// src/services/audit.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    common::error::AppError,
    db::BookingStore,
    models::{
        booking::{Booking, BookingStatus, CancellationDetails, NewBooking},
        history::{BookingHistory, ChangeType, NewBookingHistory},
    },
};

/// Histórico append-only. Os construtores montam a entrada com os snapshots;
/// a gravação acontece no store, junto com a mutação.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn BookingStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn history(&self, booking_id: i64) -> Result<Vec<BookingHistory>, AppError> {
        self.store.list_history(booking_id).await
    }

    pub fn created(booking: &NewBooking, actor_id: Option<i64>) -> NewBookingHistory {
        NewBookingHistory {
            actor_id,
            change_type: ChangeType::Created,
            old_values: None,
            new_values: Some(json!({
                "bookingNumber": booking.booking_number,
                "providerId": booking.provider_id,
                "status": BookingStatus::Pending,
                "scheduledStartTime": booking.scheduled_start_time,
                "scheduledEndTime": booking.scheduled_end_time,
                "totalPrice": booking.total_price,
                "currency": booking.currency,
            })),
            reason: None,
        }
    }

    pub fn status_changed(
        from: BookingStatus,
        to: BookingStatus,
        actor_id: Option<i64>,
    ) -> NewBookingHistory {
        NewBookingHistory {
            actor_id,
            change_type: ChangeType::StatusChanged,
            old_values: Some(json!({ "status": from })),
            new_values: Some(json!({ "status": to })),
            reason: None,
        }
    }

    pub fn rescheduled(
        booking: &Booking,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        actor_id: Option<i64>,
        reason: Option<String>,
    ) -> NewBookingHistory {
        NewBookingHistory {
            actor_id,
            change_type: ChangeType::Rescheduled,
            old_values: Some(json!({
                "scheduledStartTime": booking.scheduled_start_time,
                "scheduledEndTime": booking.scheduled_end_time,
            })),
            new_values: Some(json!({
                "scheduledStartTime": new_start,
                "scheduledEndTime": new_end,
            })),
            reason,
        }
    }

    pub fn cancelled(booking: &Booking, details: &CancellationDetails) -> NewBookingHistory {
        NewBookingHistory {
            actor_id: details.cancelled_by,
            change_type: ChangeType::Cancelled,
            old_values: Some(json!({ "status": booking.status })),
            new_values: Some(json!({
                "status": BookingStatus::Cancelled,
                "cancelledAt": details.cancelled_at,
                "cancellationFee": details.fee,
            })),
            reason: details.reason.clone(),
        }
    }

    /// Cancelamento pedido como troca de status: mesma entrada de
    /// `status_changed`, com os metadados do cancelamento em `new_values`.
    pub fn cancelled_by_status_change(
        booking: &Booking,
        details: &CancellationDetails,
    ) -> NewBookingHistory {
        NewBookingHistory {
            change_type: ChangeType::StatusChanged,
            ..Self::cancelled(booking, details)
        }
    }
}

