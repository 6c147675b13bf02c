//! Router HTTP exercitado com `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use barber_booking::{
    cache::NoopCache,
    config::AppState,
    db::InMemoryBookingStore,
    router,
    services::{cancellation::NoCancellationFee, BookingRules, BookingService},
};

fn app() -> Router {
    let service = BookingService::new(
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(NoopCache),
        Arc::new(NoCancellationFee),
        BookingRules::default(),
    );
    router(AppState::new(service))
}

fn booking_payload(start: &str, end: &str) -> Value {
    json!({
        "providerId": 5,
        "customerId": 10,
        "serviceName": "Corte + Barba",
        "scheduledStartTime": start,
        "scheduledEndTime": end,
        "servicePrice": "50.00",
        "taxRate": "0.08"
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_check_responds() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_and_fetch_booking() {
    let app = app();

    let (status, created) = send_as(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
        Some("42"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["totalPrice"].as_f64(), Some(54.0));

    let id = created["id"].as_i64().unwrap();
    let number = created["bookingNumber"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, "GET", &format!("/api/bookings/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["bookingNumber"], number.as_str());

    let (status, by_number) = send(&app, "GET", &format!("/api/bookings/by-number/{number}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_number["id"].as_i64(), Some(id));

    let (status, history) = send(&app, "GET", &format!("/api/bookings/{id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["changeType"], "created");
    assert_eq!(history[0]["actorId"].as_i64(), Some(42));
}

#[tokio::test]
async fn overlapping_booking_returns_409() {
    let app = app();
    send(&app, "POST", "/api/bookings", Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z"))).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:30:00Z", "2024-01-15T11:30:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_transition_returns_422_with_allowed_list() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/bookings/{id}/status"),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["allowedTransitions"], json!(["confirmed", "cancelled", "no_show"]));

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/bookings/{id}/status"),
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/bookings/{id}/status"),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
}

#[tokio::test]
async fn cancel_then_update_is_rejected() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/cancel"),
        Some(json!({ "reason": "Cliente desistiu" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(&app, "POST", &format!("/api/bookings/{id}/cancel"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["allowedTransitions"], json!([]));
}

#[tokio::test]
async fn reschedule_and_availability_endpoints() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "GET",
        "/api/providers/5/availability?start=2024-01-15T10:30:00Z&durationMinutes=60",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/bookings/{id}/reschedule"),
        Some(json!({
            "scheduledStartTime": "2024-01-15T10:15:00Z",
            "scheduledEndTime": "2024-01-15T11:15:00Z",
            "reason": "Atraso"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduledStartTime"], "2024-01-15T10:15:00Z");

    let (status, slots) = send(&app, "GET", "/api/providers/5/slots?date=2024-01-15&durationMinutes=60", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(slots.as_array().is_some_and(|s| !s.is_empty()));

    let (status, schedule) = send(
        &app,
        "GET",
        "/api/providers/5/bookings?from=2024-01-15T00:00:00Z&to=2024-01-16T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schedule.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn client_errors_map_to_4xx() {
    let app = app();

    let (status, _) = send(&app, "GET", "/api/bookings/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/bookings/by-number/BK-123", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_as(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
        Some("abc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T11:00:00Z", "2024-01-15T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let mut negative = booking_payload("2024-01-15T12:00:00Z", "2024-01-15T13:00:00Z");
    negative["servicePrice"] = json!("-1");
    let (status, _) = send(&app, "POST", "/api/bookings", Some(negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tip_quote_endpoint() {
    let app = app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, quote) = send(&app, "GET", &format!("/api/bookings/{id}/tip-quote?amount=6"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["totalWithTip"].as_f64(), Some(60.0));

    let (status, _) = send(&app, "GET", &format!("/api/bookings/{id}/tip-quote?amount=-1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_values_return_400() {
    let app = app();

    let mut overflowing = booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z");
    overflowing["servicePrice"] = json!("70000000000000000000000000000");
    overflowing["taxRate"] = json!("1");
    let (status, _) = send(&app, "POST", "/api/bookings", Some(overflowing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut imprecise = booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z");
    imprecise["servicePrice"] = json!("1000");
    imprecise["taxRate"] = json!("0.12346");
    let (status, _) = send(&app, "POST", "/api/bookings", Some(imprecise)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T10:00:30Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &app,
        "POST",
        "/api/bookings",
        Some(booking_payload("2024-01-15T10:00:00Z", "2024-01-15T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/bookings/{id}/tip-quote?amount=79228162514264337593543950335"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        "/api/providers/5/availability?start=2024-01-15T10:30:00Z&durationMinutes=4611686018427387903",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
