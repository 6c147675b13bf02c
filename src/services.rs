pub mod audit;
pub mod availability;
pub mod booking_service;
pub mod cancellation;
pub mod pricing;
pub mod state_machine;

pub use booking_service::{BookingRules, BookingService};
