pub mod booking_repo;
pub use booking_repo::{BookingStore, PgBookingStore};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryBookingStore;
