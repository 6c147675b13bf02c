pub mod booking;
pub mod history;
