//! Helpers shared by unit tests.

pub mod log_capture;
pub mod scripted;
pub mod socket_guard;
