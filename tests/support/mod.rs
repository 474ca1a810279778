pub mod critical_utils;
#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;
