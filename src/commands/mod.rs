//! Command handlers
//!
//! Async entry points a UI layer calls into. Each returns an
//! [`ErrorResponse`](crate::utils::error::ErrorResponse) on failure.

pub mod recording;
