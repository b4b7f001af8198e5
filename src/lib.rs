//! Tollgate - Fixed-Window HTTP Rate Limiting
//!
//! This crate gates HTTP handlers behind a per-route, per-caller request
//! quota. Counters live in a shared store (Redis in production) so that the
//! limit holds across every instance of a horizontally scaled service.

pub mod config;
pub mod error;
pub mod gate;
pub mod ratelimit;
pub mod store;
