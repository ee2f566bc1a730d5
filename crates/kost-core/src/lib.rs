//! Lifecycle core for a boarding-house (kost) business.
//!
//! The crate owns the room inventory, rental contracts, recurring
//! billing, and maintenance ticketing, and exposes an axum router over
//! those services. Persistence and notification delivery stay behind
//! traits so the service layer can be exercised against in-memory
//! adapters.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod telemetry;
