//! Axum HTTP server and routing.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared layers (tracing,
//!   timeout, compression).
//! - Inject shared application state (`AppState`) into handlers.
//! - Map codec and registry failures onto [`common::ServiceError`] statuses.

pub mod handlers;
pub mod router;
pub mod state;
