//! Structured logging and optional OpenTelemetry span export.
//!
//! JSON logs are always written. When `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
//! spans are additionally exported over OTLP/gRPC to that collector.
//!
//! # Logging invariants
//!
//! - **No key material or plaintext** may appear in any span attribute or log
//!   field. Fields are identified by path and entity name only; keys by their
//!   fingerprint.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), and
//!   `RUST_LOG` overrides it when set.

pub mod init;

pub use init::{init_telemetry, LogTarget};
