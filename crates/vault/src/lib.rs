//! Field-level encryption for DiaVise health records.
//!
//! Sensitive fields are encrypted individually with AES-256-CBC under a single
//! process key and stored as `ivHex:cipherHex` strings, so records stay
//! queryable on their non-sensitive fields.
//!
//! - [`key`] resolves and validates the 32-byte key.
//! - [`crypto`] encrypts and decrypts single values.
//! - [`codec`] applies the cipher to whole JSON records.
//! - [`schema`] says which fields of which entity are sensitive.
//! - [`rotation`] re-encrypts stored values under a new key.
//! - [`server`] exposes the codec over HTTP.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod key;
pub mod rotation;
pub mod schema;
pub mod server;
pub mod telemetry;
