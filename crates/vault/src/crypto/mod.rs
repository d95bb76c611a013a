//! AES-256-CBC field encryption primitives.
//!
//! This module is intentionally free of HTTP and schema dependencies.
//! It provides the low-level encrypt/decrypt operations used by the codec.
//!
//! # Ciphertext format
//!
//! ```text
//! <hex(iv), 32 chars>:<hex(ciphertext)>
//! ```
//!
//! The format is shared with the existing Node backend and must not change
//! while AES-256-CBC and 16-byte IVs remain in use.

pub mod cipher;
pub mod field;

pub use cipher::{is_encrypted, CipherError, DecryptFailure, EncryptedValue};
pub use field::FieldCipher;
