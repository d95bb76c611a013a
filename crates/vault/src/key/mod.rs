//! Encryption key loading.
//!
//! # Lifecycle
//!
//! 1. At startup, [`load`] reads the configured hex key (normally
//!    `ENCRYPTION_KEY`) and decodes it into an [`EncryptionKey`].
//! 2. If no key is configured and the deployment does not require one, a
//!    random ephemeral key is generated instead and a warning is emitted.
//! 3. The key is handed to [`crate::crypto::FieldCipher`] and lives for the
//!    rest of the process. It is never replaced in place; rotation builds a
//!    second cipher from the new key.
//!
//! # Security invariants
//!
//! - Key bytes are never logged, printed, or included in traces. Only the
//!   [`EncryptionKey::fingerprint`] may appear in logs.
//! - Key memory is zeroed when the last copy is dropped.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Number of SHA-256 bytes kept in a key fingerprint.
const FINGERPRINT_LEN: usize = 8;

/// Key configuration errors.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key was configured and the deployment requires one.
    #[error("ENCRYPTION_KEY is required but not set")]
    Missing,

    /// The configured key is not a hex string.
    #[error("encryption key must be a hex string")]
    InvalidHex,

    /// The key decoded to the wrong number of bytes.
    #[error("encryption key must be {KEY_LEN} bytes (64 hex characters), got {0} bytes")]
    InvalidLength(usize),
}

/// A 256-bit AES key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Build a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] unless `bytes` is exactly [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = [0u8; KEY_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Build a key from its 64-character hex form. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidHex`] if the string is not hex, or
    /// [`KeyError::InvalidLength`] if it does not decode to [`KEY_LEN`] bytes.
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let mut bytes = hex::decode(hex_key.trim()).map_err(|e| match e {
            hex::FromHexError::OddLength => KeyError::InvalidLength(hex_key.trim().len() / 2),
            _ => KeyError::InvalidHex,
        })?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut buf = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut buf);
        Self(buf)
    }

    /// Raw key bytes. Crate-internal: only the cipher layer touches them.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Short, non-secret identifier for this key: the first bytes of its
    /// SHA-256 digest, hex encoded.
    ///
    /// Two processes reporting different fingerprints cannot read each other's data.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..FINGERPRINT_LEN])
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Generate a new key and return it as 64 lowercase hex characters.
///
/// Suitable for pasting into `ENCRYPTION_KEY`.
pub fn generate_key_hex() -> String {
    let key = EncryptionKey::generate();
    hex::encode(key.as_bytes())
}

/// Where the process key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Decoded from configuration.
    Configured,
    /// Generated at startup because nothing was configured.
    Ephemeral,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Configured => "configured",
            KeySource::Ephemeral => "ephemeral",
        }
    }
}

/// A key together with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedKey {
    pub key: EncryptionKey,
    pub source: KeySource,
}

/// Resolve the process key from the configured hex value.
///
/// A blank value counts as absent. When absent and `require` is false, an
/// ephemeral key is generated: anything encrypted with it is unreadable once
/// the process exits.
///
/// # Errors
///
/// Returns [`KeyError::Missing`] when absent and `require` is true, or the
/// decoding error from [`EncryptionKey::from_hex`] for a malformed value.
pub fn load(configured: Option<&str>, require: bool) -> Result<LoadedKey, KeyError> {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(hex_key) => {
            let key = EncryptionKey::from_hex(hex_key)?;
            info!(fingerprint = %key.fingerprint(), "encryption key loaded");
            Ok(LoadedKey {
                key,
                source: KeySource::Configured,
            })
        }
        None if require => Err(KeyError::Missing),
        None => {
            let key = EncryptionKey::generate();
            warn!(
                fingerprint = %key.fingerprint(),
                "ENCRYPTION_KEY not set; using an ephemeral key. \
                 Data encrypted by this process cannot be decrypted after restart"
            );
            Ok(LoadedKey {
                key,
                source: KeySource::Ephemeral,
            })
        }
    }
}
