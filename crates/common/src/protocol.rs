//! Request and response types exchanged with the field-vault HTTP service.
//!
//! Records travel as arbitrary JSON objects. The entity type that decides
//! which fields are sensitive is carried in a request header, not the body.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Encrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Record whose sensitive fields will be encrypted.
    pub payload: serde_json::Value,
}

/// Successful response body for `POST /encrypt`.
///
/// Sensitive fields are replaced by `<iv hex>:<ciphertext hex>` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Decrypt endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Record as stored, with sensitive fields possibly encrypted.
    pub payload: serde_json::Value,
    /// Leave undecryptable fields in place instead of failing the request.
    #[serde(default)]
    pub lenient: bool,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub payload: serde_json::Value,
    /// Paths left encrypted because they failed to decrypt (lenient mode only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` with a configured key, `"degraded"` with an ephemeral one.
    pub status: String,
    /// Where the key came from: `"configured"` or `"ephemeral"`.
    pub key_source: String,
    /// Non-secret key fingerprint, for spotting key mismatches across hosts.
    pub key_fingerprint: String,
    /// Number of entity schemas currently registered.
    pub entities_loaded: usize,
}
