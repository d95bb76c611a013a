//! Common error types shared across crates.

use thiserror::Error;

use crate::protocol::ErrorResponse;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::EncryptionFailure`] → 500
/// - [`ServiceError::DecryptionFailure`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: missing header, unknown entity type, or a
    /// payload that is not a JSON object.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A sensitive field could not be encrypted.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// A stored value could not be decrypted (malformed, wrong key, or tampered).
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::EncryptionFailure(_) => 500,
            ServiceError::DecryptionFailure(_) => 500,
        }
    }

    /// Short machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::EncryptionFailure(_) => "encryption_failed",
            ServiceError::DecryptionFailure(_) => "decryption_failed",
        }
    }

    /// Build the body sent to the caller.
    ///
    /// Only client errors echo their detail. Server-side failures get a fixed
    /// message so cipher internals never leave the process.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ServiceError::BadRequest(detail) => detail.clone(),
            ServiceError::EncryptionFailure(_) => "encryption failed".to_owned(),
            ServiceError::DecryptionFailure(_) => "decryption failed".to_owned(),
        };
        ErrorResponse::new(self.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(
            ServiceError::EncryptionFailure("x".into()).http_status(),
            500
        );
        assert_eq!(
            ServiceError::DecryptionFailure("x".into()).http_status(),
            500
        );
    }

    #[test]
    fn every_variant_has_a_distinct_code() {
        let all = [
            ServiceError::BadRequest("x".into()),
            ServiceError::EncryptionFailure("x".into()),
            ServiceError::DecryptionFailure("x".into()),
        ];
        let mut codes: Vec<&str> = all.iter().map(ServiceError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("missing entity header".into());
        assert!(e.to_string().contains("missing entity header"));
    }

    #[test]
    fn bad_request_body_keeps_detail() {
        let body = ServiceError::BadRequest("unknown entity type: foo".into()).to_response();
        assert_eq!(body.code, "bad_request");
        assert_eq!(body.message, "unknown entity type: foo");
    }

    #[test]
    fn server_errors_hide_detail() {
        let body =
            ServiceError::DecryptionFailure("bad padding at diabetes_type".into()).to_response();
        assert_eq!(body.code, "decryption_failed");
        assert!(!body.message.contains("diabetes_type"));
        assert!(!body.message.contains("padding"));
    }
}
