//! Axum request handlers for all service endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    HealthResponse,
};
use common::ServiceError;
use tracing::{debug, warn};

use super::state::AppState;
use crate::codec::{decrypt_record, encrypt_record, CodecError, DecryptMode};
use crate::key::KeySource;
use crate::schema::EntitySchema;

/// `POST /encrypt`: encrypt the sensitive fields of the request payload.
///
/// The entity is identified by the value of the `X-Entity-Type` request header
/// (or the configured header name). Sensitive fields are replaced with
/// `ivHex:cipherHex` strings; values that are already encrypted are kept.
pub async fn encrypt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EncryptRequest>,
) -> Response {
    let schema = match entity_schema(&state, &headers) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let mut payload = req.payload;
    match encrypt_record(&state.cipher, &mut payload, &schema) {
        Ok(count) => {
            debug!(entity = %schema.name, fields = count, "record encrypted");
            (StatusCode::OK, Json(EncryptResponse { payload })).into_response()
        }
        Err(e) => {
            warn!(entity = %schema.name, error = %e, "encryption failed");
            error_response(codec_failure(e, ServiceError::EncryptionFailure))
        }
    }
}

/// `POST /decrypt`: decrypt the sensitive fields of the request payload.
///
/// With `"lenient": true`, fields that fail to decrypt are left as stored and
/// listed under `skipped` instead of failing the whole request.
pub async fn decrypt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DecryptRequest>,
) -> Response {
    let schema = match entity_schema(&state, &headers) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let mode = if req.lenient {
        DecryptMode::Lenient
    } else {
        DecryptMode::Strict
    };

    let mut payload = req.payload;
    match decrypt_record(&state.cipher, &mut payload, &schema, mode) {
        Ok(outcome) => {
            debug!(
                entity = %schema.name,
                fields = outcome.decrypted,
                skipped = outcome.skipped.len(),
                "record decrypted"
            );
            let body = DecryptResponse {
                payload,
                skipped: outcome.skipped,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!(entity = %schema.name, error = %e, "decryption failed");
            error_response(codec_failure(e, ServiceError::DecryptionFailure))
        }
    }
}

/// `GET /health`: liveness and readiness check.
///
/// Returns `200 OK` when the process runs on a configured key.
/// Returns `503 Service Unavailable` on an ephemeral key, since anything it
/// encrypts is lost on restart.
pub async fn health(State(state): State<AppState>) -> Response {
    let (status_code, status_str) = match state.key_source {
        KeySource::Configured => (StatusCode::OK, "ok"),
        KeySource::Ephemeral => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    let body = HealthResponse {
        status: status_str.into(),
        key_source: state.key_source.as_str().into(),
        key_fingerprint: state.cipher.fingerprint(),
        entities_loaded: state.registry.len(),
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

/// Resolve the entity schema named by the configured request header.
fn entity_schema(state: &AppState, headers: &HeaderMap) -> Result<Arc<EntitySchema>, ServiceError> {
    let header = state.entity_header_name.as_str();
    let name = headers
        .get(header)
        .ok_or_else(|| ServiceError::BadRequest(format!("missing {header} header")))?
        .to_str()
        .map_err(|_| {
            ServiceError::BadRequest(format!("{header} header contains non-ASCII characters"))
        })?;

    state
        .registry
        .get(name.trim())
        .map_err(|e| ServiceError::BadRequest(e.to_string()))
}

/// Map a codec error onto the service error for the failed direction.
fn codec_failure(err: CodecError, cipher_failure: fn(String) -> ServiceError) -> ServiceError {
    match err {
        CodecError::NotAnObject => ServiceError::BadRequest("payload must be a JSON object".into()),
        other @ CodecError::Field { .. } => cipher_failure(other.to_string()),
    }
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_response())).into_response()
}
