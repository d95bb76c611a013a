//! Applying the field cipher to JSON records.
//!
//! Two layers:
//!
//! - [`encrypt_object`] / [`decrypt_object`] work on a flat object and an
//!   explicit list of top-level field names.
//! - [`encrypt_record`] / [`decrypt_record`] apply an [`EntitySchema`] to a
//!   whole record, including nested objects and arrays, and restore numeric
//!   fields on the way back.

mod path;
mod record;

pub use record::{decrypt_record, encrypt_record, DecryptMode, DecryptOutcome};
pub(crate) use record::visit_sensitive;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::crypto::{is_encrypted, CipherError, FieldCipher};
use crate::schema::FieldKind;

/// Errors produced while encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The cipher failed on one field.
    #[error("field `{path}`: {source}")]
    Field {
        path: String,
        #[source]
        source: CipherError,
    },

    /// The record is not a JSON object.
    #[error("record must be a JSON object")]
    NotAnObject,
}

/// Encrypt the listed top-level fields of `obj`.
///
/// Returns a copy; `obj` is not modified. A listed field is encrypted only if
/// present and truthy (not `null`, `false`, `0`, or `""`). Unlisted fields pass
/// through unchanged. Already-encrypted values are *not* detected here and
/// would be encrypted again; use [`encrypt_record`] for idempotent saves.
///
/// # Errors
///
/// Returns [`CodecError::Field`] if the cipher fails.
pub fn encrypt_object<S: AsRef<str>>(
    cipher: &FieldCipher,
    obj: &Map<String, Value>,
    fields: &[S],
) -> Result<Map<String, Value>, CodecError> {
    let mut out = obj.clone();
    for field in fields {
        let name = field.as_ref();
        if let Some(value) = out.get_mut(name) {
            if is_truthy(value) {
                let encrypted = cipher
                    .encrypt_json(value)
                    .map_err(|source| CodecError::Field {
                        path: name.to_owned(),
                        source,
                    })?;
                *value = encrypted.map_or(Value::Null, Value::String);
            }
        }
    }
    Ok(out)
}

/// Decrypt the listed top-level fields of `obj`.
///
/// Returns a copy; `obj` is not modified. Only string values that look
/// encrypted ([`is_encrypted`]) are touched, so legacy plaintext survives.
///
/// # Errors
///
/// Returns [`CodecError::Field`] if an encrypted-looking value fails to decrypt.
pub fn decrypt_object<S: AsRef<str>>(
    cipher: &FieldCipher,
    obj: &Map<String, Value>,
    fields: &[S],
) -> Result<Map<String, Value>, CodecError> {
    let mut out = obj.clone();
    for field in fields {
        let name = field.as_ref();
        if let Some(Value::String(s)) = out.get_mut(name) {
            if is_encrypted(s) {
                let plain = cipher.decrypt(s).map_err(|source| CodecError::Field {
                    path: name.to_owned(),
                    source,
                })?;
                *s = plain.unwrap_or_default();
            }
        }
    }
    Ok(out)
}

/// JavaScript truthiness, which decides whether a field is worth encrypting.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Turn decrypted text back into the JSON shape its field expects.
///
/// Numbers that fail to parse stay strings; the field is logged by path only.
pub(crate) fn restore(plain: String, kind: FieldKind, path: &str) -> Value {
    match kind {
        FieldKind::Text => Value::String(plain),
        FieldKind::Number => match plain.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => number_value(f),
            _ => {
                warn!(path, "decrypted value is not a number; keeping text");
                Value::String(plain)
            }
        },
        FieldKind::Integer => {
            let trimmed = plain.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::from(i)
            } else if let Ok(f) = trimmed.parse::<f64>().map(f64::trunc) {
                if f.is_finite() {
                    number_value(f)
                } else {
                    Value::String(plain)
                }
            } else {
                warn!(path, "decrypted value is not an integer; keeping text");
                Value::String(plain)
            }
        }
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::EncryptionKey;
    use serde_json::json;

    fn cipher() -> FieldCipher {
        FieldCipher::new(EncryptionKey::generate())
    }

    fn as_map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn encrypt_object_only_touches_listed_fields() {
        let c = cipher();
        let obj = as_map(json!({"a": 1, "b": "secret"}));
        let enc = encrypt_object(&c, &obj, &["b"]).unwrap();

        assert_eq!(enc["a"], json!(1));
        let b = enc["b"].as_str().unwrap();
        assert!(is_encrypted(b), "{b}");
        // Input is untouched.
        assert_eq!(obj["b"], json!("secret"));

        let dec = decrypt_object(&c, &enc, &["b"]).unwrap();
        assert_eq!(dec["b"], json!("secret"));
        assert_eq!(dec["a"], json!(1));
    }

    #[test]
    fn encrypt_object_skips_falsy_and_absent() {
        let c = cipher();
        let obj = as_map(json!({"zero": 0, "empty": "", "nothing": null, "off": false}));
        let enc = encrypt_object(&c, &obj, &["zero", "empty", "nothing", "off", "absent"]).unwrap();
        assert_eq!(Value::Object(enc), Value::Object(obj));
    }

    #[test]
    fn encrypt_object_coerces_numbers() {
        let c = cipher();
        let obj = as_map(json!({"weight": 81.5}));
        let enc = encrypt_object(&c, &obj, &["weight"]).unwrap();
        let dec = decrypt_object(&c, &enc, &["weight"]).unwrap();
        assert_eq!(dec["weight"], json!("81.5"));
    }

    #[test]
    fn decrypt_object_tolerates_legacy_plaintext() {
        let c = cipher();
        let obj = as_map(json!({"gender": "female", "height": 170}));
        let dec = decrypt_object(&c, &obj, &["gender", "height"]).unwrap();
        assert_eq!(dec["gender"], json!("female"));
        assert_eq!(dec["height"], json!(170));
    }

    #[test]
    fn decrypt_object_reports_failing_field() {
        let writer = cipher();
        let reader = cipher();
        let enc = encrypt_object(&writer, &as_map(json!({"ssn": "123"})), &["ssn"]).unwrap();
        // A corrupted but well-shaped value: ciphertext is not a whole block.
        let mut broken = enc.clone();
        broken.insert(
            "ssn".into(),
            json!("00112233445566778899aabbccddeeff:abcd"),
        );
        match decrypt_object(&reader, &broken, &["ssn"]) {
            Err(CodecError::Field { path, .. }) => assert_eq!(path, "ssn"),
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn truthiness_matches_javascript() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn restore_by_kind() {
        assert_eq!(restore("Type 2".into(), FieldKind::Text, "p"), json!("Type 2"));
        assert_eq!(restore("120".into(), FieldKind::Number, "p"), json!(120));
        assert_eq!(restore("6.8".into(), FieldKind::Number, "p"), json!(6.8));
        assert_eq!(restore("7".into(), FieldKind::Integer, "p"), json!(7));
        assert_eq!(restore("7.9".into(), FieldKind::Integer, "p"), json!(7));
        assert_eq!(restore("high".into(), FieldKind::Number, "p"), json!("high"));
        assert_eq!(restore("n/a".into(), FieldKind::Integer, "p"), json!("n/a"));
    }
}
