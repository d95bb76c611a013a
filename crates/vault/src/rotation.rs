//! Re-encrypting stored values under a new key.
//!
//! Rotation is per value or per record. Finding every affected record and
//! writing it back is the caller's job, and nothing here makes a multi-record
//! rewrite atomic: a run interrupted halfway leaves some records under each
//! key. Both keys must stay available until the caller has confirmed every
//! record was rewritten.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::codec::visit_sensitive;
use crate::crypto::{is_encrypted, CipherError, FieldCipher};
use crate::key::EncryptionKey;
use crate::schema::EntitySchema;

/// Errors produced during key rotation.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The value did not decrypt under the old key.
    #[error("failed to decrypt with the old key: {0}")]
    Decrypt(#[source] CipherError),

    /// The plaintext could not be encrypted under the new key.
    #[error("failed to encrypt with the new key: {0}")]
    Encrypt(#[source] CipherError),

    /// Rotation failed on one field of a record.
    #[error("field `{path}`: {source}")]
    Field {
        path: String,
        #[source]
        source: Box<RotationError>,
    },

    /// The record is not a JSON object.
    #[error("record must be a JSON object")]
    NotAnObject,
}

/// Decrypt `encrypted` with `old_key` and encrypt the plaintext with `new_key`.
///
/// `None` and the empty string yield `Ok(None)`.
///
/// # Errors
///
/// [`RotationError::Decrypt`] if the value is malformed or was not written
/// under `old_key`; [`RotationError::Encrypt`] if re-encryption fails.
pub fn rotate_key(
    encrypted: Option<&str>,
    old_key: &EncryptionKey,
    new_key: &EncryptionKey,
) -> Result<Option<String>, RotationError> {
    let Some(encrypted) = encrypted.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let old = FieldCipher::new(old_key.clone());
    let new = FieldCipher::new(new_key.clone());
    rotate_value(encrypted, &old, &new)
}

fn rotate_value(
    encrypted: &str,
    old: &FieldCipher,
    new: &FieldCipher,
) -> Result<Option<String>, RotationError> {
    match old.decrypt(encrypted).map_err(RotationError::Decrypt)? {
        Some(plain) => new.encrypt(&plain).map_err(RotationError::Encrypt),
        None => Ok(None),
    }
}

/// Re-encrypt every encrypted sensitive field of one record in place.
///
/// Plaintext fields are left as they are. Returns the number of fields
/// rotated. On error the record may be partially rotated and must not be
/// written back.
///
/// # Errors
///
/// [`RotationError::NotAnObject`] for non-object records;
/// [`RotationError::Field`] naming the first field that failed.
pub fn rotate_record(
    record: &mut Value,
    schema: &EntitySchema,
    old: &FieldCipher,
    new: &FieldCipher,
) -> Result<usize, RotationError> {
    if !record.is_object() {
        return Err(RotationError::NotAnObject);
    }

    let mut rotated = 0;
    visit_sensitive(record, schema, &mut |at, _kind, leaf| {
        let Value::String(s) = leaf else {
            return Ok(());
        };
        if !is_encrypted(s) {
            return Ok(());
        }
        let fresh = rotate_value(s, old, new).map_err(|source| RotationError::Field {
            path: at.to_owned(),
            source: Box::new(source),
        })?;
        *leaf = fresh.map_or(Value::Null, Value::String);
        rotated += 1;
        Ok(())
    })?;
    Ok(rotated)
}

/// Totals from [`rotate_stream`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RotateSummary {
    /// Non-blank input lines seen.
    pub records: usize,
    /// Fields re-encrypted across all successful records.
    pub fields: usize,
    /// Records that could not be rotated and were echoed unchanged.
    pub failed: usize,
}

/// Rotate newline-delimited JSON records from `input` into `output`.
///
/// Every input line produces exactly one output line. A record that is not
/// valid JSON or fails to rotate is written back unchanged and counted in
/// [`RotateSummary::failed`]; blank lines pass through. Failures are logged
/// with their line number only.
///
/// # Errors
///
/// Only I/O errors on `input` or `output` abort the stream.
pub fn rotate_stream<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    schema: &EntitySchema,
    old: &FieldCipher,
    new: &FieldCipher,
) -> io::Result<RotateSummary> {
    let mut summary = RotateSummary::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            writeln!(output, "{line}")?;
            continue;
        }
        summary.records += 1;

        let mut record: Value = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                summary.failed += 1;
                error!(line = idx + 1, error = %e, "record is not valid JSON");
                writeln!(output, "{line}")?;
                continue;
            }
        };

        match rotate_record(&mut record, schema, old, new) {
            Ok(n) => {
                summary.fields += n;
                serde_json::to_writer(&mut output, &record)?;
                writeln!(output)?;
            }
            Err(e) => {
                summary.failed += 1;
                error!(line = idx + 1, error = %e, "record failed to rotate");
                writeln!(output, "{line}")?;
            }
        }
    }
    output.flush()?;

    info!(
        entity = %schema.name,
        records = summary.records,
        fields = summary.fields,
        failed = summary.failed,
        "rotation finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decrypt_record, encrypt_record, DecryptMode};
    use crate::schema::EntityKind;
    use serde_json::json;

    #[test]
    fn rotated_value_reads_under_new_key_only() {
        let old_key = EncryptionKey::generate();
        let new_key = EncryptionKey::generate();
        let old = FieldCipher::new(old_key.clone());
        let new = FieldCipher::new(new_key.clone());

        let stored = old.encrypt("Type 2").unwrap().unwrap();
        let rotated = rotate_key(Some(&stored), &old_key, &new_key)
            .unwrap()
            .unwrap();

        assert_ne!(rotated, stored);
        assert_eq!(new.decrypt(&rotated).unwrap().as_deref(), Some("Type 2"));
    }

    #[test]
    fn nothing_to_rotate() {
        let k = EncryptionKey::generate();
        assert_eq!(rotate_key(None, &k, &k).unwrap(), None);
        assert_eq!(rotate_key(Some(""), &k, &k).unwrap(), None);
    }

    #[test]
    fn malformed_value_fails_on_decrypt() {
        let k = EncryptionKey::generate();
        assert!(matches!(
            rotate_key(Some("plain text"), &k, &k),
            Err(RotationError::Decrypt(_))
        ));
    }

    #[test]
    fn record_rotation_skips_plaintext() {
        let old = FieldCipher::new(EncryptionKey::generate());
        let new = FieldCipher::new(EncryptionKey::generate());
        let schema = EntityKind::UserPersonalInfo.schema();

        let original = json!({"gender": "male", "height": 180, "weight": 90});
        let mut record = original.clone();
        encrypt_record(&old, &mut record, &schema).unwrap();
        // A field written before encryption was enabled.
        record["activity_level"] = json!("moderate");

        assert_eq!(rotate_record(&mut record, &schema, &old, &new).unwrap(), 3);
        assert_eq!(record["activity_level"], "moderate");

        decrypt_record(&new, &mut record, &schema, DecryptMode::Strict).unwrap();
        assert_eq!(record["gender"], original["gender"]);
        assert_eq!(record["height"], original["height"]);
        assert_eq!(record["weight"], original["weight"]);
    }

    #[test]
    fn record_rotation_names_failing_field() {
        let old = FieldCipher::new(EncryptionKey::generate());
        let new = FieldCipher::new(EncryptionKey::generate());
        let schema = EntityKind::UserPersonalInfo.schema();
        let mut record = json!({"gender": "00112233445566778899aabbccddeeff:00"});

        match rotate_record(&mut record, &schema, &old, &new) {
            Err(RotationError::Field { path, source }) => {
                assert_eq!(path, "gender");
                assert!(matches!(*source, RotationError::Decrypt(_)));
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn stream_echoes_failures_and_keeps_lines_aligned() {
        let old = FieldCipher::new(EncryptionKey::generate());
        let new = FieldCipher::new(EncryptionKey::generate());
        let schema = EntityKind::UserMedicalInfo.schema();

        let mut good = json!({"user_id": "u-1", "diabetes_type": "Type 2"});
        encrypt_record(&old, &mut good, &schema).unwrap();
        let foreign = r#"{"diabetes_type":"00112233445566778899aabbccddeeff:00"}"#;
        let malformed = r#"{"diabetes_type": "#;

        let input = format!("{good}\n{malformed}\n\n{foreign}\n");
        let mut output = Vec::new();
        let summary =
            rotate_stream(input.as_bytes(), &mut output, &schema, &old, &new).unwrap();

        assert_eq!(
            summary,
            RotateSummary {
                records: 3,
                fields: 1,
                failed: 2
            }
        );

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], malformed);
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], foreign);

        let mut rotated: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(rotated["user_id"], "u-1");
        decrypt_record(&new, &mut rotated, &schema, DecryptMode::Strict).unwrap();
        assert_eq!(rotated["diabetes_type"], "Type 2");
    }

    #[test]
    fn stream_without_failures() {
        let k = FieldCipher::new(EncryptionKey::generate());
        let schema = EntityKind::UserPersonalInfo.schema();
        let mut output = Vec::new();
        let summary = rotate_stream(
            "{\"gender\":\"female\"}\n".as_bytes(),
            &mut output,
            &schema,
            &k,
            &k,
        )
        .unwrap();
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.fields, 0);
        assert_eq!(String::from_utf8(output).unwrap(), "{\"gender\":\"female\"}\n");
    }
}
