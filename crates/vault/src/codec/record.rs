//! Schema-driven encryption of whole records.

use serde_json::Value;
use tracing::warn;

use super::path::{for_each_leaf, parse_path};
use super::{is_truthy, restore, CodecError};
use crate::crypto::{is_encrypted, FieldCipher};
use crate::schema::{EntitySchema, FieldKind, FieldRule};

/// What to do when a sensitive field fails to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecryptMode {
    /// Abort on the first failure.
    #[default]
    Strict,
    /// Leave the field encrypted, note its path, and carry on.
    Lenient,
}

/// Result of [`decrypt_record`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    /// Number of fields decrypted.
    pub decrypted: usize,
    /// Locations left encrypted after a failure (lenient mode only).
    pub skipped: Vec<String>,
}

/// Call `f` on every sensitive leaf of `record` as defined by `schema`.
///
/// For [`FieldRule::AllKeysUnder`], nothing is visited unless one of the gate
/// flags is `true` at the top level of the record.
pub(crate) fn visit_sensitive<E>(
    record: &mut Value,
    schema: &EntitySchema,
    f: &mut dyn FnMut(&str, FieldKind, &mut Value) -> Result<(), E>,
) -> Result<(), E> {
    match &schema.rule {
        FieldRule::Paths(fields) => {
            for spec in fields {
                let segments = parse_path(&spec.path);
                for_each_leaf(record, &segments, "", &mut |at, leaf| f(at, spec.kind, leaf))?;
            }
        }
        FieldRule::AllKeysUnder { path, when_any } => {
            if !any_flag_set(record, when_any) {
                return Ok(());
            }
            let segments = parse_path(path);
            for_each_leaf(record, &segments, "", &mut |at, target| {
                if let Value::Object(map) = target {
                    for (key, leaf) in map.iter_mut() {
                        f(&format!("{at}.{key}"), FieldKind::Text, leaf)?;
                    }
                }
                Ok(())
            })?;
        }
    }
    Ok(())
}

fn any_flag_set(record: &Value, flags: &[String]) -> bool {
    flags
        .iter()
        .any(|flag| record.get(flag).and_then(Value::as_bool).unwrap_or(false))
}

/// Encrypt every sensitive field of `record` in place.
///
/// Falsy values are left alone, and so are values that are already
/// encrypted, so saving the same record twice never double-encrypts.
/// Returns the number of fields encrypted by this call.
///
/// # Errors
///
/// [`CodecError::NotAnObject`] if `record` is not an object;
/// [`CodecError::Field`] if the cipher fails.
pub fn encrypt_record(
    cipher: &FieldCipher,
    record: &mut Value,
    schema: &EntitySchema,
) -> Result<usize, CodecError> {
    if !record.is_object() {
        return Err(CodecError::NotAnObject);
    }

    let mut count = 0;
    visit_sensitive(record, schema, &mut |at, _kind, leaf| {
        if !is_truthy(leaf) {
            return Ok(());
        }
        if let Value::String(s) = leaf {
            if is_encrypted(s) {
                return Ok(());
            }
        }
        let encrypted = cipher
            .encrypt_json(leaf)
            .map_err(|source| CodecError::Field {
                path: at.to_owned(),
                source,
            })?;
        if let Some(encrypted) = encrypted {
            *leaf = Value::String(encrypted);
            count += 1;
        }
        Ok(())
    })?;
    Ok(count)
}

/// Decrypt every encrypted sensitive field of `record` in place.
///
/// Plaintext values (legacy data) are left as they are. Decrypted values are
/// restored according to their [`FieldKind`].
///
/// # Errors
///
/// [`CodecError::NotAnObject`] if `record` is not an object. In
/// [`DecryptMode::Strict`], [`CodecError::Field`] for the first field that
/// fails; in [`DecryptMode::Lenient`] failures are reported in
/// [`DecryptOutcome::skipped`] instead.
pub fn decrypt_record(
    cipher: &FieldCipher,
    record: &mut Value,
    schema: &EntitySchema,
    mode: DecryptMode,
) -> Result<DecryptOutcome, CodecError> {
    if !record.is_object() {
        return Err(CodecError::NotAnObject);
    }

    let mut outcome = DecryptOutcome::default();
    visit_sensitive(record, schema, &mut |at, kind, leaf| {
        let Value::String(s) = leaf else {
            return Ok(());
        };
        if !is_encrypted(s) {
            return Ok(());
        }
        match cipher.decrypt(s) {
            Ok(plain) => {
                *leaf = restore(plain.unwrap_or_default(), kind, at);
                outcome.decrypted += 1;
                Ok(())
            }
            Err(source) if mode == DecryptMode::Lenient => {
                warn!(entity = %schema.name, path = at, error = %source, "field left encrypted");
                outcome.skipped.push(at.to_owned());
                Ok(())
            }
            Err(source) => Err(CodecError::Field {
                path: at.to_owned(),
                source,
            }),
        }
    })?;
    Ok(outcome)
}
