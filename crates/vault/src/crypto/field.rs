//! [`FieldCipher`]: the key holder every encrypting call site receives.

use std::sync::Arc;

use serde_json::Value;

use super::cipher::{decrypt_field, encrypt_field, CipherError, EncryptedValue};
use crate::key::EncryptionKey;

/// Encrypts and decrypts single field values under one key.
///
/// Cheap to clone; clones share the key. Every call builds its own cipher
/// instance, so a `FieldCipher` can be used from any number of tasks at once
/// without locking.
#[derive(Clone, Debug)]
pub struct FieldCipher {
    key: Arc<EncryptionKey>,
}

impl FieldCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Fingerprint of the underlying key. See [`EncryptionKey::fingerprint`].
    pub fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Encrypt a string value.
    ///
    /// Returns `Ok(None)` for the empty string: there is nothing to protect.
    pub fn encrypt(&self, plaintext: &str) -> Result<Option<String>, CipherError> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        let value = encrypt_field(plaintext.as_bytes(), &self.key)?;
        Ok(Some(value.to_string()))
    }

    /// Encrypt a JSON value, coercing non-strings to text first.
    ///
    /// `null` and `""` yield `Ok(None)`. See [`plaintext_of`] for coercion rules.
    pub fn encrypt_json(&self, value: &Value) -> Result<Option<String>, CipherError> {
        match plaintext_of(value) {
            Some(text) => self.encrypt(&text),
            None => Ok(None),
        }
    }

    /// Decrypt an `<iv hex>:<ciphertext hex>` string.
    ///
    /// Returns `Ok(None)` for the empty string.
    ///
    /// # Errors
    ///
    /// [`CipherError::Decryption`] for malformed input, a wrong key, or tampering.
    pub fn decrypt(&self, encoded: &str) -> Result<Option<String>, CipherError> {
        if encoded.is_empty() {
            return Ok(None);
        }
        let value: EncryptedValue = encoded.parse()?;
        decrypt_field(&value, &self.key).map(Some)
    }

    /// Decrypt a JSON value. Anything but a non-empty string yields `Ok(None)`.
    pub fn decrypt_json(&self, value: &Value) -> Result<Option<String>, CipherError> {
        match value {
            Value::String(s) => self.decrypt(s),
            _ => Ok(None),
        }
    }
}

/// Text that would be encrypted for `value`, or `None` if there is nothing to encrypt.
///
/// - `null` and `""` → `None`
/// - strings → themselves
/// - booleans → `"true"` / `"false"`
/// - numbers → shortest decimal form; integral floats drop the `.0`
/// - arrays and objects → compact JSON
pub fn plaintext_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number_text(n)),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Integral floats below this magnitude print as plain digits, like JS `String(x)`.
const PLAIN_DIGITS_LIMIT: f64 = 1e21;

fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < PLAIN_DIGITS_LIMIT => {
            if f == 0.0 {
                // Covers -0.0, which JS also prints as "0".
                "0".to_owned()
            } else {
                // Shortest round-trip digits, zero-padded, no fractional part.
                format!("{f}")
            }
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::is_encrypted;
    use serde_json::json;

    fn cipher() -> FieldCipher {
        FieldCipher::new(EncryptionKey::generate())
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let c = cipher();
        for s in ["a", "Type 1", "120.5", "naïve — ünïcødé", "x:y:z"] {
            let enc = c.encrypt(s).unwrap().unwrap();
            assert!(is_encrypted(&enc), "{enc}");
            assert_eq!(c.decrypt(&enc).unwrap().as_deref(), Some(s));
        }
    }

    #[test]
    fn repeated_encryption_differs() {
        let c = cipher();
        let a = c.encrypt("metformin").unwrap().unwrap();
        let b = c.encrypt("metformin").unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a).unwrap().as_deref(), Some("metformin"));
        assert_eq!(c.decrypt(&b).unwrap().as_deref(), Some("metformin"));
    }

    #[test]
    fn nothing_to_encrypt() {
        let c = cipher();
        assert_eq!(c.encrypt("").unwrap(), None);
        assert_eq!(c.encrypt_json(&Value::Null).unwrap(), None);
        assert_eq!(c.encrypt_json(&json!("")).unwrap(), None);
    }

    #[test]
    fn nothing_to_decrypt() {
        let c = cipher();
        assert_eq!(c.decrypt("").unwrap(), None);
        assert_eq!(c.decrypt_json(&Value::Null).unwrap(), None);
        assert_eq!(c.decrypt_json(&json!(42)).unwrap(), None);
    }

    #[test]
    fn invalid_format_is_a_decryption_error() {
        let c = cipher();
        assert!(matches!(
            c.decrypt("not-a-valid-format"),
            Err(CipherError::Decryption(_))
        ));
    }

    #[test]
    fn numbers_encrypt_as_text() {
        let c = cipher();
        let enc = c.encrypt_json(&json!(72.5)).unwrap().unwrap();
        assert_eq!(c.decrypt(&enc).unwrap().as_deref(), Some("72.5"));
    }

    #[test]
    fn ephemeral_keys_cannot_read_each_other() {
        // Restarting without ENCRYPTION_KEY yields a new key; prior data is lost.
        let before_restart = cipher();
        let after_restart = cipher();
        assert_ne!(before_restart.fingerprint(), after_restart.fingerprint());
        let enc = before_restart.encrypt("Type 2").unwrap().unwrap();
        match after_restart.decrypt(&enc) {
            Err(_) => {}
            Ok(recovered) => assert_ne!(recovered.as_deref(), Some("Type 2")),
        }
    }

    #[test]
    fn plaintext_coercion() {
        assert_eq!(plaintext_of(&json!(120)).as_deref(), Some("120"));
        assert_eq!(plaintext_of(&json!(120.0)).as_deref(), Some("120"));
        assert_eq!(plaintext_of(&json!(5.5)).as_deref(), Some("5.5"));
        assert_eq!(plaintext_of(&json!(-3)).as_deref(), Some("-3"));
        assert_eq!(plaintext_of(&json!(true)).as_deref(), Some("true"));
        assert_eq!(plaintext_of(&json!({"k": 1})).as_deref(), Some(r#"{"k":1}"#));
        assert_eq!(plaintext_of(&json!(null)), None);
        assert_eq!(plaintext_of(&json!("")), None);
    }

    #[test]
    fn large_integral_floats_print_as_digits() {
        assert_eq!(
            plaintext_of(&json!(1e15)).as_deref(),
            Some("1000000000000000")
        );
        assert_eq!(
            plaintext_of(&json!(1.2345678901234568e17)).as_deref(),
            Some("123456789012345680")
        );
        assert_eq!(
            plaintext_of(&json!(1e20)).as_deref(),
            Some("100000000000000000000")
        );
        assert_eq!(plaintext_of(&json!(-0.0)).as_deref(), Some("0"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn field_cipher_is_send_and_sync() {
        assert_send_sync::<FieldCipher>();
    }

    #[test]
    fn clones_work_concurrently_across_threads() {
        let shared = cipher();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let c = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let plain = format!("reading-{t}-{i}");
                        let enc = c.encrypt(&plain).unwrap().unwrap();
                        assert_eq!(c.decrypt(&enc).unwrap(), Some(plain));
                    }
                    c.encrypt("written on another thread").unwrap().unwrap()
                })
            })
            .collect();

        for handle in handles {
            let enc = handle.join().unwrap();
            assert_eq!(
                shared.decrypt(&enc).unwrap().as_deref(),
                Some("written on another thread")
            );
        }
    }
}
