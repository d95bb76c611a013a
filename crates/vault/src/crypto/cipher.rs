//! AES-256-CBC encryption and decryption of individual field values.
//!
//! **Wire compatibility:** values are PKCS#7-padded and stored as
//! `<iv hex>:<ciphertext hex>`, byte-for-byte what Node's
//! `crypto.createCipheriv('aes-256-cbc', key, iv)` produces, so records written
//! by the existing backend decrypt here and vice versa.
//!
//! **CBC carries no authentication tag.** A wrong key or corrupted ciphertext
//! is detected only through invalid padding or invalid UTF-8, which catches
//! most but not all damage. Do not use these values as integrity proofs.

use std::{fmt, str::FromStr};

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use once_cell::sync::Lazy;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use thiserror::Error;

use crate::key::EncryptionKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Byte length of an AES-CBC initialisation vector (one block).
pub const IV_LEN: usize = 16;

/// AES block size; CBC ciphertext is always a multiple of it.
const BLOCK_LEN: usize = 16;

/// Separator between the IV and ciphertext segments.
pub const SEPARATOR: char = ':';

static ENCRYPTED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{32}:.+$").expect("encrypted value pattern is valid"));

/// Why a stored value could not be decrypted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Not exactly two `:`-separated segments, or an empty ciphertext segment.
    #[error("invalid encrypted data format")]
    InvalidFormat,

    /// A segment is not valid hex.
    #[error("encrypted data is not valid hex")]
    InvalidHex,

    /// The IV segment does not decode to [`IV_LEN`] bytes.
    #[error("invalid IV length: expected {IV_LEN} bytes, got {0}")]
    InvalidIv(usize),

    /// The ciphertext is not a whole number of AES blocks.
    #[error("ciphertext length {0} is not a multiple of the block size")]
    InvalidCiphertextLength(usize),

    /// Padding check failed: wrong key or tampered ciphertext.
    #[error("bad padding (wrong key or corrupted ciphertext)")]
    BadPadding,

    /// The plaintext is not UTF-8: wrong key or tampered ciphertext.
    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The cipher primitive refused to encrypt.
    #[error("failed to encrypt data: {0}")]
    Encryption(String),

    /// The value could not be decrypted.
    #[error("failed to decrypt data: {0}")]
    Decryption(#[from] DecryptFailure),
}

/// A parsed, encrypted field value.
///
/// The string representation is `<32 hex chars of IV>:<hex ciphertext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    /// Raw IV bytes.
    pub iv: [u8; IV_LEN],
    /// Raw ciphertext bytes, padding included.
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            hex::encode(self.iv),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }
}

impl FromStr for EncryptedValue {
    type Err = DecryptFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [iv_hex, ct_hex] = parts.as_slice() else {
            return Err(DecryptFailure::InvalidFormat);
        };
        if ct_hex.is_empty() {
            return Err(DecryptFailure::InvalidFormat);
        }

        let iv_bytes = hex::decode(iv_hex).map_err(|_| DecryptFailure::InvalidHex)?;
        let iv: [u8; IV_LEN] = iv_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecryptFailure::InvalidIv(iv_bytes.len()))?;

        let ciphertext = hex::decode(ct_hex).map_err(|_| DecryptFailure::InvalidHex)?;
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(DecryptFailure::InvalidCiphertextLength(ciphertext.len()));
        }

        Ok(Self { iv, ciphertext })
    }
}

/// Returns `true` if `value` has the shape of an encrypted field.
///
/// Shape only: a match says nothing about which key produced it. Used to
/// avoid encrypting twice and to let legacy plaintext pass through decryption.
pub fn is_encrypted(value: &str) -> bool {
    ENCRYPTED_PATTERN.is_match(value)
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// # Errors
///
/// Returns [`CipherError::Encryption`] if the cipher cannot be initialised.
pub fn encrypt_field(plaintext: &[u8], key: &EncryptionKey) -> Result<EncryptedValue, CipherError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    encrypt_with_iv(plaintext, key, iv)
}

pub(crate) fn encrypt_with_iv(
    plaintext: &[u8],
    key: &EncryptionKey,
    iv: [u8; IV_LEN],
) -> Result<EncryptedValue, CipherError> {
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CipherError::Encryption(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    Ok(EncryptedValue { iv, ciphertext })
}

/// Decrypt an [`EncryptedValue`] back to its UTF-8 plaintext.
///
/// # Errors
///
/// Returns [`DecryptFailure::BadPadding`] or [`DecryptFailure::InvalidUtf8`]
/// when the key is wrong or the ciphertext was altered.
pub fn decrypt_field(value: &EncryptedValue, key: &EncryptionKey) -> Result<String, CipherError> {
    if value.ciphertext.is_empty() || value.ciphertext.len() % BLOCK_LEN != 0 {
        return Err(DecryptFailure::InvalidCiphertextLength(value.ciphertext.len()).into());
    }
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &value.iv)
        .map_err(|_| DecryptFailure::InvalidIv(value.iv.len()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&value.ciphertext)
        .map_err(|_| DecryptFailure::BadPadding)?;
    String::from_utf8(plaintext).map_err(|_| DecryptFailure::InvalidUtf8.into())
}
