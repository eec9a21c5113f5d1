use std::fmt;

use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Key length in bytes: a 128-bit signing key followed by a 128-bit encryption key
const KEY_LEN: usize = 32;

const HALF_KEY_LEN: usize = KEY_LEN / 2;

/// Leading byte of every Fernet token
const TOKEN_VERSION: u8 = 0x80;

const TIMESTAMP_LEN: usize = 8;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 32;

/// Version byte, timestamp and IV precede the ciphertext
const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + IV_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// The key is malformed or does not match the token. Retrying never helps.
    #[error("invalid encryption key or token - check ENCRYPTION_KEY")]
    InvalidKeyOrToken,

    #[error("unexpected decryption failure: {0}")]
    Unexpected(String),
}

#[derive(Error, Debug)]
pub enum EncryptError {
    #[error("failed to encrypt value")]
    Cipher,
}

/// A Fernet key, exchanged as URL-safe base64 text.
///
/// Keys and tokens are interchangeable with the ones produced by Python's
/// `cryptography.fernet`, so values provisioned by existing tooling decrypt
/// unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Generate a fresh key from the OS random number generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse the textual form produced by [`SecretKey::encoded`]
    pub fn from_encoded(encoded: &str) -> Result<Self, DecryptError> {
        let bytes = URL_SAFE
            .decode(encoded.trim())
            .map_err(|_| DecryptError::InvalidKeyOrToken)?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| DecryptError::InvalidKeyOrToken)?;
        Ok(Self(bytes))
    }

    /// Textual form suitable for an environment variable
    pub fn encoded(&self) -> String {
        URL_SAFE.encode(self.0)
    }

    fn signing_key(&self) -> &[u8] {
        &self.0[..HALF_KEY_LEN]
    }

    fn encryption_key(&self) -> &[u8] {
        &self.0[HALF_KEY_LEN..]
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Encrypt a plaintext value into a token that [`decrypt`] accepts with the same key.
pub fn encrypt(key: &SecretKey, plaintext: &str) -> Result<String, EncryptError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    seal(key, plaintext.as_bytes(), timestamp, iv)
}

fn seal(
    key: &SecretKey,
    plaintext: &[u8],
    timestamp: u64,
    iv: [u8; IV_LEN],
) -> Result<String, EncryptError> {
    let ciphertext = Aes128CbcEnc::new_from_slices(key.encryption_key(), &iv)
        .map_err(|_| EncryptError::Cipher)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TAG_LEN);
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&timestamp.to_be_bytes());
    token.extend_from_slice(&iv);
    token.extend_from_slice(&ciphertext);

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key.signing_key()).map_err(|_| EncryptError::Cipher)?;
    mac.update(&token);
    token.extend_from_slice(&mac.finalize().into_bytes());

    Ok(URL_SAFE.encode(token))
}

/// Recover a plaintext value from its encrypted token.
///
/// Returns `Ok(None)` when either the key or the token is empty: the value was
/// never provisioned, which callers report as missing credentials rather than
/// a decryption failure. Tokens never expire.
pub fn decrypt(key: &str, ciphertext: &str) -> Result<Option<String>, DecryptError> {
    let (key, ciphertext) = (key.trim(), ciphertext.trim());
    if key.is_empty() || ciphertext.is_empty() {
        return Ok(None);
    }

    let key = SecretKey::from_encoded(key)?;
    let token = URL_SAFE
        .decode(ciphertext)
        .map_err(|_| DecryptError::InvalidKeyOrToken)?;

    if token.len() < HEADER_LEN + TAG_LEN || token[0] != TOKEN_VERSION {
        return Err(DecryptError::InvalidKeyOrToken);
    }
    let (signed, tag) = token.split_at(token.len() - TAG_LEN);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.signing_key())
        .map_err(|e| DecryptError::Unexpected(e.to_string()))?;
    mac.update(signed);
    mac.verify_slice(tag).map_err(|_| DecryptError::InvalidKeyOrToken)?;

    let iv = &signed[1 + TIMESTAMP_LEN..HEADER_LEN];
    let plaintext = Aes128CbcDec::new_from_slices(key.encryption_key(), iv)
        .map_err(|e| DecryptError::Unexpected(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(&signed[HEADER_LEN..])
        .map_err(|_| DecryptError::InvalidKeyOrToken)?;

    String::from_utf8(plaintext)
        .map(Some)
        .map_err(|e| DecryptError::Unexpected(e.to_string()))
}
