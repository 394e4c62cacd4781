//! Encryption of source credentials at rest.
//!
//! Source configs may carry an API credential under `source_key`. It is
//! sealed when the source is created and only opened by the component that
//! fetches data for the source. The rule pipeline never touches it.
//!
//! Ciphertext format: hex of `nonce (12 bytes) || AES-256-GCM ciphertext`.
//! A sealed `source_key` carries the [`SEALED_PREFIX`] tag in front of it, so
//! a config read back from the API can be written again unchanged.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde_json::Value;

/// Config field holding the sealed credential.
pub const SOURCE_KEY_FIELD: &str = "source_key";

/// Tag in front of a sealed `source_key` value.
pub const SEALED_PREFIX: &str = "sealed:v1:";

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret key must be 32 bytes encoded as 64 hex characters")]
    InvalidKey,

    #[error("Ciphertext is not valid hex or is truncated")]
    MalformedCiphertext,

    #[error("Ciphertext failed authentication")]
    Decryption,

    #[error("Encryption failed")]
    Encryption,

    #[error("Config field '{0}' must be a string")]
    NotAString(&'static str),

    #[error("Config has no '{0}' field")]
    MissingField(&'static str),

    #[error("Config field '{0}' is not sealed")]
    NotSealed(&'static str),
}

/// AES-256-GCM cipher over UTF-8 strings.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

impl SecretCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build from a 64-character hex key, as stored in `SOURCE_SECRET_KEY`.
    pub fn from_hex(key_hex: &str) -> Result<Self, SecretError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|_| SecretError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| SecretError::InvalidKey)?;
        Ok(Self::new(&key))
    }

    /// Fresh random key, hex-encoded.
    pub fn generate_key_hex() -> String {
        hex::encode(rand::random::<[u8; KEY_LEN]>())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        let nonce_bytes = rand::random::<[u8; NONCE_LEN]>();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| SecretError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, SecretError> {
        let raw = hex::decode(encoded).map_err(|_| SecretError::MalformedCiphertext)?;
        if raw.len() <= NONCE_LEN {
            return Err(SecretError::MalformedCiphertext);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::Decryption)
    }
}

/// Seals and opens the `source_key` field of a source config.
#[derive(Debug, Clone)]
pub struct SourceSecrets {
    cipher: SecretCipher,
}

impl SourceSecrets {
    pub fn new(cipher: SecretCipher) -> Self {
        Self { cipher }
    }

    /// Encrypt `config.source_key` in place. Configs without the field (or
    /// with `null`) are left untouched.
    ///
    /// A value that is already sealed is kept as is, after checking that it
    /// opens under this key.
    pub fn seal(&self, config: &mut Value) -> Result<(), SecretError> {
        let slot = match config.get_mut(SOURCE_KEY_FIELD) {
            None | Some(Value::Null) => return Ok(()),
            Some(slot) => slot,
        };
        let value = slot
            .as_str()
            .ok_or(SecretError::NotAString(SOURCE_KEY_FIELD))?;
        if let Some(ciphertext) = value.strip_prefix(SEALED_PREFIX) {
            self.cipher.decrypt(ciphertext)?;
            return Ok(());
        }
        let sealed = format!("{SEALED_PREFIX}{}", self.cipher.encrypt(value)?);
        *slot = Value::String(sealed);
        Ok(())
    }

    /// Decrypt `config.source_key`. Returns `Ok(None)` when the field is
    /// absent or `null`.
    pub fn open(&self, config: &Value) -> Result<Option<String>, SecretError> {
        match config.get(SOURCE_KEY_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(sealed)) => {
                let ciphertext = sealed
                    .strip_prefix(SEALED_PREFIX)
                    .ok_or(SecretError::NotSealed(SOURCE_KEY_FIELD))?;
                self.cipher.decrypt(ciphertext).map(Some)
            }
            Some(_) => Err(SecretError::NotAString(SOURCE_KEY_FIELD)),
        }
    }

    /// Like [`open`](Self::open) but the field is required.
    pub fn open_required(&self, config: &Value) -> Result<String, SecretError> {
        self.open(config)?
            .ok_or(SecretError::MissingField(SOURCE_KEY_FIELD))
    }
}
