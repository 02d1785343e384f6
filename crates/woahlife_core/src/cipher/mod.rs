//! Envelope encryption for journal entry payloads.
//!
//! Each payload gets a fresh random data key. The payload is sealed with
//! AES-256-GCM under that data key, and the data key is sealed under the
//! master key resolved from a [`KeyProvider`]. Blob layout:
//!
//! ```text
//! version(1) | key_nonce(12) | wrapped_key(48) | payload_nonce(12) | ciphertext
//! ```

mod key;

pub use key::{
    provider_for, EnvKeyProvider, FileKeyProvider, KeyProvider, MasterKeyRef, StaticKeyProvider,
    KEY_LEN,
};

use crate::error::CipherError;
use crate::models::EntryPayload;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const WRAPPED_KEY_LEN: usize = KEY_LEN + TAG_LEN;
const HEADER_LEN: usize = 1 + NONCE_LEN + WRAPPED_KEY_LEN + NONCE_LEN;

/// Encrypts and decrypts entry payloads.
pub trait PayloadCipher: Send + Sync {
    /// Seal `plaintext` into an opaque blob.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Open a blob produced by [`PayloadCipher::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Encrypt entry text into a binary payload.
    fn seal_text(&self, text: &str) -> Result<EntryPayload, CipherError> {
        self.encrypt(text.as_bytes()).map(EntryPayload::Encrypted)
    }

    /// Plaintext of a stored payload; textual payloads pass through untouched.
    fn open_payload(&self, payload: &EntryPayload) -> Result<String, CipherError> {
        match payload {
            EntryPayload::Plaintext(text) => Ok(text.clone()),
            EntryPayload::Encrypted(blob) => {
                let bytes = self.decrypt(blob)?;
                String::from_utf8(bytes).map_err(|err| {
                    CipherError::DecryptFailed(format!("payload is not UTF-8: {}", err))
                })
            }
        }
    }
}

/// AES-256-GCM envelope cipher keyed by an external master key.
pub struct EnvelopeCipher<K> {
    keys: K,
}

impl<K: KeyProvider> EnvelopeCipher<K> {
    pub fn new(keys: K) -> Self {
        Self { keys }
    }
}

impl EnvelopeCipher<Box<dyn KeyProvider>> {
    /// Cipher resolving its master key through a configured reference.
    pub fn from_reference(reference: &MasterKeyRef) -> Self {
        Self::new(provider_for(reference))
    }
}

impl KeyProvider for Box<dyn KeyProvider> {
    fn master_key(&self) -> Result<[u8; KEY_LEN], CipherError> {
        self.as_ref().master_key()
    }
}

fn aead(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    Aes256Gcm::new_from_slice(key).map_err(|err| CipherError::KeyUnavailable(err.to_string()))
}

impl<K: KeyProvider> PayloadCipher for EnvelopeCipher<K> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let master = aead(&self.keys.master_key()?)?;
        let data_key: [u8; KEY_LEN] = rand::random();
        let key_nonce: [u8; NONCE_LEN] = rand::random();
        let payload_nonce: [u8; NONCE_LEN] = rand::random();

        let wrapped_key = master
            .encrypt(Nonce::from_slice(&key_nonce), data_key.as_slice())
            .map_err(|_| CipherError::EncryptFailed("data key wrap failed".to_string()))?;
        let sealed = aead(&data_key)?
            .encrypt(Nonce::from_slice(&payload_nonce), plaintext)
            .map_err(|_| CipherError::EncryptFailed("payload seal failed".to_string()))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + sealed.len());
        blob.push(ENVELOPE_VERSION);
        blob.extend_from_slice(&key_nonce);
        blob.extend_from_slice(&wrapped_key);
        blob.extend_from_slice(&payload_nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < HEADER_LEN + TAG_LEN {
            return Err(CipherError::DecryptFailed(format!(
                "blob is {} bytes; envelope needs at least {}",
                ciphertext.len(),
                HEADER_LEN + TAG_LEN
            )));
        }
        if ciphertext[0] != ENVELOPE_VERSION {
            return Err(CipherError::DecryptFailed(format!(
                "unknown envelope version {}",
                ciphertext[0]
            )));
        }

        let (key_nonce, rest) = ciphertext[1..].split_at(NONCE_LEN);
        let (wrapped_key, rest) = rest.split_at(WRAPPED_KEY_LEN);
        let (payload_nonce, sealed) = rest.split_at(NONCE_LEN);

        let master = aead(&self.keys.master_key()?)?;
        let data_key = master
            .decrypt(Nonce::from_slice(key_nonce), wrapped_key)
            .map_err(|_| {
                CipherError::DecryptFailed("data key was not wrapped by this master key".to_string())
            })?;
        aead(&data_key)?
            .decrypt(Nonce::from_slice(payload_nonce), sealed)
            .map_err(|_| CipherError::DecryptFailed("payload authentication failed".to_string()))
    }
}

#[cfg(test)]
mod tests;
