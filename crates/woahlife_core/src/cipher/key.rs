//! Master-key references and their resolution.

use crate::error::CipherError;
use base64::Engine;
use std::path::PathBuf;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Where the master key lives. Only the reference is configured; the key
/// itself is read on every cipher call and never persisted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterKeyRef {
    /// Base64 key held in the named environment variable.
    Env(String),
    /// Base64 key held in a file, e.g. a mounted secret.
    File(PathBuf),
}

/// Source of the master key used to wrap per-entry data keys.
pub trait KeyProvider: Send + Sync {
    /// Resolve the current master key.
    ///
    /// # Errors
    /// Returns [`CipherError::KeyUnavailable`] when the key cannot be read or
    /// does not decode to exactly 32 bytes.
    fn master_key(&self) -> Result<[u8; KEY_LEN], CipherError>;
}

fn decode_key(encoded: &str, origin: &str) -> Result<[u8; KEY_LEN], CipherError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| CipherError::KeyUnavailable(format!("{} is not base64: {}", origin, err)))?;
    decoded.as_slice().try_into().map_err(|_| {
        CipherError::KeyUnavailable(format!(
            "{} decodes to {} bytes; expected {}",
            origin,
            decoded.len(),
            KEY_LEN
        ))
    })
}

/// Reads the key from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn master_key(&self) -> Result<[u8; KEY_LEN], CipherError> {
        let value = std::env::var(&self.var)
            .map_err(|_| CipherError::KeyUnavailable(format!("{} is not set", self.var)))?;
        decode_key(&value, &self.var)
    }
}

/// Reads the key from a file at call time.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn master_key(&self) -> Result<[u8; KEY_LEN], CipherError> {
        let origin = self.path.display().to_string();
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|err| CipherError::KeyUnavailable(format!("{}: {}", origin, err)))?;
        decode_key(&contents, &origin)
    }
}

/// Fixed in-memory key for embedding and tests.
#[derive(Clone)]
pub struct StaticKeyProvider {
    key: [u8; KEY_LEN],
}

impl StaticKeyProvider {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }
}

impl std::fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticKeyProvider(..)")
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self) -> Result<[u8; KEY_LEN], CipherError> {
        Ok(self.key)
    }
}

/// Build the provider named by a configured reference.
pub fn provider_for(reference: &MasterKeyRef) -> Box<dyn KeyProvider> {
    match reference {
        MasterKeyRef::Env(var) => Box::new(EnvKeyProvider::new(var.clone())),
        MasterKeyRef::File(path) => Box::new(FileKeyProvider::new(path.clone())),
    }
}
