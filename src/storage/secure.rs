//! Key/value store with selective at-rest obfuscation.
//!
//! Values under a sensitive key (per `security.sensitive_keys`) are encoded
//! with a [`ValueCipher`] and stored under a derived key, so encoded and raw
//! values never share a slot. Everything else is stored verbatim. Keys that
//! start with [`SECURE_KEY_PREFIX`] are reserved for derived slots and
//! rejected.
//!
//! Read helpers come in two flavors: `get_*` degrades every failure to
//! `None` (and logs it), `read_*` propagates backend failures. Callers that
//! read-modify-write must use the strict flavor or they risk overwriting
//! data they could not read.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::backend::KeyValueBackend;
use super::cipher::{ObfuscationCipher, ValueCipher};
use crate::config::{Config, Feature};
use crate::error::TetherError;

/// Prefix of the derived key holding an encoded value.
pub const SECURE_KEY_PREFIX: &str = "secure:";

/// Persisted key/value storage with sensitive-key obfuscation.
pub struct SecureStore {
    backend: Arc<dyn KeyValueBackend>,
    cipher: Arc<dyn ValueCipher>,
    sensitive_keys: BTreeSet<String>,
    encryption_enabled: bool,
}

impl SecureStore {
    /// Create a store using the default cipher seeded from the config.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: &Config) -> Self {
        let cipher = Arc::new(ObfuscationCipher::new(&config.security.key_material));
        Self::with_cipher(backend, cipher, config)
    }

    /// Create a store with a custom cipher.
    #[must_use]
    pub fn with_cipher(
        backend: Arc<dyn KeyValueBackend>,
        cipher: Arc<dyn ValueCipher>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            cipher,
            sensitive_keys: config.security.sensitive_keys.iter().cloned().collect(),
            encryption_enabled: config.is_enabled(Feature::Encryption),
        }
    }

    /// Whether `key` is designated sensitive.
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_keys.contains(key)
    }

    fn encodes(&self, key: &str) -> bool {
        self.encryption_enabled && self.is_sensitive(key)
    }

    fn storage_key<'a>(&self, key: &'a str) -> Result<Cow<'a, str>, TetherError> {
        if key.starts_with(SECURE_KEY_PREFIX) {
            return Err(TetherError::InvalidOperation(format!(
                "Key {key} uses the reserved prefix {SECURE_KEY_PREFIX}"
            )));
        }

        if self.encodes(key) {
            Ok(Cow::Owned(format!("{SECURE_KEY_PREFIX}{key}")))
        } else {
            Ok(Cow::Borrowed(key))
        }
    }

    /// Store a string value.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::InvalidOperation` for a key with the reserved
    /// prefix, or an error if encoding or the backend write fails.
    pub fn set_item(&self, key: &str, value: &str) -> Result<(), TetherError> {
        let storage_key = self.storage_key(key)?;
        if self.encodes(key) {
            let encoded = self.cipher.encode(value)?;
            self.backend.set(&storage_key, &encoded)
        } else {
            self.backend.set(&storage_key, value)
        }
    }

    /// Read a string value, propagating backend and decode failures.
    ///
    /// # Errors
    ///
    /// Returns an error for a key with the reserved prefix, if the backend
    /// cannot be read, or if the stored value does not decode.
    pub fn read_item(&self, key: &str) -> Result<Option<String>, TetherError> {
        let storage_key = self.storage_key(key)?;
        let Some(stored) = self.backend.get(&storage_key)? else {
            return Ok(None);
        };

        if self.encodes(key) {
            self.cipher.decode(&stored).map(Some)
        } else {
            Ok(Some(stored))
        }
    }

    /// Read a string value. Absence and every failure yield `None`.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        match self.read_item(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Treating key {key} as absent: {e}");
                None
            },
        }
    }

    /// Delete a value. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error for a key with the reserved prefix or if the backend
    /// write fails.
    pub fn remove_item(&self, key: &str) -> Result<(), TetherError> {
        self.backend.remove(&self.storage_key(key)?)
    }

    /// Serialize a value to JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set_object<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), TetherError> {
        let json = serde_json::to_string(value)?;
        self.set_item(key, &json)
    }

    /// Read and deserialize a JSON value, propagating every failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the read, decoding or deserialization fails.
    pub fn read_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TetherError> {
        match self.read_item(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Read and deserialize a JSON value. Absence and every failure yield `None`.
    #[must_use]
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.get_item(key)?;
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Treating key {key} as absent, stored JSON is invalid: {e}");
                None
            },
        }
    }

    /// Remove every sensitive key, both encoded and plain slots.
    ///
    /// All keys are attempted even if one removal fails.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure encountered.
    pub fn clear_sensitive_data(&self) -> Result<(), TetherError> {
        let mut first_error = None;

        for key in &self.sensitive_keys {
            let encoded_slot = format!("{SECURE_KEY_PREFIX}{key}");
            for slot in [encoded_slot.as_str(), key.as_str()] {
                if let Err(e) = self.backend.remove(slot) {
                    warn!("Failed to clear sensitive key {key}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!("Cleared {} sensitive keys", self.sensitive_keys.len());
        first_error.map_or(Ok(()), Err)
    }
}
