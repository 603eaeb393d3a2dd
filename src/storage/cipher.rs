//! Reversible at-rest encoding for sensitive values.
//!
//! The store only relies on the round-trip law `decode(encode(v)) == v`.
//! The default cipher is an obfuscation layer, not cryptography; a stronger
//! implementation can be dropped in behind [`ValueCipher`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::TetherError;

/// Marker prepended to every encoded value.
const FORMAT_TAG: &str = "v1:";

/// Reversible string encoding.
pub trait ValueCipher: Send + Sync {
    /// Encode a plaintext value.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Encoding` if the value cannot be encoded.
    fn encode(&self, plain: &str) -> Result<String, TetherError>;

    /// Decode a value produced by [`ValueCipher::encode`].
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Encoding` if the input was not produced by this cipher.
    fn decode(&self, encoded: &str) -> Result<String, TetherError>;
}

/// XOR keystream over the configured key material, wrapped in base64.
#[derive(Clone)]
pub struct ObfuscationCipher {
    key: Vec<u8>,
}

impl ObfuscationCipher {
    /// Create a cipher from key material. Empty material uses a fixed key.
    #[must_use]
    pub fn new(key_material: &str) -> Self {
        let key = if key_material.is_empty() {
            b"tether".to_vec()
        } else {
            key_material.as_bytes().to_vec()
        };
        Self { key }
    }

    fn apply(&self, bytes: &mut [u8]) {
        for (byte, k) in bytes.iter_mut().zip(self.key.iter().cycle()) {
            *byte ^= k;
        }
    }
}

impl std::fmt::Debug for ObfuscationCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationCipher").finish_non_exhaustive()
    }
}

impl ValueCipher for ObfuscationCipher {
    fn encode(&self, plain: &str) -> Result<String, TetherError> {
        let mut bytes = plain.as_bytes().to_vec();
        self.apply(&mut bytes);
        Ok(format!("{FORMAT_TAG}{}", STANDARD.encode(bytes)))
    }

    fn decode(&self, encoded: &str) -> Result<String, TetherError> {
        let body = encoded
            .strip_prefix(FORMAT_TAG)
            .ok_or_else(|| TetherError::Encoding("Unrecognized encoding format".to_string()))?;

        let mut bytes = STANDARD
            .decode(body)
            .map_err(|e| TetherError::Encoding(format!("Invalid base64: {e}")))?;
        self.apply(&mut bytes);

        String::from_utf8(bytes)
            .map_err(|e| TetherError::Encoding(format!("Decoded value is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = ObfuscationCipher::new("secret");

        for value in ["", "token-123", "ünïcödé ✓", r#"{"name":"Sam","age":30}"#] {
            let encoded = cipher.encode(value).unwrap();
            assert!(encoded.starts_with(FORMAT_TAG));
            assert_eq!(cipher.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_encoded_differs_from_plain() {
        let cipher = ObfuscationCipher::new("secret");
        let encoded = cipher.encode("auth-token-value").unwrap();
        assert!(!encoded.contains("auth-token-value"));
    }

    #[test]
    fn test_decode_rejects_foreign_input() {
        let cipher = ObfuscationCipher::new("secret");

        assert!(matches!(cipher.decode("plain text"), Err(TetherError::Encoding(_))));
        assert!(matches!(cipher.decode("v1:not base64!"), Err(TetherError::Encoding(_))));
    }

    #[test]
    fn test_empty_key_material() {
        let cipher = ObfuscationCipher::new("");
        let encoded = cipher.encode("value").unwrap();
        assert_eq!(cipher.decode(&encoded).unwrap(), "value");
    }
}
