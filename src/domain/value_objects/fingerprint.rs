//! Content Fingerprint Value Object
//!
//! A SHA-256 content hash in `sha256:<hex>` form, used to identify file
//! content independently of where it is stored.
//!
//! Fingerprint equality is treated as content identity throughout the
//! engine (no-op patch detection, idempotent re-upload).

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content fingerprint value object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Prefix for SHA-256 fingerprints
    pub const PREFIX: &'static str = "sha256:";

    /// Create from a raw hash string (prefix added if missing)
    pub fn new(raw: &str) -> Self {
        if raw.starts_with(Self::PREFIX) {
            Self(raw.to_string())
        } else {
            Self(format!("{}{}", Self::PREFIX, raw))
        }
    }

    /// Compute the fingerprint of a byte slice
    pub fn from_bytes(content: &[u8]) -> Self {
        let hash = Sha256::digest(content);
        Self(format!("{}{:x}", Self::PREFIX, hash))
    }

    /// Compute the fingerprint of a reader's content (streaming)
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(format!("{}{:x}", Self::PREFIX, hasher.finalize())))
    }

    /// Full fingerprint string with prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex part without the prefix
    pub fn hex(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_adds_prefix_if_missing() {
        let fp = Fingerprint::new("abc123");
        assert_eq!(fp.as_str(), "sha256:abc123");
    }

    #[test]
    fn new_keeps_prefix_if_present() {
        let fp = Fingerprint::new("sha256:abc123");
        assert_eq!(fp.as_str(), "sha256:abc123");
    }

    #[test]
    fn from_bytes_computes_sha256() {
        let fp = Fingerprint::from_bytes(b"hello");
        assert!(fp.as_str().starts_with("sha256:"));
        assert_eq!(fp.hex().len(), 64);
    }

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(
            Fingerprint::from_bytes(b"site content"),
            Fingerprint::from_bytes(b"site content")
        );
    }

    #[test]
    fn different_content_different_fingerprint() {
        assert_ne!(
            Fingerprint::from_bytes(b"v1"),
            Fingerprint::from_bytes(b"v2")
        );
    }

    #[test]
    fn reader_matches_bytes() {
        let content = b"<html>hi</html>";
        let from_reader = Fingerprint::from_reader(&content[..]).unwrap();
        assert_eq!(from_reader, Fingerprint::from_bytes(content));
    }

    #[test]
    fn serde_is_transparent() {
        let fp = Fingerprint::new("abc");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, "\"sha256:abc\"");
    }
}
