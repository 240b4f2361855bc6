use std::fmt;

use sha2::{Digest, Sha256};

/// Prefix prepended to the hex-encoded SHA-256 digest in fingerprints.
const HASH_PREFIX: &str = "sha256:";

/// Secret bytes of a key file, or of any document derived from one.
///
/// The value is only reachable through [`PrivateKeyMaterial::expose`].
/// `Debug` shows the fingerprint only. There is no `Display` or `Serialize`
/// implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyMaterial {
    raw: String,
    fingerprint: Box<str>,
}

impl PrivateKeyMaterial {
    /// Wraps raw material and computes its fingerprint.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let fingerprint = format!("{HASH_PREFIX}{}", hex::encode(Sha256::digest(raw.as_bytes()))).into();
        Self { raw, fingerprint }
    }

    /// Returns the raw material. Only the credential writer and the env
    /// exporter should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.raw
    }

    /// Returns the `sha256:<hex>` digest of the material, safe to print.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns a shortened fingerprint for terminal output.
    #[must_use]
    pub fn short_fingerprint(&self) -> &str {
        let end = (HASH_PREFIX.len() + 16).min(self.fingerprint.len());
        &self.fingerprint[..end]
    }

    /// Returns the length of the material in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the material is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("fingerprint", &self.fingerprint)
            .field("len", &self.raw.len())
            .finish_non_exhaustive()
    }
}
