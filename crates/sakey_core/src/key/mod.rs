//! Issued service account keys and the provider's key-file schema.

mod file;
mod material;

use chrono::{DateTime, Utc};

pub use file::{
    CredentialFile, DEFAULT_AUTH_PROVIDER_CERT_URL, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI, KeyFileError,
    SERVICE_ACCOUNT_TYPE,
};
pub use material::PrivateKeyMaterial;

/// A freshly issued key for a service account.
///
/// Only the writer ever sees `private_key_material` in clear; everything
/// else (logs, terminal output, errors) uses [`PrivateKeyMaterial::fingerprint`].
#[derive(Debug, Clone)]
pub struct ServiceAccountKey {
    /// Provider-assigned key identifier.
    pub key_id: String,
    /// The JSON key file returned by the provider.
    pub private_key_material: PrivateKeyMaterial,
    /// Email of the account the key belongs to.
    pub account_email: String,
    /// When the key became valid.
    pub created_at: DateTime<Utc>,
}

impl ServiceAccountKey {
    /// Parses the key material as a provider key file.
    pub fn credential_file(&self) -> Result<CredentialFile, KeyFileError> {
        CredentialFile::from_json(self.private_key_material.expose())
    }

    /// Returns the fingerprint of the key material.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        self.private_key_material.fingerprint()
    }
}
