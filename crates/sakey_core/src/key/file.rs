use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Value of the `type` field in every service account key file.
pub const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Default OAuth authorisation endpoint written by the provider.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Default OAuth token endpoint written by the provider.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Default certificate listing endpoint written by the provider.
pub const DEFAULT_AUTH_PROVIDER_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";

/// Errors raised while reading or interpreting a key file.
#[derive(Debug, thiserror::Error)]
pub enum KeyFileError {
    /// The key file could not be read from disk.
    #[error("failed to read key file '{path}': {source}")]
    Read {
        /// Path to the key file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The content is not a JSON key file.
    #[error("failed to parse key file: {source}")]
    Parse {
        /// The underlying JSON error. Never carries key material.
        #[source]
        source: serde_json::Error,
    },

    /// The `type` field is not `service_account`.
    #[error("unsupported credential type '{0}' (expected '{SERVICE_ACCOUNT_TYPE}')")]
    UnsupportedType(String),

    /// One or more required fields are empty.
    #[error("key file is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A derived document could not be serialised.
    #[error("failed to render credentials: {source}")]
    Render {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// The provider's JSON key file schema.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialFile {
    /// Credential type, always `service_account`.
    #[serde(rename = "type", default)]
    pub credential_type: String,
    /// Project owning the account.
    #[serde(default)]
    pub project_id: String,
    /// Identifier of the key within the account.
    #[serde(default)]
    pub private_key_id: String,
    /// PEM-encoded private key.
    #[serde(default)]
    pub private_key: String,
    /// Email of the service account.
    #[serde(default)]
    pub client_email: String,
    /// Numeric OAuth client id of the account.
    #[serde(default)]
    pub client_id: String,
    /// OAuth authorisation endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// OAuth token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Endpoint listing the provider's signing certificates.
    #[serde(default = "default_auth_provider_cert_url")]
    pub auth_provider_x509_cert_url: String,
    /// Endpoint listing this account's public certificates.
    #[serde(default)]
    pub client_x509_cert_url: String,
    /// Universe domain, present in newer key files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe_domain: Option<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_auth_provider_cert_url() -> String {
    DEFAULT_AUTH_PROVIDER_CERT_URL.to_string()
}

impl CredentialFile {
    /// Reads and parses a key file.
    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| KeyFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parses key-file JSON.
    pub fn from_json(content: &str) -> Result<Self, KeyFileError> {
        serde_json::from_str(content).map_err(|source| KeyFileError::Parse { source })
    }

    /// Returns the names of required fields that are empty, in file order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.named_fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Fails unless this is a complete service account key file.
    ///
    /// An absent or blank `type` is reported as a missing field.
    pub fn validate(&self) -> Result<(), KeyFileError> {
        let mut missing = Vec::new();
        if self.credential_type.trim().is_empty() {
            missing.push("type");
        } else if self.credential_type != SERVICE_ACCOUNT_TYPE {
            return Err(KeyFileError::UnsupportedType(self.credential_type.clone()));
        }

        missing.extend(self.missing_fields());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(KeyFileError::MissingFields(missing))
        }
    }

    /// Returns every required field paired with its value, `type` excluded.
    #[must_use]
    pub fn named_fields(&self) -> [(&'static str, &str); 9] {
        [
            ("project_id", self.project_id.as_str()),
            ("private_key_id", self.private_key_id.as_str()),
            ("private_key", self.private_key.as_str()),
            ("client_email", self.client_email.as_str()),
            ("client_id", self.client_id.as_str()),
            ("auth_uri", self.auth_uri.as_str()),
            ("token_uri", self.token_uri.as_str()),
            ("auth_provider_x509_cert_url", self.auth_provider_x509_cert_url.as_str()),
            ("client_x509_cert_url", self.client_x509_cert_url.as_str()),
        ]
    }
}

impl fmt::Debug for CredentialFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFile")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
