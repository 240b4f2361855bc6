use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::request::{RequestError, ServiceAccountRequest};

/// Environment variable overriding `project_id`.
pub const ENV_PROJECT_ID: &str = "SAKEY_PROJECT_ID";
/// Environment variable overriding `display_name`.
pub const ENV_DISPLAY_NAME: &str = "SAKEY_DISPLAY_NAME";
/// Environment variable overriding `role`.
pub const ENV_ROLE: &str = "SAKEY_ROLE";

/// Default environment variable holding the caller's OAuth access token.
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "SAKEY_ACCESS_TOKEN";
/// Default identity-management API endpoint.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.googleapis.com";
/// Default project IAM policy API endpoint.
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";
/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default number of attempts for retryable API calls.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 4;
/// Default base delay between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Project-level configuration loaded from `.sakey.toml`.
///
/// Every field is optional so a config file can hold only the parts an
/// operator wants to pin; the rest comes from the environment or flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Project that will own the service account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Display name of the service account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// IAM role granted to the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Explicit account id. Derived from `display_name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Free-form account description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Where to write the key file, relative to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,

    /// API client settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// `[api]` table: endpoints, credentials and retry behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the identity-management API.
    pub iam_endpoint: String,
    /// Base URL of the project IAM policy API.
    pub resource_manager_endpoint: String,
    /// Environment variable that holds the caller's access token.
    pub access_token_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per API call before a transient failure is surfaced.
    pub max_attempts: u8,
    /// Base retry delay; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            access_token_env: DEFAULT_ACCESS_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Config {
    /// Creates a default configuration with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a `.sakey.toml` file.
    ///
    /// Returns the default configuration if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = read_file(path)?;
        parse_toml(path, &content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Atomically writes this configuration to a `.sakey.toml` file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serialise_toml(self)?;
        write_file(path, &content)
    }

    /// Serialises this configuration to a pretty-printed TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        serialise_toml(self)
    }

    /// Overlays the `SAKEY_*` environment variables that are set and non-empty.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`, which maps an environment variable
    /// name to its value.
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PROJECT_ID) {
            self.project_id = Some(v);
        }
        if let Some(v) = get(ENV_DISPLAY_NAME) {
            self.display_name = Some(v);
        }
        if let Some(v) = get(ENV_ROLE) {
            self.role = Some(v);
        }

        self
    }

    /// Builds and validates the request described by this configuration.
    pub fn to_request(&self) -> Result<ServiceAccountRequest, RequestError> {
        let mut builder = ServiceAccountRequest::builder(
            self.project_id.clone().unwrap_or_default(),
            self.display_name.clone().unwrap_or_default(),
            self.role.clone().unwrap_or_default(),
        );

        if let Some(account_id) = &self.account_id {
            builder = builder.account_id(account_id.as_str());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.as_str());
        }

        builder.build()
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), ConfigError> {
    crate::fs_util::atomic_write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_toml(path: &Path, content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn serialise_toml(config: &Config) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize { source })
}

/// Errors that can occur when reading, parsing, serialising, or writing
/// a `.sakey.toml` configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// Path to the config file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file contained invalid TOML or unexpected values.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// Path to the config file that could not be parsed.
        path: PathBuf,
        /// The underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// The in-memory configuration could not be serialised to TOML.
    #[error("failed to serialise config: {source}")]
    Serialize {
        /// The underlying TOML serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// The config file could not be written to disk.
    #[error("failed to write config '{path}': {source}")]
    Write {
        /// Path to the config file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns the file path associated with this error, if any.
    ///
    /// `ConfigError::Serialize` errors have no associated path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => Some(path),
            Self::Serialize { .. } => None,
        }
    }
}
