//! Convenience re-exports of the most commonly used types.

pub use crate::config::{ApiConfig, Config, ConfigError};
pub use crate::env::EnvFormat;
pub use crate::error::SakeyError;
pub use crate::key::{CredentialFile, KeyFileError, PrivateKeyMaterial, ServiceAccountKey};
pub use crate::request::{RequestError, ServiceAccountRequest};
pub use crate::writer::{CredentialWriter, OverwritePolicy, WriteError, WrittenFile};
