//! Local side of sakey: configuration, request validation, the key model
//! and the credential writer.
//!
//! Nothing in this crate talks to the network. The provisioning client
//! lives in `sakey_iam`; the `sakey` binary lives in `sakey_cli`.
//!
//! # Main Types
//!
//! - [`ServiceAccountRequest`] - A validated account/role/key request
//! - [`ServiceAccountKey`] - An issued key, with its material kept opaque
//! - [`CredentialWriter`] - Writes key material to owner-only files
//! - [`Config`] - User configuration loaded from `.sakey.toml`
//!
//! # Error Handling
//!
//! This crate uses [`thiserror`] for structured, typed errors that library
//! consumers can match on:
//!
//! - [`ConfigError`] - Configuration loading/parsing failures
//! - [`RequestError`] - Naming rule violations
//! - [`KeyFileError`] - Unreadable or incomplete key files
//! - [`WriteError`] - Refused or failed credential writes
//! - [`SakeyError`] - Top-level error enum combining the above
//!
//! The CLI crate (`sakey_cli`) uses `anyhow` for error propagation.

/// User configuration loaded from `.sakey.toml`.
pub mod config;
/// Rendering key files as environment variable assignments.
pub mod env;
/// Top-level error type.
pub mod error;
/// Filesystem helpers for atomic and owner-only writes.
pub mod fs_util;
/// Issued keys, key material and the key-file schema.
pub mod key;
/// Common re-exports for internal use.
pub mod prelude;
/// Service account requests and naming rules.
pub mod request;
#[cfg(test)]
pub(crate) mod test_utils;
/// Owner-only credential file writer.
pub mod writer;

pub use config::{ApiConfig, Config, ConfigError};
pub use env::{EnvFormat, render as render_env};
pub use error::SakeyError;
pub use key::{CredentialFile, KeyFileError, PrivateKeyMaterial, ServiceAccountKey};
pub use request::{RequestError, ServiceAccountRequest, ServiceAccountRequestBuilder, derive_account_id};
pub use writer::{CredentialWriter, OverwritePolicy, WriteError, WrittenFile};

/// Default filename for sakey configuration.
pub const CONFIG_FILENAME: &str = ".sakey.toml";
