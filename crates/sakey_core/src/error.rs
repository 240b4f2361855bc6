use thiserror::Error;

/// Top-level error type for sakey's local operations.
///
/// Unifies configuration, request validation, key-file and writer errors
/// for callers that orchestrate the full workflow.
#[derive(Debug, Error)]
pub enum SakeyError {
    /// Configuration could not be read, parsed, or written.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The request violates the provider's naming rules.
    #[error(transparent)]
    Request(#[from] crate::request::RequestError),

    /// A key file could not be read or interpreted.
    #[error(transparent)]
    KeyFile(#[from] crate::key::KeyFileError),

    /// A credential file could not be written.
    #[error(transparent)]
    Write(#[from] crate::writer::WriteError),
}

impl SakeyError {
    /// Returns `true` when the operation was refused rather than failed:
    /// an existing file was protected from being overwritten.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        matches!(self, Self::Write(crate::writer::WriteError::AlreadyExists { .. }))
    }
}
