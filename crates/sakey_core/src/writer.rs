//! Persists key material to owner-only files.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::fs_util;
use crate::key::PrivateKeyMaterial;

/// What to do when the target file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Leave the existing file untouched and fail.
    #[default]
    Refuse,
    /// Replace the existing file. Only use after the operator confirmed it.
    Replace,
}

impl OverwritePolicy {
    /// Maps an explicit operator confirmation to a policy.
    #[must_use]
    pub const fn from_confirmation(confirmed: bool) -> Self {
        if confirmed { Self::Replace } else { Self::Refuse }
    }
}

/// Errors raised while writing a credential file.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The target exists and overwriting was not confirmed.
    #[error("'{path}' already exists; refusing to overwrite it without confirmation")]
    AlreadyExists {
        /// The existing file.
        path: PathBuf,
    },

    /// The file could not be written.
    #[error("failed to write '{path}': {source}")]
    Io {
        /// The target file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// Returns the path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyExists { path } | Self::Io { path, .. } => path,
        }
    }
}

/// Summary of a successful write. Never contains the material itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Where the material was written.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: usize,
    /// Fingerprint of the written material.
    pub fingerprint: String,
    /// Whether an existing file was replaced.
    pub replaced: bool,
}

/// Writes key material with owner-only permissions, honouring an overwrite policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialWriter {
    policy: OverwritePolicy,
}

impl CredentialWriter {
    /// Creates a writer with the given overwrite policy.
    #[must_use]
    pub const fn new(policy: OverwritePolicy) -> Self {
        Self { policy }
    }

    /// Returns the writer's overwrite policy.
    #[must_use]
    pub const fn policy(&self) -> OverwritePolicy {
        self.policy
    }

    /// Fails if writing to `path` would be refused.
    ///
    /// Run this before doing anything irreversible (such as asking the
    /// provider for a new key) so a refused write cannot strand work.
    pub fn check_target(&self, path: &Path) -> Result<(), WriteError> {
        if path.is_dir() {
            return Err(WriteError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "target is a directory"),
            });
        }

        if self.policy == OverwritePolicy::Refuse && path.exists() {
            return Err(WriteError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    /// Writes `material` to `path` with mode `0600`.
    pub fn write(&self, path: &Path, material: &PrivateKeyMaterial) -> Result<WrittenFile, WriteError> {
        self.check_target(path)?;

        let replaced = path.exists();
        let replace = self.policy == OverwritePolicy::Replace;

        #[cfg(feature = "tracing")]
        debug!(path = %path.display(), replace, "writing credential file");

        fs_util::write_private(path, material.expose().as_bytes(), replace).map_err(|source| {
            // A parent path component that is a file also reports AlreadyExists.
            if source.kind() == io::ErrorKind::AlreadyExists && path.exists() {
                WriteError::AlreadyExists {
                    path: path.to_path_buf(),
                }
            } else {
                WriteError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        #[cfg(feature = "tracing")]
        info!(
            path = %path.display(),
            fingerprint = material.fingerprint(),
            "credential file written"
        );

        Ok(WrittenFile {
            path: path.to_path_buf(),
            bytes: material.len(),
            fingerprint: material.fingerprint().to_string(),
            replaced,
        })
    }
}
