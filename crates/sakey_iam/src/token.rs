//! Caller credentials for the provisioning API.

use std::fmt;

use crate::error::ProvisionError;

/// OAuth bearer token of the identity performing the provisioning.
///
/// The token is obtained out of band (for example with
/// `gcloud auth print-access-token`) and handed over through an
/// environment variable. `Debug` never prints it.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the token from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, ProvisionError> {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    /// Reads the token through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(var: &str, lookup: F) -> Result<Self, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Self)
            .ok_or_else(|| ProvisionError::MissingToken { var: var.to_string() })
    }

    pub(crate) fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(********)")
    }
}
