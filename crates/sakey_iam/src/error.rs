//! Provisioning error types.

use std::fmt;

/// The API call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Listing the project's service accounts.
    ListAccounts,
    /// Creating the service account.
    CreateAccount,
    /// Reading one service account.
    GetAccount,
    /// Reading the project IAM policy.
    GetPolicy,
    /// Writing the project IAM policy.
    SetPolicy,
    /// Creating a key for the account.
    CreateKey,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListAccounts => "list service accounts",
            Self::CreateAccount => "create service account",
            Self::GetAccount => "read service account",
            Self::GetPolicy => "read project IAM policy",
            Self::SetPolicy => "update project IAM policy",
            Self::CreateKey => "create service account key",
        };
        f.write_str(name)
    }
}

impl Operation {
    /// Returns `true` for calls that create something on every successful
    /// request. These are only repeated when the server certainly did not act.
    #[must_use]
    pub const fn creates_resource(self) -> bool {
        matches!(self, Self::CreateAccount | Self::CreateKey)
    }

    const fn unconfirmed_hint(self) -> &'static str {
        match self {
            Self::CreateAccount => "check whether the account exists before retrying",
            Self::CreateKey => "list the account's keys and delete any that were not saved",
            _ => "check the project before retrying",
        }
    }
}

/// Errors that can occur while provisioning an account, binding and key.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The caller lacks permission for the operation (HTTP 401/403).
    #[error("not authorised to {operation}: {message}")]
    Authorization {
        /// The rejected call.
        operation: Operation,
        /// Message returned by the API.
        message: String,
    },

    /// A service account with this id or display name already exists.
    #[error("service account {account_email} already exists")]
    Conflict {
        /// Email of the existing account.
        account_email: String,
    },

    /// The service kept failing or was unreachable; retrying later may help.
    #[error("failed to {operation} after {attempts} attempt(s): {message}")]
    Transient {
        /// The failing call.
        operation: Operation,
        /// How many attempts were made.
        attempts: u8,
        /// The last failure seen.
        message: String,
    },

    /// A creating call failed after the request may have reached the
    /// server (timeout, dropped connection, server error). The resource may
    /// exist even though no response was received.
    #[error("{operation} may have completed on the server ({message}); {}", .operation.unconfirmed_hint())]
    Unconfirmed {
        /// The creating call.
        operation: Operation,
        /// The failure seen by the client.
        message: String,
    },

    /// A step after account creation failed, leaving the new account behind.
    #[error("service account {account_email} was created but provisioning stopped; delete it before retrying")]
    Incomplete {
        /// Email of the account created by this run.
        account_email: String,
        /// The failure that stopped provisioning.
        #[source]
        source: Box<ProvisionError>,
    },

    /// The project or account does not exist (HTTP 404).
    #[error("failed to {operation}: not found: {message}")]
    NotFound {
        /// The failing call.
        operation: Operation,
        /// Message returned by the API.
        message: String,
    },

    /// The API rejected the call for another reason.
    #[error("failed to {operation}: HTTP {status}: {message}")]
    Rejected {
        /// The failing call.
        operation: Operation,
        /// HTTP status code.
        status: u16,
        /// Message returned by the API.
        message: String,
    },

    /// The API answered with something that could not be interpreted.
    #[error("unexpected response to {operation}: {message}")]
    InvalidResponse {
        /// The call whose response was malformed.
        operation: Operation,
        /// What was wrong with it.
        message: String,
    },

    /// The HTTP client could not be initialised.
    #[error("failed to initialise HTTP client: {0}")]
    ClientInit(String),

    /// No access token was available.
    #[error("no access token: set {var} to an OAuth access token for the calling identity")]
    MissingToken {
        /// The environment variable that was read.
        var: String,
    },
}

impl ProvisionError {
    /// Returns `true` for failures that may succeed if retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns `true` if this is a rejection with the given HTTP status.
    #[must_use]
    pub const fn has_status(&self, code: u16) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status == code)
    }

    /// Returns the failure underneath any [`ProvisionError::Incomplete`] wrapper.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Incomplete { source, .. } => source.root(),
            other => other,
        }
    }

    /// Converts an HTTP 409 rejection into [`ProvisionError::Conflict`].
    #[must_use]
    pub(crate) fn into_conflict(self, account_email: &str) -> Self {
        if self.has_status(409) {
            Self::Conflict {
                account_email: account_email.to_string(),
            }
        } else {
            self
        }
    }
}
