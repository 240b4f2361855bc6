//! Connection settings for [`IamClient`](crate::IamClient).

use std::time::Duration;

use sakey_core::ApiConfig;

/// Endpoints, timeout and retry policy used by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base URL of the IAM API, without a trailing slash.
    pub iam_endpoint: String,
    /// Base URL of the Resource Manager API, without a trailing slash.
    pub resource_manager_endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per call for transient failures. Always at least 1.
    pub max_attempts: u8,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl ClientSettings {
    /// Points both APIs at `base`. Used against local mock servers.
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = trim_endpoint(base);
        self.iam_endpoint.clone_from(&base);
        self.resource_manager_endpoint = base;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retries(mut self, max_attempts: u8, retry_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = retry_backoff;
        self
    }

    /// Delay before the attempt following `attempt`.
    pub(crate) fn backoff_after(&self, attempt: u8) -> Duration {
        self.retry_backoff.saturating_mul(u32::from(attempt))
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for ClientSettings {
    fn from(api: &ApiConfig) -> Self {
        Self {
            iam_endpoint: trim_endpoint(&api.iam_endpoint),
            resource_manager_endpoint: trim_endpoint(&api.resource_manager_endpoint),
            timeout: Duration::from_secs(api.timeout_secs.max(1)),
            max_attempts: api.max_attempts.max(1),
            retry_backoff: Duration::from_millis(api.retry_backoff_ms),
        }
    }
}

fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}
