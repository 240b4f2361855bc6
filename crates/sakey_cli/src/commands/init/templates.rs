//! Configuration file template.

use std::path::Path;

use anyhow::Context as _;
use sakey_core::config::{DEFAULT_ACCESS_TOKEN_ENV, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT_SECS};
use sakey_core::{derive_account_id, fs_util};

/// Placeholder shown for settings that were not supplied.
pub const EXAMPLE_PROJECT_ID: &str = "my-project";
/// Placeholder display name.
pub const EXAMPLE_DISPLAY_NAME: &str = "Invoice Sorter";
/// Placeholder role.
pub const EXAMPLE_ROLE: &str = "roles/drive.file";
/// Directory suggested for key files.
pub const KEY_DIR: &str = "credentials";

/// Values to put in the generated `.sakey.toml`. `None` leaves the setting commented out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    /// Project to create accounts in.
    pub project_id: Option<String>,
    /// Display name of the account.
    pub display_name: Option<String>,
    /// Role to grant.
    pub role: Option<String>,
    /// Where to write the key file.
    pub key_path: Option<String>,
}

impl TemplateValues {
    /// Suggests `credentials/<account-id>.json` when no key path was given.
    #[must_use]
    pub fn with_suggested_key_path(mut self) -> Self {
        if self.key_path.is_none() {
            self.key_path = self
                .display_name
                .as_deref()
                .and_then(derive_account_id)
                .map(|id| format!("{KEY_DIR}/{id}.json"));
        }
        self
    }
}

/// Generates the `.sakey.toml` configuration file content.
#[must_use]
pub fn build_config(values: &TemplateValues) -> String {
    let project_id = setting("project_id", values.project_id.as_deref(), EXAMPLE_PROJECT_ID);
    let display_name = setting("display_name", values.display_name.as_deref(), EXAMPLE_DISPLAY_NAME);
    let role = setting("role", values.role.as_deref(), EXAMPLE_ROLE);
    let key_path = setting(
        "key_path",
        values.key_path.as_deref(),
        &format!("{KEY_DIR}/invoice-sorter.json"),
    );

    format!(
        r#"# .sakey.toml

{project_id}
{display_name}
{role}
{key_path}

# account_id = "invoice-sorter"
# description = "What this account is for"

[api]
# access_token_env = "{DEFAULT_ACCESS_TOKEN_ENV}"
# timeout_secs = {DEFAULT_TIMEOUT_SECS}
# max_attempts = {DEFAULT_MAX_ATTEMPTS}
# retry_backoff_ms = {DEFAULT_RETRY_BACKOFF_MS}
"#
    )
}

fn setting(name: &str, value: Option<&str>, example: &str) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => format!("{name} = {}", toml::Value::String(v.to_owned())),
        None => format!("# {name} = {}", toml::Value::String(example.to_owned())),
    }
}

/// Writes configuration content to the given file path.
pub fn write_config(path: &Path, content: &str) -> anyhow::Result<()> {
    fs_util::atomic_write(path, content).context("creating config file")
}
