//! CLI command handlers.

/// Provisioning of an account, role binding and key.
pub mod create;
/// Key file export as environment variables.
pub mod env;
/// Project initialisation and `.sakey.toml` creation.
pub mod init;
/// Key file inspection.
pub mod inspect;

use std::path::Path;

use console::style;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use sakey_core::OverwritePolicy;

use crate::ui::{self, colors, indicators};

/// Convenience alias for command return types.
pub type Result<T = ()> = anyhow::Result<T>;

/// Decides whether an existing file at `path` may be replaced.
///
/// `--force` counts as confirmation. Otherwise an existing file is only
/// replaced after the operator says yes at an interactive prompt; without a
/// terminal the answer is no.
pub fn overwrite_policy(path: &Path, force: bool) -> OverwritePolicy {
    if force || !path.exists() {
        return OverwritePolicy::from_confirmation(force);
    }

    println!(
        "{} {} already exists",
        colors::warning().apply_to(indicators::WARNING),
        style(path.display()).bold()
    );

    if !ui::is_interactive() {
        println!(
            "  {}",
            colors::secondary().apply_to("pass --force to replace it")
        );
        return OverwritePolicy::Refuse;
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Overwrite?")
        .default(false)
        .interact()
        .unwrap_or(false);

    OverwritePolicy::from_confirmation(confirmed)
}
