//! Init command - creates `.sakey.toml` configuration file.

mod prompts;
/// Configuration file template for `sakey init`.
pub mod templates;

use std::path::{Path, PathBuf};
use std::time::Instant;

use console::style;
use sakey_core::{OverwritePolicy, ServiceAccountRequest, WriteError};

use self::templates::TemplateValues;
use super::overwrite_policy;
use crate::ui::{colors, format_duration, indicators, is_interactive, print_command_header, print_hint, print_warning};
use crate::{CONFIG_FILENAME, InitArgs};

/// Executes the `sakey init` command, creating a `.sakey.toml` configuration
/// file either interactively or from flags and placeholders.
///
/// An existing file is only replaced after an interactive confirmation.
pub fn run(args: &InitArgs) -> super::Result {
    print_command_header("init");

    let output_path = args.output.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
    let non_interactive = args.yes || !is_interactive();

    if output_path.exists() && !confirm_replace(&output_path, non_interactive) {
        return Err(WriteError::AlreadyExists { path: output_path }.into());
    }

    let flags = values_from_flags(args);
    let values = if non_interactive {
        flags.with_suggested_key_path()
    } else {
        println!();
        prompts::collect_interactive(&flags)?
    };

    execute(&output_path, &values)
}

fn confirm_replace(path: &Path, non_interactive: bool) -> bool {
    if !non_interactive {
        return overwrite_policy(path, false) == OverwritePolicy::Replace;
    }

    println!(
        "{} {} already exists",
        colors::warning().apply_to(indicators::WARNING),
        style(path.display()).bold()
    );
    println!(
        "  {}",
        colors::secondary().apply_to("run without --yes in a terminal to replace it")
    );
    false
}

fn values_from_flags(args: &InitArgs) -> TemplateValues {
    TemplateValues {
        project_id: args.project.clone(),
        display_name: args.name.clone(),
        role: args.role.clone(),
        key_path: args.key_path.as_ref().map(|p| p.display().to_string()),
    }
}

fn execute(output_path: &Path, values: &TemplateValues) -> anyhow::Result<()> {
    let start = Instant::now();

    let content = templates::build_config(values);
    templates::write_config(output_path, &content)?;
    let elapsed = start.elapsed();

    print_results(output_path, elapsed);

    if let Some(problem) = check_values(values) {
        println!();
        print_warning(&format!("edit {} before running create: {problem}", output_path.display()));
    }

    Ok(())
}

/// Returns why `sakey create` would reject the written values, if it would.
fn check_values(values: &TemplateValues) -> Option<String> {
    let (Some(project_id), Some(display_name), Some(role)) = (&values.project_id, &values.display_name, &values.role)
    else {
        return Some("project_id, display_name and role are required".to_string());
    };

    ServiceAccountRequest::builder(project_id.as_str(), display_name.as_str(), role.as_str())
        .build()
        .err()
        .map(|e| e.to_string())
}

fn print_results(config_path: &Path, elapsed: std::time::Duration) {
    println!();
    println!(
        "{} {} {}",
        colors::success().apply_to(indicators::ADDED),
        style(config_path.display()).bold(),
        colors::muted().apply_to(format!("({})", format_duration(elapsed)))
    );
    println!();
    print_hint("sakey create --dry-run", "show what create would do");
}
