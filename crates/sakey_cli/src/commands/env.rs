//! Env command - exports a key file as environment variable assignments.

use std::path::Path;

use anyhow::Context as _;
use console::style;
use sakey_core::{CredentialFile, CredentialWriter, EnvFormat, WrittenFile, render_env};

use super::overwrite_policy;
use crate::EnvArgs;
use crate::ui::{colors, indicators, print_command_header, print_field, print_warning};

/// Executes the `sakey env` command.
///
/// The rendered assignments contain the private key, so they go through the
/// same owner-only writer as the key file and are never printed.
pub fn run(args: &EnvArgs) -> super::Result {
    print_command_header("env");

    let file = CredentialFile::load(&args.key_file)?;
    let rendered = render_env(&file, args.format)
        .with_context(|| format!("cannot export {}", args.key_file.display()))?;

    let writer = CredentialWriter::new(overwrite_policy(&args.output, args.force));
    let written = writer.write(&args.output, &rendered)?;

    print_results(&args.key_file, args.format, &written);

    Ok(())
}

fn print_results(source: &Path, format: EnvFormat, written: &WrittenFile) {
    println!(
        "{} {} {}",
        colors::success().apply_to(indicators::ADDED),
        style(written.path.display()).bold(),
        colors::muted().apply_to(if written.replaced { "(replaced, 0600)" } else { "(0600)" })
    );
    println!();
    print_field("from", source.display());
    print_field("format", format_name(format));
    print_field("fingerprint", &written.fingerprint);
    println!();
    print_warning(&format!(
        "{} holds the private key; keep it out of version control",
        written.path.display()
    ));
}

const fn format_name(format: EnvFormat) -> &'static str {
    match format {
        EnvFormat::Dotenv => "dotenv",
        EnvFormat::Shell => "shell",
        EnvFormat::Settings => "settings",
    }
}
