//! Inspect command - shows what a key file belongs to without printing the key.

use std::path::Path;

use anyhow::Context as _;
use console::style;
use sakey_core::fs_util::{self, PRIVATE_FILE_MODE};
use sakey_core::{CredentialFile, KeyFileError, PrivateKeyMaterial};
use serde::Serialize;

use crate::InspectArgs;
use crate::ui::{colors, format_mode, indicators, print_command_header, print_field, print_warning};

/// Everything `inspect` reports. Deliberately has no field for the private key.
#[derive(Debug, Serialize)]
struct KeySummary<'a> {
    path: String,
    client_email: &'a str,
    project_id: &'a str,
    private_key_id: &'a str,
    client_id: &'a str,
    token_uri: &'a str,
    fingerprint: &'a str,
    mode: Option<String>,
}

/// Executes the `sakey inspect` command.
pub fn run(args: &InspectArgs) -> super::Result {
    let path = args.key_file.as_path();
    let content = std::fs::read_to_string(path).map_err(|source| KeyFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let material = PrivateKeyMaterial::new(content);

    let file = CredentialFile::from_json(material.expose())?;
    file.validate()
        .with_context(|| format!("{} is not a usable key file", path.display()))?;

    let mode = fs_util::file_mode(path).with_context(|| format!("reading permissions of {}", path.display()))?;
    let summary = summarise(path, &file, &material, mode);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_command_header("inspect");
    print_summary(&summary);

    if mode.is_some_and(|m| m & 0o077 != 0) {
        println!();
        print_warning(&format!(
            "{} is readable by other users; run `chmod {PRIVATE_FILE_MODE:o} {}`",
            path.display(),
            path.display()
        ));
    }

    Ok(())
}

fn summarise<'a>(
    path: &Path,
    file: &'a CredentialFile,
    material: &'a PrivateKeyMaterial,
    mode: Option<u32>,
) -> KeySummary<'a> {
    KeySummary {
        path: path.display().to_string(),
        client_email: &file.client_email,
        project_id: &file.project_id,
        private_key_id: &file.private_key_id,
        client_id: &file.client_id,
        token_uri: &file.token_uri,
        fingerprint: material.fingerprint(),
        mode: mode.map(|m| format_mode(Some(m))),
    }
}

fn print_summary(summary: &KeySummary<'_>) {
    println!(
        "{} {}",
        colors::info().apply_to(indicators::INFO),
        style(&summary.path).bold()
    );
    println!();
    print_field("account", colors::accent().apply_to(summary.client_email));
    print_field("project", summary.project_id);
    print_field("key id", summary.private_key_id);
    print_field("client id", summary.client_id);
    print_field("fingerprint", summary.fingerprint);
    print_field("mode", summary.mode.as_deref().unwrap_or("n/a"));
}
