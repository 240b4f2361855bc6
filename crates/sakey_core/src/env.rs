//! Renders a key file as environment variable assignments.
//!
//! Some consumers do not read a key file at all but rebuild the credential
//! from one environment variable per key-file field, with the PEM's
//! newlines escaped as `\n`. The output contains the private key, so it is
//! returned as [`PrivateKeyMaterial`] and must go through the credential
//! writer like the key file itself.

use std::fmt::Write as _;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::key::{CredentialFile, KeyFileError, PrivateKeyMaterial};

/// Output layout for [`render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvFormat {
    /// `NAME="value"` lines, as read by dotenv loaders.
    #[default]
    Dotenv,
    /// `export NAME="value"` lines, for sourcing from a POSIX shell.
    Shell,
    /// A `local.settings.json` document with the values under `Values`.
    Settings,
}

impl FromStr for EnvFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dotenv" => Ok(Self::Dotenv),
            "shell" => Ok(Self::Shell),
            "settings" => Ok(Self::Settings),
            _ => Err(format!("unknown env format '{s}' (expected dotenv, shell or settings)")),
        }
    }
}

/// Renders every required field of `file` in the given format.
///
/// Fails with [`KeyFileError::MissingFields`] if the key file is incomplete,
/// so consumers never start with a partial credential.
pub fn render(file: &CredentialFile, format: EnvFormat) -> Result<PrivateKeyMaterial, KeyFileError> {
    file.validate()?;

    let fields = file.named_fields();

    let rendered = match format {
        EnvFormat::Dotenv => render_lines(&fields, ""),
        EnvFormat::Shell => render_lines(&fields, "export "),
        EnvFormat::Settings => render_settings(&fields)?,
    };

    Ok(PrivateKeyMaterial::new(rendered))
}

fn render_lines(fields: &[(&str, &str)], prefix: &str) -> String {
    let mut out = String::new();
    for (name, value) in fields {
        let _ = writeln!(out, "{prefix}{name}=\"{}\"", escape_value(value));
    }
    out
}

fn render_settings(fields: &[(&str, &str)]) -> Result<String, KeyFileError> {
    let values: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| ((*name).to_string(), Value::String(escape_newlines(value))))
        .collect();

    let document = serde_json::json!({
        "IsEncrypted": false,
        "Values": values,
    });

    let mut out = serde_json::to_string_pretty(&document).map_err(|source| KeyFileError::Render { source })?;
    out.push('\n');
    Ok(out)
}

/// Escapes a value for a double-quoted dotenv or shell assignment.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Replaces real newlines with the two-character `\n` sequence.
fn escape_newlines(value: &str) -> String {
    value.replace("\r\n", "\\n").replace('\n', "\\n")
}
