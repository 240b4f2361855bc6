//! Interactive prompts for init command.

use anyhow::Context as _;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use sakey_core::derive_account_id;

use super::templates::{EXAMPLE_ROLE, KEY_DIR, TemplateValues};

/// Asks for every setting, offering values from flags as defaults.
pub fn collect_interactive(defaults: &TemplateValues) -> anyhow::Result<TemplateValues> {
    let project_id = prompt("Project id", defaults.project_id.as_deref())?;
    let display_name = prompt("Account display name", defaults.display_name.as_deref())?;
    let role = prompt("Role to grant", defaults.role.as_deref().or(Some(EXAMPLE_ROLE)))?;

    let suggested_key_path = defaults.key_path.clone().or_else(|| {
        derive_account_id(&display_name).map(|id| format!("{KEY_DIR}/{id}.json"))
    });
    let key_path = prompt("Key file path", suggested_key_path.as_deref())?;

    Ok(TemplateValues {
        project_id: Some(project_id),
        display_name: Some(display_name),
        role: Some(role),
        key_path: Some(key_path),
    })
}

fn prompt(label: &str, default: Option<&str>) -> anyhow::Result<String> {
    let theme = ColorfulTheme::default();
    let mut input = Input::<String>::with_theme(&theme)
        .with_prompt(label)
        .validate_with(|value: &String| -> Result<(), &str> {
            if value.trim().is_empty() {
                Err("a value is required")
            } else {
                Ok(())
            }
        });

    if let Some(default) = default {
        input = input.default(default.to_string());
    }

    let value = input.interact_text().with_context(|| format!("reading {label}"))?;
    Ok(value.trim().to_string())
}
