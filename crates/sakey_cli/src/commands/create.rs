//! Create command - provisions an account, grants its role and writes a key.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context as _, anyhow};
use console::style;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use sakey_core::{Config, CredentialWriter, ServiceAccountRequest, WrittenFile};
use sakey_iam::{AccessToken, BindingChange, ClientSettings, IamClient, Provisioned, Step, provision_with};

use super::overwrite_policy;
use crate::ui::{
    colors, create_spinner, format_duration, indicators, is_interactive, print_command_header, print_field, print_hint,
    print_info, print_success,
};
use crate::{CONFIG_FILENAME, CreateArgs};

/// Executes the `sakey create` command.
///
/// Everything that can be checked locally (config, naming rules, key path)
/// is checked before the first API call, so a refused write never leaves a
/// key behind on the provider side.
pub fn run(args: &CreateArgs) -> super::Result {
    print_command_header("create");

    let config = load_config(args)?;
    let request = config.to_request().context("invalid service account request")?;
    let key_path = config
        .key_path
        .clone()
        .ok_or_else(|| anyhow!("no key path: pass --key-path or set key_path in {CONFIG_FILENAME}"))?;

    print_plan(&request, &key_path);

    if args.dry_run {
        println!();
        print_info("dry run: no API calls were made");
        return Ok(());
    }

    let writer = CredentialWriter::new(overwrite_policy(&key_path, args.force));
    writer.check_target(&key_path)?;

    if !args.yes && is_interactive() && !confirm_provision() {
        println!();
        print_info("cancelled: nothing was created");
        return Ok(());
    }

    let token = AccessToken::from_env(&config.api.access_token_env)?;
    let client = IamClient::new(ClientSettings::from(&config.api), token)?;

    let start = Instant::now();
    let provisioned = run_provisioning(&client, &request)?;

    let written = writer
        .write(&key_path, &provisioned.key.private_key_material)
        .with_context(|| {
            format!(
                "key {} for {} was created but not saved; delete it before retrying",
                provisioned.key.key_id, provisioned.account.email
            )
        })?;

    print_results(&request, &provisioned, &written, start.elapsed());

    Ok(())
}

/// Merges file, environment and flag values (flags win).
fn load_config(args: &CreateArgs) -> anyhow::Result<Config> {
    let config_path = args.config.as_deref().unwrap_or_else(|| Path::new(CONFIG_FILENAME));
    let config = Config::load(config_path)?.apply_env();

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %config_path.display(), exists = config_path.exists(), "loaded configuration");

    Ok(apply_flags(config, args))
}

fn apply_flags(mut config: Config, args: &CreateArgs) -> Config {
    if let Some(project) = &args.project {
        config.project_id = Some(project.clone());
    }
    if let Some(name) = &args.name {
        config.display_name = Some(name.clone());
    }
    if let Some(role) = &args.role {
        config.role = Some(role.clone());
    }
    if let Some(account_id) = &args.account_id {
        config.account_id = Some(account_id.clone());
    }
    if let Some(description) = &args.description {
        config.description = Some(description.clone());
    }
    if let Some(key_path) = &args.key_path {
        config.key_path = Some(key_path.clone());
    }
    config
}

fn print_plan(request: &ServiceAccountRequest, key_path: &Path) {
    println!(
        "{} {}",
        colors::info().apply_to(indicators::INFO),
        colors::secondary().apply_to("plan")
    );
    for (idx, step) in Step::ALL.iter().enumerate() {
        println!(
            "  {} {}",
            colors::muted().apply_to(format!("{}.", idx + 1)),
            colors::secondary().apply_to(step.describe(request))
        );
    }
    println!(
        "  {} {}",
        colors::muted().apply_to(format!("{}.", Step::ALL.len() + 1)),
        colors::secondary().apply_to(format!("write the key to {} (mode 0600)", key_path.display()))
    );
}

fn confirm_provision() -> bool {
    println!();
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Create the account and key?")
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn run_provisioning(client: &IamClient, request: &ServiceAccountRequest) -> anyhow::Result<Provisioned> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to create async runtime: {e}"))?;

    println!();
    let spinner = create_spinner(&Step::CheckDisplayName.to_string());
    let result = rt.block_on(provision_with(client, request, |step| {
        spinner.set_message(step.to_string());
    }));
    spinner.finish_and_clear();

    Ok(result?)
}

fn print_results(
    request: &ServiceAccountRequest,
    provisioned: &Provisioned,
    written: &WrittenFile,
    elapsed: std::time::Duration,
) {
    print_success(&format!(
        "service account ready {}",
        colors::muted().apply_to(format!("({})", format_duration(elapsed)))
    ));
    println!();

    let binding = match provisioned.binding {
        BindingChange::Added => format!("{} granted", request.role),
        BindingChange::AlreadyPresent => format!("{} already granted", request.role),
    };

    print_field("account", colors::accent().apply_to(&provisioned.account.email));
    print_field("role", binding);
    print_field("key id", &provisioned.key.key_id);
    print_field("fingerprint", &written.fingerprint);
    print_field("valid from", provisioned.key.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    println!();
    println!(
        "{} {} {}",
        colors::success().apply_to(indicators::ADDED),
        style(written.path.display()).bold(),
        colors::muted().apply_to(if written.replaced { "(replaced, 0600)" } else { "(0600)" })
    );
    println!();
    print_hint(&format!("sakey inspect {}", display_path(&written.path)), "check the key file");
}

fn display_path(path: &Path) -> String {
    let shown = path.display().to_string();
    if shown.contains(' ') { format!("'{shown}'") } else { shown }
}
