//! # Commands
//!
//! - `sakey create` - Provision a service account, role binding and key
//! - `sakey init` - Create configuration file
//! - `sakey inspect` - Show what a key file belongs to
//! - `sakey env` - Export a key file as environment variables

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use console::style;
pub use sakey_core::CONFIG_FILENAME;
use sakey_core::EnvFormat;

use crate::ui::colors;

const REPO_URL: &str = "https://github.com/spikermint/sakey";

/// Environment variable holding the log filter.
#[cfg(feature = "tracing")]
const LOG_ENV: &str = "SAKEY_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "sakey",
    version,
    styles = ui::clap_styles(),
    arg_required_else_help = true,
)]
struct Cli {
    /// Increase log verbosity (repeat for more detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a service account, grant it a role and write a new key.
    #[command(visible_alias = "c")]
    Create(CreateArgs),

    /// Create a `.sakey.toml` configuration file.
    Init(InitArgs),

    /// Show the account, project and fingerprint of a key file.
    #[command(visible_alias = "i")]
    Inspect(InspectArgs),

    /// Write a key file's fields as environment variable assignments.
    Env(EnvArgs),
}

/// Arguments for the `sakey create` command.
#[derive(Debug, Parser)]
pub struct CreateArgs {
    /// Project to create the account in.
    #[arg(short, long, value_name = "ID")]
    pub project: Option<String>,

    /// Display name of the new account.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Role to grant on the project (e.g. `roles/drive.file`).
    #[arg(short, long)]
    pub role: Option<String>,

    /// Account id (the part of the email before `@`); derived from the name if omitted.
    #[arg(long, value_name = "ID")]
    pub account_id: Option<String>,

    /// Description stored on the account.
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Where to write the key file.
    #[arg(short, long, value_name = "PATH")]
    pub key_path: Option<PathBuf>,

    /// Path to `.sakey.toml` configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overwrite an existing key file without asking.
    #[arg(long)]
    pub force: bool,

    /// Print the planned API calls without making them.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt before provisioning.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `sakey init` command.
#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Skip prompts and use the given flags and defaults.
    #[arg(short, long)]
    pub yes: bool,

    /// Write the config file to a custom path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Project to create accounts in.
    #[arg(short, long, value_name = "ID")]
    pub project: Option<String>,

    /// Display name of the account.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Role to grant on the project.
    #[arg(short, long)]
    pub role: Option<String>,

    /// Where `sakey create` should write the key file.
    #[arg(short, long, value_name = "PATH")]
    pub key_path: Option<PathBuf>,
}

/// Arguments for the `sakey inspect` command.
#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Key file to inspect.
    pub key_file: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `sakey env` command.
#[derive(Debug, Parser)]
pub struct EnvArgs {
    /// Key file to export.
    pub key_file: PathBuf,

    /// File to write the assignments to.
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Output layout: dotenv, shell or settings.
    #[arg(short, long, default_value = "dotenv")]
    pub format: EnvFormat,

    /// Overwrite an existing output file without asking.
    #[arg(long)]
    pub force: bool,
}

fn main() {
    let cli = parse_cli();

    #[cfg(feature = "tracing")]
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        ui::print_error(&format!("{e:#}"));
        std::process::exit(ui::exit::code_for(&e));
    }
}

#[cfg(feature = "tracing")]
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn parse_cli() -> Cli {
    let cmd = Cli::command().about(build_about()).after_help(build_after_help());

    let matches = cmd.get_matches();

    #[expect(clippy::expect_used, reason = "clap already validated args; this cannot fail")]
    Cli::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => commands::create::run(&args),
        Command::Init(args) => commands::init::run(&args),
        Command::Inspect(args) => commands::inspect::run(&args),
        Command::Env(args) => commands::env::run(&args),
    }
}

fn build_about() -> String {
    format!(
        r"
  {} provisions a service account, grants it one role and writes
  a fresh JSON key to an owner-only file.

  Uses your own access token from {}. Never overwrites a key
  file unless you confirm it.",
        colors::accent().apply_to("sakey").bold(),
        colors::accent().apply_to(sakey_core::config::DEFAULT_ACCESS_TOKEN_ENV)
    )
}

fn build_after_help() -> String {
    format!(
        r"
  {}
    sakey init                              Create config file
    sakey create --dry-run                  Show the planned API calls
    sakey create                            Provision using .sakey.toml
    sakey create -p my-proj -n 'Invoice Sorter' -r roles/drive.file -k key.json
    sakey inspect key.json                  Show what a key belongs to
    sakey env key.json -o .env              Export key as env variables

  Learn more: {}",
        style("Examples:").bold(),
        colors::accent().apply_to(REPO_URL).underlined()
    )
}
