//! UI helpers for consistent output formatting.

use std::fmt::Display;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Single-character Unicode glyphs used as status indicators.
pub mod indicators {
    /// Error indicator (✖).
    pub const ERROR: &str = "✖";
    /// Warning indicator (⚠).
    pub const WARNING: &str = "⚠";
    /// Informational indicator (ℹ).
    pub const INFO: &str = "ℹ";
    /// Success indicator (✓).
    pub const SUCCESS: &str = "✓";
    /// Addition indicator (+).
    pub const ADDED: &str = "+";
}

/// Semantic colour palette for terminal output.
pub mod colors {
    use console::Style;

    /// Red - errors.
    pub const fn error() -> Style {
        Style::new().red()
    }

    /// Yellow - warnings and refusals.
    pub const fn warning() -> Style {
        Style::new().yellow()
    }

    /// Cyan - informational messages.
    pub const fn info() -> Style {
        Style::new().cyan()
    }

    /// Green - success messages.
    pub const fn success() -> Style {
        Style::new().green()
    }

    /// Light grey - secondary descriptive text.
    pub const fn secondary() -> Style {
        Style::new().color256(252)
    }

    /// Dark grey - muted/contextual text.
    pub const fn muted() -> Style {
        Style::new().color256(243)
    }

    /// Cyan - accent highlights (emails, commands).
    pub const fn accent() -> Style {
        Style::new().cyan()
    }

    /// White - emphasised inline text.
    pub const fn emphasis() -> Style {
        Style::new().white()
    }
}

/// Process exit codes.
pub mod exit {
    use sakey_core::{SakeyError, WriteError};
    use sakey_iam::ProvisionError;

    /// The operation was refused: an existing file or account was left alone.
    pub const REFUSED: i32 = 1;
    /// An unrecoverable error occurred.
    pub const ERROR: i32 = 2;

    /// Picks the exit code for an error returned by a command.
    #[must_use]
    pub fn code_for(error: &anyhow::Error) -> i32 {
        let refused = error.chain().any(|cause| {
            cause
                .downcast_ref::<WriteError>()
                .is_some_and(|e| matches!(e, WriteError::AlreadyExists { .. }))
                || cause
                    .downcast_ref::<ProvisionError>()
                    .is_some_and(|e| matches!(e, ProvisionError::Conflict { .. }))
                || cause.downcast_ref::<SakeyError>().is_some_and(SakeyError::is_refusal)
        });

        if refused { REFUSED } else { ERROR }
    }
}

/// Prints a styled `sakey <command>` header with surrounding blank lines.
pub fn print_command_header(command: &str) {
    println!();
    println!(
        "{} {}",
        colors::accent().bold().apply_to("sakey"),
        colors::muted().apply_to(command)
    );
    println!();
}

/// Prints a command hint line (`command  description`).
pub fn print_hint(command: &str, description: &str) {
    const CMD_WIDTH: usize = 28;

    println!(
        "  {}  {}",
        colors::accent().apply_to(format!("{command:<CMD_WIDTH$}")),
        colors::muted().apply_to(description)
    );
}

/// Prints an aligned `label  value` line.
pub fn print_field(label: &str, value: impl Display) {
    const LABEL_WIDTH: usize = 12;

    println!(
        "  {}  {}",
        colors::muted().apply_to(format!("{label:<LABEL_WIDTH$}")),
        colors::emphasis().apply_to(value)
    );
}

/// Prints a red error message to stderr.
pub fn print_error(message: &str) {
    eprintln!(
        "{} {}",
        colors::error().apply_to(indicators::ERROR),
        colors::secondary().apply_to(message)
    );
}

/// Prints a yellow warning message to stderr.
pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        colors::warning().apply_to(indicators::WARNING),
        colors::secondary().apply_to(message)
    );
}

/// Prints a cyan informational message to stdout.
pub fn print_info(message: &str) {
    println!(
        "{} {}",
        colors::info().apply_to(indicators::INFO),
        colors::secondary().apply_to(message)
    );
}

/// Prints a green success message to stdout.
pub fn print_success(message: &str) {
    println!(
        "{} {}",
        colors::success().apply_to(indicators::SUCCESS),
        colors::secondary().apply_to(message)
    );
}

/// Returns `true` when a person is at the terminal to answer prompts.
#[must_use]
pub fn is_interactive() -> bool {
    console::user_attended() && console::Term::stdout().is_term()
}

const PROGRESS_TICK_MS: u64 = 100;

/// Creates a spinner for long-running API calls. Hidden when not on a terminal.
#[must_use]
pub fn create_spinner(message: &str) -> ProgressBar {
    if !is_interactive() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();

    #[expect(
        clippy::expect_used,
        reason = "static template string; failure is a programmer error"
    )]
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.243}")
            .expect("invalid progress template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );

    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
    pb
}

/// Formats an elapsed time as whole milliseconds below one second, else seconds.
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Formats Unix permission bits as `0600`, or `n/a` where there are none.
#[must_use]
pub fn format_mode(mode: Option<u32>) -> String {
    mode.map_or_else(|| "n/a".to_string(), |m| format!("{m:04o}"))
}

/// Returns the shared clap colour theme used by all CLI subcommands.
#[must_use]
pub fn clap_styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Effects, Style};

    clap::builder::Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Cyan.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::BrightBlack.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(Style::new().fg_color(Some(AnsiColor::Red.into())))
        .error(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}
