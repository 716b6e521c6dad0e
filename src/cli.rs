//! CLI argument parsing and command handling.
//!
//! Without a subcommand, `erg` runs in hook mode and reads the request from
//! stdin. The subcommands are for humans: checking a path by hand and
//! inspecting the effective configuration.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::config::{ColorMode, Config, ConfigSource, SourceStatus};
use crate::evaluator::{SECRET_FILE_TOKEN, Verdict, evaluate_path};

/// Claude Code hook that blocks file reads of `.env` secrets files.
///
/// Register `erg` as a `PreToolUse` hook for the Read tool. It exits 2 with a
/// message on stderr when the requested path contains `.env`, and exits 0
/// silently otherwise.
#[derive(Parser, Debug)]
#[command(name = "erg")]
#[command(version, about, long_about = None)]
#[command(after_help = "Run without a subcommand to evaluate a hook request from stdin.")]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether reading PATH would be blocked (exit 2 if so)
    #[command(name = "check")]
    Check {
        /// Path to evaluate, exactly as the tool would pass it
        path: String,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Show the effective configuration and where it came from
    #[command(name = "config")]
    Config {
        /// Print a commented sample configuration instead
        #[arg(long)]
        sample: bool,
    },
}

/// Output format for `erg check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Machine-readable result of `erg check`.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    path: &'a str,
    decision: &'static str,
    matched: Option<&'static str>,
}

/// Apply the configured color mode to `colored`.
pub fn configure_colors(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

/// Run a subcommand and return the process exit status.
///
/// # Errors
///
/// Returns an error if writing to stdout fails or the configuration cannot be
/// serialized.
pub fn run_command(cli: Cli) -> Result<u8, Box<dyn std::error::Error>> {
    let (config, sources) = Config::load_with_sources();
    configure_colors(config.general.color);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Some(Command::Check { path, format }) => check_path(&mut out, &path, format),
        Some(Command::Config { sample }) => {
            if sample {
                write!(out, "{}", Config::generate_sample_config())?;
            } else {
                show_config(&mut out, &config, &sources)?;
            }
            Ok(0)
        }
        None => Ok(0),
    }
}

/// Evaluate a literal path and report the verdict.
///
/// Returns the same exit status hook mode would use.
///
/// # Errors
///
/// Returns an error if writing the report fails.
pub fn check_path<W: Write>(
    out: &mut W,
    path: &str,
    format: OutputFormat,
) -> Result<u8, Box<dyn std::error::Error>> {
    let verdict = evaluate_path(path);
    match format {
        OutputFormat::Json => {
            let report = CheckReport {
                path,
                decision: verdict.label(),
                matched: verdict.is_denied().then_some(SECRET_FILE_TOKEN),
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        OutputFormat::Pretty => {
            let label = match verdict {
                Verdict::Allow => "ALLOW".green().bold(),
                Verdict::Deny => "DENY".red().bold(),
            };
            writeln!(out, "{} {}", "Decision:".bright_black(), label)?;
            writeln!(out, "{} {}", "Path:".bright_black(), path.white())?;
            if verdict.is_denied() {
                writeln!(
                    out,
                    "{} path contains {}",
                    "Reason:".bright_black(),
                    format!("\"{SECRET_FILE_TOKEN}\"").as_str().yellow()
                )?;
            }
        }
    }
    Ok(verdict.exit_code())
}

fn show_config<W: Write>(
    out: &mut W,
    config: &Config,
    sources: &[ConfigSource],
) -> io::Result<()> {
    writeln!(out, "{}", "Configuration sources:".bold())?;
    for source in sources {
        let status = match &source.status {
            SourceStatus::Loaded => "loaded".green().to_string(),
            SourceStatus::Missing => "missing".bright_black().to_string(),
            SourceStatus::Invalid(message) => format!("{} ({message})", "ignored".yellow()),
        };
        writeln!(
            out,
            "  - {}: {} [{status}]",
            source.layer.label(),
            source.path.display()
        )?;
    }
    writeln!(out)?;
    writeln!(out, "{}", "General:".bold())?;
    writeln!(out, "  Color: {}", config.general.color)?;
    writeln!(out, "  Verbose: {}", config.general.verbose)?;
    writeln!(out)?;
    writeln!(out, "{}", "Decision log:".bold())?;
    writeln!(out, "  Enabled: {}", config.logging.enabled)?;
    writeln!(
        out,
        "  File: {}",
        config.logging.file.as_deref().unwrap_or("(none)")
    )?;
    writeln!(out, "  Format: {:?}", config.logging.format)?;
    writeln!(
        out,
        "  Events: deny={} allow={}",
        config.logging.events.deny, config.logging.events.allow
    )?;
    Ok(())
}
