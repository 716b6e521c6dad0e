#![forbid(unsafe_code)]
//! Env Read Guard (erg) for Claude Code.
//!
//! Blocks file reads whose path contains `.env`. This hook runs before the
//! Read tool executes.
//!
//! Exit behavior:
//!   - Exit 0 with no output = allow
//!   - Exit 2 with "You cannot read the .env file." on stderr = block
//!   - Exit 1 = the request could not be read or parsed

use clap::Parser;
use colored::Colorize;
use env_read_guard::cli::{self, Cli};
use env_read_guard::config::{Config, SourceStatus};
use env_read_guard::evaluator::{Verdict, evaluate_input};
use env_read_guard::hook::{self, MALFORMED_INPUT_EXIT_CODE};
use env_read_guard::logging::DecisionLogger;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// Build metadata from vergen (set by build.rs)
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");
const CARGO_TARGET: Option<&str> = option_env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Filter for verbose diagnostics, e.g. `ERG_LOG=trace`.
const ENV_LOG_FILTER: &str = "ERG_LOG";

/// Print version information.
fn print_version() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
    eprintln!(
        "{} {}",
        "erg".green().bold(),
        format!("v{PKG_VERSION}").as_str().cyan()
    );
    eprintln!("{}", "Env Read Guard - blocks reads of .env files".bright_black());
    if let Some(ts) = BUILD_TIMESTAMP {
        let date = ts.split('T').next().unwrap_or(ts);
        eprintln!("  {} {}", "Built:".bright_black(), date);
    }
    if let Some(rustc) = RUSTC_SEMVER {
        eprintln!("  {} {}", "Rustc:".bright_black(), rustc);
    }
    if let Some(target) = CARGO_TARGET {
        eprintln!("  {} {}", "Target:".bright_black(), target);
    }
}

/// Install a stderr tracing subscriber. Only called in verbose mode.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(ENV_LOG_FILTER).unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Evaluate one hook request from stdin.
fn run_hook() -> ExitCode {
    let (config, sources) = Config::load_with_sources();
    if config.general.verbose {
        init_tracing();
    }
    for source in &sources {
        if let SourceStatus::Invalid(message) = &source.status {
            warn!(layer = source.layer.label(), "ignoring config file: {message}");
        }
    }

    // Blocks until the host closes stdin.
    let input = match hook::read_hook_input(io::stdin().lock()) {
        Ok(input) => input,
        Err(e) => {
            // Fail fast: never guess a verdict for a request we cannot read.
            eprintln!("[erg] error: {e}");
            return ExitCode::from(MALFORMED_INPUT_EXIT_CODE);
        }
    };

    let evaluation = evaluate_input(&input);

    if let Some(logger) = DecisionLogger::new(&config.logging) {
        logger.log(&evaluation, &input);
    }

    if evaluation.verdict == Verdict::Deny {
        hook::output_denial(&mut io::stderr().lock());
    }
    ExitCode::from(evaluation.verdict.exit_code())
}

fn main() -> ExitCode {
    // Check for --version flag (useful when run directly, not as hook)
    if std::env::args_os().skip(1).any(|a| a == "--version" || a == "-V") {
        print_version();
        return ExitCode::SUCCESS;
    }

    // Exit status 2 is reserved for deny, so argument errors exit 1 rather
    // than clap's default.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            };
        }
    };

    if cli.command.is_some() {
        return match cli::run_command(cli) {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(1)
            }
        };
    }

    run_hook()
}
