#![forbid(unsafe_code)]
//! Env Read Guard (erg) library.
//!
//! Claude Code `PreToolUse` hook that blocks file reads targeting `.env`
//! secrets files.
//!
//! # Architecture
//!
//! - [`hook`]: stdin protocol, request decoding, candidate-path extraction
//! - [`evaluator`]: the `.env` predicate and the raw-bytes entry point
//! - [`config`]: layered TOML configuration for ambient behavior
//! - [`logging`]: optional append-only decision log
//! - [`cli`]: `clap` surface for the `erg` binary

pub mod cli;
pub mod config;
pub mod evaluator;
pub mod hook;
pub mod logging;

pub use config::Config;
pub use evaluator::{
    Evaluation, SECRET_FILE_TOKEN, Verdict, evaluate, evaluate_input, evaluate_path,
};
pub use hook::{
    CandidatePath, DENY_EXIT_CODE, DENY_MESSAGE, HookInput, HookReadError,
    MALFORMED_INPUT_EXIT_CODE, PathSource, ToolInput, read_hook_input,
};
pub use logging::{DecisionLogger, LogEntry, LogFormat, LoggingConfig};
