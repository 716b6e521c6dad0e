//! Structured logging for allow/deny decisions.
//!
//! When enabled, every recorded decision is appended to a log file as a text
//! line or a JSON line. Logging is best-effort: failures are reported through
//! `tracing` and never change the verdict or the hook's stderr output.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

use crate::config::expand_tilde;
use crate::evaluator::{Evaluation, Verdict};
use crate::hook::HookInput;

// ============================================================================
// Configuration Types
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether decision logging is enabled.
    pub enabled: bool,
    /// Path to log file. Supports ~ expansion.
    pub file: Option<String>,
    /// Output format: "text" or "json".
    pub format: LogFormat,
    /// Events to log.
    pub events: LogEventFilter,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Filter for which events to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub deny: bool,
    pub allow: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            deny: true,
            allow: false,
        }
    }
}

// ============================================================================
// Log Entry
// ============================================================================

/// A structured log entry for one decision.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub decision: &'static str,
    pub path: String,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl LogEntry {
    /// Create a new log entry from an evaluation and the request it came from.
    #[must_use]
    pub fn from_evaluation(evaluation: &Evaluation, input: &HookInput) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            decision: evaluation.verdict.label(),
            path: evaluation.path.clone(),
            source: evaluation.source.label(),
            tool_name: input.tool_name.clone(),
            session_id: input.session_id.clone(),
            cwd: input.cwd.clone(),
        }
    }

    /// Format as text log line.
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut parts = Vec::with_capacity(6);
        parts.push(format!("[{}]", self.timestamp));
        parts.push(self.decision.to_uppercase());
        parts.push(format!("{:?}", self.path));
        parts.push(format!("({})", self.source));
        if let Some(ref tool) = self.tool_name {
            parts.push(format!("tool={tool:?}"));
        }
        if let Some(ref session) = self.session_id {
            parts.push(format!("session={session:?}"));
        }
        if let Some(ref cwd) = self.cwd {
            parts.push(format!("cwd={cwd:?}"));
        }
        parts.join(" ")
    }

    /// Format as JSON line.
    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Logger
// ============================================================================

/// Appends decisions to the configured log file.
pub struct DecisionLogger {
    config: LoggingConfig,
    writer: Mutex<BufWriter<File>>,
}

impl DecisionLogger {
    /// Create a new logger from configuration.
    ///
    /// Returns `None` when logging is disabled, no file is configured, or the
    /// file cannot be opened.
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let Some(path) = config.file.as_deref() else {
            warn!("decision logging is enabled but no log file is configured");
            return None;
        };
        let expanded = expand_tilde(path);
        match open_log_file(&expanded) {
            Ok(file) => Some(Self {
                config: config.clone(),
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(e) => {
                warn!(path = %expanded.display(), error = %e, "cannot open decision log");
                None
            }
        }
    }

    /// Record a decision if the event filter selects it.
    pub fn log(&self, evaluation: &Evaluation, input: &HookInput) {
        if !self.should_log(evaluation.verdict) {
            return;
        }
        let entry = LogEntry::from_evaluation(evaluation, input);
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Ok(mut w) = self.writer.lock() {
            if let Err(e) = writeln!(w, "{line}").and_then(|()| w.flush()) {
                warn!(error = %e, "failed to write decision log entry");
            }
        }
    }

    const fn should_log(&self, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Allow => self.config.events.allow,
            Verdict::Deny => self.config.events.deny,
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
