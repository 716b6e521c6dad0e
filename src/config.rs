//! Configuration system for erg.
//!
//! Configuration only covers ambient behavior (decision log, diagnostics,
//! colors). Nothing here can change whether a read is allowed.
//!
//! Sources, merged in priority order:
//! 1. Environment variables (highest priority)
//! 2. Explicit file named by `ERG_CONFIG`
//! 3. Project config (.erg.toml, searched up to the repo root)
//! 4. User config (~/.config/erg/config.toml)
//! 5. System config (/etc/erg/config.toml)
//! 6. Compiled defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{LogFormat, LoggingConfig};

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "ERG";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "ERG_CONFIG";

/// Directory name under the system and user config roots.
const APP_DIR: &str = "erg";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
const PROJECT_CONFIG_NAME: &str = ".erg.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Decision log settings.
    pub logging: LoggingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Color output mode for CLI subcommands.
    pub color: ColorMode,

    /// Emit tracing diagnostics on stderr.
    pub verbose: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" => Some(Self::Always),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

/// Which layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    System,
    User,
    Project,
    Explicit,
}

impl ConfigLayer {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Project => "project",
            Self::Explicit => ENV_CONFIG_PATH,
        }
    }
}

/// Outcome of trying to load one config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Loaded,
    Missing,
    /// The file exists but could not be read or parsed. It was ignored.
    Invalid(String),
}

/// A config file that was consulted during [`Config::load_with_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub status: SourceStatus,
}

/// One config file as written. Keys left out of the file stay `None`, so a
/// layer can set a value back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct ConfigFile {
    general: GeneralFile,
    logging: LoggingFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct GeneralFile {
    color: Option<ColorMode>,
    verbose: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct LoggingFile {
    enabled: Option<bool>,
    file: Option<String>,
    format: Option<LogFormat>,
    events: EventsFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct EventsFile {
    deny: Option<bool>,
    allow: Option<bool>,
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    ///
    /// Unreadable or invalid files are skipped.
    #[must_use]
    pub fn load() -> Self {
        Self::load_with_sources().0
    }

    /// Like [`Config::load`], also reporting every file that was consulted.
    #[must_use]
    pub fn load_with_sources() -> (Self, Vec<ConfigSource>) {
        let mut config = Self::default();
        let mut sources = Vec::new();
        let cwd = env::current_dir().ok();

        let mut candidates = vec![(
            ConfigLayer::System,
            PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE_NAME),
        )];
        if let Some(path) = Self::user_config_path() {
            candidates.push((ConfigLayer::User, path));
        }
        if let Some(path) = cwd.as_deref().and_then(find_project_config) {
            candidates.push((ConfigLayer::Project, path));
        }
        if let Ok(value) = env::var(ENV_CONFIG_PATH) {
            if let Some(path) = resolve_config_path_value(&value, cwd.as_deref()) {
                candidates.push((ConfigLayer::Explicit, path));
            }
        }

        for (layer, path) in candidates {
            let status = match read_layer(&path) {
                Ok(Some(layer)) => {
                    config.merge(layer);
                    SourceStatus::Loaded
                }
                Ok(None) => SourceStatus::Missing,
                Err(message) => SourceStatus::Invalid(message),
            };
            sources.push(ConfigSource {
                layer,
                path,
                status,
            });
        }

        config.apply_env_overrides();
        (config, sources)
    }

    /// Load configuration from a specific file.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        Self::try_load_from_file(path).ok().flatten()
    }

    /// Load a file, distinguishing "not there" from "broken".
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the file exists but cannot be
    /// read or is not valid config TOML.
    pub fn try_load_from_file(path: &Path) -> Result<Option<Self>, String> {
        Ok(read_layer(path)?.map(|layer| {
            let mut config = Self::default();
            config.merge(layer);
            config
        }))
    }

    /// Path to the user config file, if a config directory exists.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Apply one layer on top of this config. Only keys present in the layer
    /// take effect.
    fn merge(&mut self, layer: ConfigFile) {
        let ConfigFile { general, logging } = layer;

        if let Some(color) = general.color {
            self.general.color = color;
        }
        if let Some(verbose) = general.verbose {
            self.general.verbose = verbose;
        }

        if let Some(enabled) = logging.enabled {
            self.logging.enabled = enabled;
        }
        if logging.file.is_some() {
            self.logging.file = logging.file;
        }
        if let Some(format) = logging.format {
            self.logging.format = format;
        }
        if let Some(deny) = logging.events.deny {
            self.logging.events.deny = deny;
        }
        if let Some(allow) = logging.events.allow {
            self.logging.events.allow = allow;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables.
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // ERG_VERBOSE=1
        if lookup(&format!("{ENV_PREFIX}_VERBOSE")).is_some() {
            self.general.verbose = true;
        }

        // ERG_COLOR=never
        if let Some(color) = lookup(&format!("{ENV_PREFIX}_COLOR"))
            .as_deref()
            .and_then(ColorMode::parse)
        {
            self.general.color = color;
        }

        // ERG_LOG_FILE=~/.local/share/erg/decisions.log
        if let Some(file) = lookup(&format!("{ENV_PREFIX}_LOG_FILE")) {
            if !file.trim().is_empty() {
                self.logging.enabled = true;
                self.logging.file = Some(file);
            }
        }

        // ERG_LOG_FORMAT=json
        if let Some(format) = lookup(&format!("{ENV_PREFIX}_LOG_FORMAT"))
            .as_deref()
            .and_then(LogFormat::parse)
        {
            self.logging.format = format;
        }
    }

    /// Generate a sample configuration string with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        r#"# erg configuration
#
# None of these settings change which reads are blocked.

[general]
# Color output for CLI subcommands: "auto" | "always" | "never"
color = "auto"

# Print diagnostics to stderr (filter with ERG_LOG, e.g. ERG_LOG=trace)
verbose = false

[logging]
# Append every decision to a log file
enabled = false

# Log file path (supports ~/)
# file = "~/.local/share/erg/decisions.log"

# Output format: "text" | "json"
format = "text"

[logging.events]
deny = true
allow = false
"#
        .to_string()
    }
}

/// Read one config file, distinguishing "not there" from "broken".
fn read_layer(path: &Path) -> Result<Option<ConfigFile>, String> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

/// Search for `.erg.toml` from `start` upward, stopping at the repository root.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config_path = current.join(PROJECT_CONFIG_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if current.join(".git").exists() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the value of `ERG_CONFIG` into a path.
///
/// Empty values resolve to `None`. `~/` is expanded and relative paths are
/// joined onto `cwd` when one is given.
#[must_use]
pub fn resolve_config_path_value(value: &str, cwd: Option<&Path>) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let path = expand_tilde(value);
    if path.is_relative() {
        if let Some(cwd) = cwd {
            return Some(cwd.join(path));
        }
    }
    Some(path)
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
