//! Shared configuration for the liveroom CLI.
//!
//! A flat TOML settings file layered under `LIVEROOM_*` environment
//! variables, plus the client-side state the UI persists between sessions
//! (push toggle, last table sort). [`Config::to_engine_config`] turns it
//! into the `liveroom_core::EngineConfig` the sync engine runs on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liveroom_core::{EngineConfig, SortState};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Recorder base URL (e.g., "http://127.0.0.1:8080").
    #[serde(default = "default_server")]
    pub server: String,

    /// REST request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Full-list pull period while push is off. Doubled while on.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Subscribe to list-level push events.
    #[serde(default = "default_push_enabled")]
    pub push_enabled: bool,

    /// Log lines fetched when a room is opened.
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Last-applied room table sort.
    #[serde(default)]
    pub sort: SortState,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            timeout: default_timeout(),
            insecure: false,
            poll_interval_ms: default_poll_interval_ms(),
            push_enabled: default_push_enabled(),
            log_lines: default_log_lines(),
            output: default_output(),
            color: default_color(),
            sort: SortState::default(),
        }
    }
}

fn default_server() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_push_enabled() -> bool {
    true
}
fn default_log_lines() -> usize {
    100
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

impl Config {
    /// Validate and translate into the engine's runtime settings.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let url = url::Url::parse(&self.server).map_err(|e| ConfigError::Validation {
            field: "server".into(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "server".into(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let defaults = EngineConfig::default();
        Ok(EngineConfig {
            base_url: self.server.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(self.timeout),
            accept_invalid_certs: self.insecure,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            push_enabled: self.push_enabled,
            log_lines: self.log_lines,
            max_log_lines: defaults.max_log_lines.max(self.log_lines),
            ..defaults
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
///
/// `LIVEROOM_CONFIG` overrides the location outright.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("LIVEROOM_CONFIG") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "liveroom", "liveroom").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("liveroom");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then `LIVEROOM_*`.
///
/// Nested keys use a double underscore: `LIVEROOM_SORT__ORDER=descend`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIVEROOM_").ignore(&["config"]).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// The file contents alone, without environment overrides.
///
/// Used when persisting a single setting so that env values are never
/// written back to disk.
fn load_file(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Read-modify-write of the file at `path`.
pub fn update_config_at(path: &Path, f: impl FnOnce(&mut Config)) -> Result<Config, ConfigError> {
    let mut cfg = load_file(path)?;
    f(&mut cfg);
    save_config_to(&cfg, path)?;
    Ok(cfg)
}

/// Persist the push toggle.
pub fn set_push_enabled(enabled: bool) -> Result<(), ConfigError> {
    update_config_at(&config_path(), |cfg| cfg.push_enabled = enabled)?;
    Ok(())
}

/// Persist the last-applied table sort.
pub fn set_sort(sort: SortState) -> Result<(), ConfigError> {
    update_config_at(&config_path(), |cfg| cfg.sort = sort)?;
    Ok(())
}
