//! Configuration loading, validation, and management for CourseCraft.
//!
//! Loads configuration from `coursecraft.toml` in the working directory
//! (override the path with `COURSECRAFT_CONFIG`), with environment variable
//! overrides for the gateway address. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `coursecraft.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracing filter (e.g. "info", "coursecraft=debug").
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Drafting agent settings
    #[serde(default)]
    pub drafting: DraftingConfig,

    /// Guardrail settings
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

fn default_log_filter() -> String {
    "info".into()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8420
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Turn pipeline knobs owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Timeout for one agent invocation, in seconds.
    #[serde(default = "default_invoke_timeout_secs")]
    pub invoke_timeout_secs: u64,

    /// How many additional attempts follow a failed invocation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Trailing turns included in the context payload.
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Long-term memory excerpts retrieved per turn.
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Sessions inactive for longer than this are marked stale.
    #[serde(default = "default_stale_threshold_minutes")]
    pub stale_threshold_minutes: i64,
}

fn default_invoke_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_recent_turns() -> usize {
    2
}

fn default_recall_limit() -> usize {
    5
}

fn default_stale_threshold_minutes() -> i64 {
    24 * 60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            invoke_timeout_secs: default_invoke_timeout_secs(),
            max_retries: default_max_retries(),
            recent_turns: default_recent_turns(),
            recall_limit: default_recall_limit(),
            stale_threshold_minutes: default_stale_threshold_minutes(),
        }
    }
}

/// Deterministic drafting agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftingConfig {
    /// Course length used when structuring a syllabus.
    #[serde(default = "default_weeks")]
    pub weeks: u32,

    /// How many objectives to draft.
    #[serde(default = "default_objective_count")]
    pub objective_count: usize,
}

fn default_weeks() -> u32 {
    12
}

fn default_objective_count() -> usize {
    5
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            weeks: default_weeks(),
            objective_count: default_objective_count(),
        }
    }
}

/// Guardrail configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Optional TOML rules file; the built-in rule set applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration with environment overrides applied:
    /// - `COURSECRAFT_CONFIG` — config file path
    /// - `COURSECRAFT_HOST` / `COURSECRAFT_PORT` — gateway address
    /// - `COURSECRAFT_LOG` — tracing filter
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("COURSECRAFT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("coursecraft.toml"));
        let mut config = Self::load_from(&path)?;

        if let Ok(host) = std::env::var("COURSECRAFT_HOST") {
            config.gateway.host = host;
        }
        if let Ok(port) = std::env::var("COURSECRAFT_PORT") {
            config.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid COURSECRAFT_PORT: {port}")))?;
        }
        if let Ok(filter) = std::env::var("COURSECRAFT_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Load configuration from a specific file. A missing file yields the
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.invoke_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "orchestrator.invoke_timeout_secs must be at least 1".into(),
            ));
        }
        if self.orchestrator.recent_turns == 0 {
            return Err(ConfigError::Validation(
                "orchestrator.recent_turns must be at least 1".into(),
            ));
        }
        if self.drafting.weeks == 0 {
            return Err(ConfigError::Validation(
                "drafting.weeks must be at least 1".into(),
            ));
        }
        if self.drafting.objective_count == 0 {
            return Err(ConfigError::Validation(
                "drafting.objective_count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            gateway: GatewayConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            drafting: DraftingConfig::default(),
            guardrails: GuardrailConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}
