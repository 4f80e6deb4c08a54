//! Application configuration loading.
//!
//! Reads `config.yaml` from `$SEARCHDESK_CONFIG` or the platform data
//! directory and resolves `${VAR}` / `${VAR:-default}` environment references.
//! A missing file is not an error: defaults are used, with credentials taken
//! from `TYPESENSE_URL`, `TYPESENSE_API_KEY`, and `GEMINI_API_KEY`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors `config.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Search engine connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

/// Generative-language backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    /// Empty means "not initialized"; the console asks for one.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

/// Conversation limits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChatConfig {
    /// Maximum tool-calling rounds per user turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Maximum messages kept in the visible history.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Minimum spacing between accepted sends.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

fn default_search_url() -> String {
    std::env::var("TYPESENSE_URL").unwrap_or_else(|_| "http://localhost:8108".to_string())
}
fn default_search_timeout() -> u64 {
    15
}
fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model_name() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_model_timeout() -> u64 {
    60
}
fn default_max_iterations() -> usize {
    5
}
fn default_max_history() -> usize {
    50
}
fn default_rate_limit_ms() -> u64 {
    2000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            api_key: std::env::var("TYPESENSE_API_KEY").unwrap_or_default(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            model: default_model_name(),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_model_timeout(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_history: default_max_history(),
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

impl AppConfig {
    /// Load from the resolved config path, or fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match find_config_path() {
            Some(path) => {
                let config = load_config(&path)?;
                tracing::info!(path = %path.display(), "loaded config");
                Ok(config)
            }
            None => {
                tracing::info!("no config file found, using defaults and environment");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the session cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                reason: "chat.max_iterations must be at least 1".into(),
            });
        }
        if self.chat.max_history < 2 {
            return Err(ConfigError::Invalid {
                reason: "chat.max_history must hold at least one exchange (2)".into(),
            });
        }
        if self.search.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "search.url is empty".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the config file location.
///
/// 1. `$SEARCHDESK_CONFIG` if it points at an existing file.
/// 2. `<data_dir>/config.yaml`.
pub fn find_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("SEARCHDESK_CONFIG") {
        let candidate = PathBuf::from(explicit);
        if candidate.is_file() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "SEARCHDESK_CONFIG does not exist");
    }

    let candidate = crate::data_dir().join("config.yaml");
    candidate.is_file().then_some(candidate)
}

/// Load and parse a config file with environment interpolation.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse config YAML after interpolating environment references.
pub fn parse_config(raw: &str) -> Result<AppConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    let config: AppConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => std::env::var(var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
