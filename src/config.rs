use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::crypto::{DEFAULT_ITERATIONS, KdfParams, LEGACY_SALT};
use crate::dispatch::DEFAULT_ENDPOINT;
use crate::request::{
    DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL, DEFAULT_REASONING_EFFORT,
    REASONING_EFFORTS,
};

/// Client settings, stored in ~/.sahayak/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Completion endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// minimal, low, medium or high
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,

    /// How many recent messages accompany each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Request timeout in seconds, 0 waits forever
    #[serde(default)]
    pub timeout_secs: u64,

    /// Path or http(s) URL of the widget config document
    #[serde(default = "default_widget_config")]
    pub widget_config: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_reasoning_effort() -> String {
    DEFAULT_REASONING_EFFORT.to_string()
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_widget_config() -> String {
    "config.json".to_string()
}

fn config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home).join(".sahayak").join("config.toml"))
}

impl Config {
    /// Load config from ~/.sahayak/config.toml, returning defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to ~/.sahayak/config.toml
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Set a single key from its string form, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoint" | "url" => {
                if !is_remote(value) {
                    bail!("invalid endpoint: must start with http:// or https://");
                }
                self.endpoint = value.to_string();
            }
            "model" => {
                if value.trim().is_empty() {
                    bail!("invalid model: must not be empty");
                }
                self.model = value.trim().to_string();
            }
            "max_output_tokens" | "max_tokens" => {
                self.max_output_tokens = parse_positive(value, "max_output_tokens")?;
            }
            "reasoning_effort" | "effort" => {
                let effort = value.trim().to_lowercase();
                if !REASONING_EFFORTS.contains(&effort.as_str()) {
                    bail!("invalid reasoning_effort: must be one of {}", REASONING_EFFORTS.join(", "));
                }
                self.reasoning_effort = effort;
            }
            "history_window" | "window" => {
                self.history_window = parse_positive(value, "history_window")?;
            }
            "timeout_secs" | "timeout" => {
                self.timeout_secs = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid timeout_secs: must be a whole number"))?;
            }
            "widget_config" | "widget" => {
                self.widget_config = value.to_string();
            }
            _ => bail!("unknown config key: {key}"),
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn parse_positive<N: std::str::FromStr + PartialOrd + Default>(value: &str, key: &str) -> Result<N> {
    match value.trim().parse::<N>() {
        Ok(n) if n > N::default() => Ok(n),
        _ => bail!("invalid {key}: must be a positive integer"),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_effort: default_reasoning_effort(),
            history_window: default_history_window(),
            timeout_secs: 0,
            widget_config: default_widget_config(),
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// The document the chat widget is deployed with: organization, sealed
/// credential and the password that opens it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetConfig {
    pub org: String,
    /// Password for `k`
    pub temp: String,
    /// Base64 `IV || ciphertext || tag`
    pub k: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
}

impl WidgetConfig {
    /// Read from a local path or fetch from an http(s) URL.
    pub fn load(source: &str) -> Result<Self> {
        if is_remote(source) {
            log::info!("fetching widget config from {source}");
            let response = ureq::get(source)
                .call()
                .with_context(|| format!("failed to fetch {source}"))?;
            return response
                .into_json()
                .with_context(|| format!("failed to parse {source}"));
        }

        let content = fs::read_to_string(source).with_context(|| format!("failed to read {source}"))?;
        Self::parse(&content).with_context(|| format!("failed to parse {source}"))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(
            self.salt.as_deref().unwrap_or(LEGACY_SALT),
            self.iterations.unwrap_or(DEFAULT_ITERATIONS),
        )
    }
}
