//! Server configuration
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. `ANTHROPIC_API_KEY` / `LEONARDO_API_KEY`, used only when nothing below
//!    sets the credential
//! 3. TOML file (`storyd.toml` unless another path is given)
//! 4. `STORYD_`-prefixed environment variables, nested keys split on `__`
//!    (e.g. `STORYD_GENERATION__MAX_POLLS=10`)

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default config file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "storyd.toml";

/// Top-level server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// SQLite file path. None = in-memory
    pub database: Option<String>,
    pub anthropic: AnthropicSettings,
    pub leonardo: LeonardoSettings,
    pub generation: GenerationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database: None,
            anthropic: AnthropicSettings::default(),
            leonardo: LeonardoSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

/// Text generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1000,
        }
    }
}

/// Image generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeonardoSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_id: String,
    pub width: u32,
    pub height: u32,
}

impl Default for LeonardoSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://cloud.leonardo.ai/api/rest/v1".to_string(),
            // Leonardo Creative
            model_id: "6bef9f1b-29cb-40c7-b9df-32b51c1f67d3".to_string(),
            width: 512,
            height: 512,
        }
    }
}

/// Retry, polling, and cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Text backend calls per story
    pub max_retries: u32,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub cache_ttl_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            poll_interval_ms: 1000,
            max_polls: 30,
            cache_ttl_secs: 3600,
        }
    }
}

impl GenerationSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Settings {
    /// Build the layered figment. A missing file is skipped.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(
                Env::raw()
                    .only(&["ANTHROPIC_API_KEY", "LEONARDO_API_KEY"])
                    .map(|key| {
                        if key.as_str().eq_ignore_ascii_case("ANTHROPIC_API_KEY") {
                            "anthropic.api_key".into()
                        } else {
                            "leonardo.api_key".into()
                        }
                    }),
            )
            .merge(Toml::file(path))
            .merge(Env::prefixed("STORYD_").split("__"))
    }

    /// Load settings. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) if !p.exists() => bail!("Config file not found: {}", p.display()),
            Some(p) => p,
            None => Path::new(DEFAULT_CONFIG_FILE),
        };

        let mut settings: Settings = Self::figment(path).extract()?;
        settings.normalize();
        Ok(settings)
    }

    /// Blank credentials count as missing
    fn normalize(&mut self) {
        for key in [&mut self.anthropic.api_key, &mut self.leonardo.api_key] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
    }

    /// Names of the credentials that are not configured
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.anthropic.api_key.is_none() {
            missing.push("ANTHROPIC_API_KEY");
        }
        if self.leonardo.api_key.is_none() {
            missing.push("LEONARDO_API_KEY");
        }
        missing
    }
}
