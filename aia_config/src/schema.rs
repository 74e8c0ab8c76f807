use std::path::{Path, PathBuf};
use std::time::Duration;

use aia_core::DEFAULT_GREETING;
use aia_providers::{ChatWire, HttpOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Environment variable that overrides `backend.base_url`.
pub const BASE_URL_ENV: &str = "AIA_API_BASE_URL";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(default = "BackendConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub wire: ChatWire,
    /// `null` disables the timeout.
    #[serde(default = "BackendConfig::default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            wire: ChatWire::default(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }

    #[allow(clippy::unnecessary_wraps)]
    const fn default_timeout_secs() -> Option<u64> {
        Some(120)
    }

    #[must_use]
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            wire: self.wire,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_greeting")]
    pub greeting: String,
    /// Credential override applied when a session starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: Self::default_greeting(),
            api_key: None,
        }
    }
}

impl SessionConfig {
    fn default_greeting() -> String {
        DEFAULT_GREETING.to_string()
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "backend": {
    "base_url": "http://localhost:8000",
    "wire": "history",
    "timeout_secs": 120
  },
  "session": {
    "greeting": "Olá! Eu sou a AIA, sua assistente virtual da Asteca. Como posso te ajudar hoje?"
  }
}"#;

impl Config {
    /// Load `~/aia/config.json`, falling back to defaults when it does not
    /// exist, then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        let config = if config_path.exists() {
            info!("Loading config from {}", config_path.display());
            Self::load_from(&config_path)?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;

        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            debug!("{BASE_URL_ENV} overrides backend.base_url");
            self.backend.base_url = base_url;
        }
        self
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("aia"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Point backend.base_url at the AIA backend");
        println!("   2. Optionally set session.api_key to use your own Groq key");
        println!("   3. Run 'aia chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - backend.wire: \"history\" or \"session_cookie\"");
        println!("   - backend.timeout_secs: request timeout, null to wait forever");
        println!("   - {BASE_URL_ENV}: environment override for backend.base_url");
        println!();
        Ok(())
    }

    /// Write the template to `path`, refusing to overwrite an existing file.
    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        std::fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }
}
