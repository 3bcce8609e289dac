use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    // 24 hours
    86_400
}

fn default_execution_timeout_secs() -> u64 {
    30
}

fn default_max_commands_per_request() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Dangerous commands require an explicit acknowledgment before running.
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
    /// In a multi-command sequence, keep going after a failed command.
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
    /// Hard upper bound on candidates planned from one response; extra
    /// candidates are truncated, never an error.
    #[serde(default = "default_max_commands_per_request")]
    pub max_commands_per_request: usize,
    #[serde(default)]
    pub use_mock: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            require_confirmation: true,
            continue_on_failure: false,
            cache_ttl_secs: default_cache_ttl_secs(),
            execution_timeout_secs: default_execution_timeout_secs(),
            max_commands_per_request: default_max_commands_per_request(),
            use_mock: false,
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or create default
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override config file
        if let Ok(api_key) = std::env::var("QUOMODO_API_KEY") {
            config.api_key = Some(api_key);
        }

        if std::env::var("QUOMODO_USE_MOCK").is_ok() {
            config.use_mock = true;
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".quomodo").join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".quomodo"))
    }

    /// Set API key and save config
    pub fn set_api_key(&mut self, api_key: String) -> Result<()> {
        self.api_key = Some(api_key);
        self.save()?;
        info!("API key saved to config file");
        Ok(())
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
            let config = Self::load_from_file()?;
            println!(
                "API Key: {}",
                if config.api_key.is_some() { "Set" } else { "Not set" }
            );
            println!("Model: {}", config.model);
            println!("Require confirmation: {}", config.require_confirmation);
            println!("Continue on failure: {}", config.continue_on_failure);
            println!("Cache TTL: {}s", config.cache_ttl_secs);
            println!("Execution timeout: {}s", config.execution_timeout_secs);
            println!("Max commands per request: {}", config.max_commands_per_request);
            println!("Mock mode: {}", config.use_mock);
        } else {
            println!("Status: Not found (using defaults)");
        }

        println!("\nTo set API key:");
        println!("  quo --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export QUOMODO_API_KEY=<your-key>");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert!(config.require_confirmation);
        assert!(!config.continue_on_failure);
        assert_eq!(config.cache_ttl_secs, 86_400);
        assert_eq!(config.execution_timeout_secs, 30);
        assert_eq!(config.max_commands_per_request, 10);
        assert!(!config.use_mock);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("model = \"anthropic/claude-3-haiku\"").unwrap();
        assert_eq!(config.model, "anthropic/claude-3-haiku");
        assert_eq!(config.base_url, default_base_url());
        assert!(config.require_confirmation);
        assert_eq!(config.max_commands_per_request, 10);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = Config::default();
        config.api_key = Some("sk-or-test".to_string());
        config.continue_on_failure = true;
        config.execution_timeout_secs = 5;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.api_key.as_deref(), Some("sk-or-test"));
        assert!(parsed.continue_on_failure);
        assert_eq!(parsed.execution_timeout_secs, 5);
    }

    #[test]
    fn test_duration_helpers() {
        let mut config = Config::default();
        config.cache_ttl_secs = 60;
        config.execution_timeout_secs = 2;
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.execution_timeout(), Duration::from_secs(2));
    }
}
