//! Bot Configuration
//!
//! Loads the bot's configuration from a YAML document and platform
//! credentials from the environment. Missing keys fall back to hard-coded
//! defaults so a partial config file is always usable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};
use yaml_rust2::{Yaml, YamlLoader};

use crate::types::{default_config, BotConfig, Credentials, LogLevel};

/// Config file name within the bot directory.
const CONFIG_FILENAME: &str = "config.yaml";

/// Environment variables holding the platform credentials.
pub const USERNAME_VAR: &str = "TWITTER_USERNAME";
pub const PASSWORD_VAR: &str = "TWITTER_PASSWORD";

/// Default configuration document written by `--init`.
pub const DEFAULT_CONFIG: &str = r#"twitter:
  base_url: https://twitter.com
  topics:
    - Web3
    - philosophy
    - technology
    - consciousness
    - digital gnosis
    - techno-mysticism
    - meme mutation
    - quantum spirituality
    - cyber-theology
    - digital asceticism
    - hyperstition
agent:
  model_config:
    engine: nous-hermes2-mixtral:latest
    temperature: 0.7
    max_tokens: 280
    api_url: http://localhost:11434
webdriver_url: http://localhost:9515
history_limit: 256
log_level: info
"#;

/// Returns the bot's config directory: `~/.guo`.
pub fn get_bot_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    home.join(".guo")
}

/// Returns the full path to the config file: `~/.guo/config.yaml`.
pub fn get_config_path() -> PathBuf {
    get_bot_dir().join(CONFIG_FILENAME)
}

/// Parse a YAML document into a `BotConfig`, merging defaults for any
/// missing key. The document shape mirrors the sections the bot has always
/// used: `twitter` for platform settings, `agent.model_config` for the
/// inference backend, plus top-level operational fields.
fn parse_yaml_config(docs: &[Yaml]) -> Result<BotConfig> {
    let mut config = default_config();

    let doc = match docs.first() {
        Some(d) => d,
        None => return Ok(config),
    };

    let twitter = &doc["twitter"];
    if let Some(topics) = twitter["topics"].as_vec() {
        let parsed: Vec<String> = topics
            .iter()
            .filter_map(|t| t.as_str().map(|s| s.to_string()))
            .collect();
        if !parsed.is_empty() {
            config.topics = parsed;
        }
    }
    if let Some(base_url) = twitter["base_url"].as_str() {
        config.base_url = base_url.to_string();
    }

    let model = &doc["agent"]["model_config"];
    if let Some(engine) = model["engine"].as_str() {
        config.engine = engine.to_string();
    }
    if let Some(temperature) = model["temperature"].as_f64() {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = model["max_tokens"].as_i64() {
        config.max_tokens = max_tokens.max(1) as u32;
    }
    if let Some(api_url) = model["api_url"].as_str() {
        config.api_url = api_url.to_string();
    }

    if let Some(webdriver_url) = doc["webdriver_url"].as_str() {
        config.webdriver_url = webdriver_url.to_string();
    }
    if let Some(history_limit) = doc["history_limit"].as_i64() {
        config.history_limit = history_limit.max(0) as usize;
    }
    if let Some(level) = doc["log_level"].as_str() {
        config.log_level = match level {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            other => {
                debug!("Unknown log_level '{}', keeping default", other);
                config.log_level
            }
        };
    }

    Ok(config)
}

/// Load the bot configuration from a YAML file at the given path.
///
/// Falls back to the default configuration if the file does not exist.
pub fn load_config(config_path: &Path) -> Result<BotConfig> {
    if !config_path.exists() {
        info!(
            "Config not found at {}, using defaults",
            config_path.display()
        );
        return Ok(default_config());
    }

    let contents = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

    let docs = YamlLoader::load_from_str(&contents)
        .with_context(|| format!("Failed to parse YAML from {}", config_path.display()))?;

    let config = parse_yaml_config(&docs)?;
    debug!(
        "Loaded config with {} topics from {}",
        config.topics.len(),
        config_path.display()
    );
    Ok(config)
}

/// Write the default configuration to a file.
///
/// Will not overwrite an existing file. Returns Ok(()) if the file already exists.
pub fn write_default_config(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        info!(
            "Config already exists at {}, not overwriting",
            config_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directory for {}",
                config_path.display()
            )
        })?;
    }

    fs::write(config_path, DEFAULT_CONFIG).with_context(|| {
        format!(
            "Failed to write default config to {}",
            config_path.display()
        )
    })?;

    info!("Wrote default config to {}", config_path.display());
    Ok(())
}

/// Load platform credentials from the environment.
///
/// `dotenvy::dotenv()` has already populated the environment from a `.env`
/// file when one is present; here we only read the variables.
pub fn load_credentials() -> Result<Credentials> {
    let username = std::env::var(USERNAME_VAR)
        .with_context(|| format!("{} is not set", USERNAME_VAR))?;
    let password = std::env::var(PASSWORD_VAR)
        .with_context(|| format!("{} is not set", PASSWORD_VAR))?;

    Ok(Credentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> BotConfig {
        let docs = YamlLoader::load_from_str(yaml).unwrap();
        parse_yaml_config(&docs).unwrap()
    }

    #[test]
    fn test_default_config_document_parses() {
        let config = parse(DEFAULT_CONFIG);
        assert_eq!(config.engine, "nous-hermes2-mixtral:latest");
        assert_eq!(config.topics.len(), 11);
        assert_eq!(config.history_limit, 256);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_config_merges_defaults() {
        let config = parse(
            "agent:\n  model_config:\n    engine: llama3:8b\n    temperature: 1.1\n",
        );
        assert_eq!(config.engine, "llama3:8b");
        assert!((config.temperature - 1.1).abs() < f64::EPSILON);
        // Untouched fields come from the defaults.
        assert_eq!(config.base_url, "https://twitter.com");
        assert_eq!(config.max_tokens, 280);
        assert!(!config.topics.is_empty());
    }

    #[test]
    fn test_topics_override() {
        let config = parse("twitter:\n  topics:\n    - A\n    - B\n");
        assert_eq!(config.topics, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_empty_topics_keeps_defaults() {
        let config = parse("twitter:\n  topics: []\n");
        assert_eq!(config.topics.len(), 11);
    }

    #[test]
    fn test_unknown_log_level_keeps_default() {
        let config = parse("log_level: loud\n");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = parse("");
        assert_eq!(config.webdriver_url, "http://localhost:9515");
        assert_eq!(config.api_url, "http://localhost:11434");
    }
}
