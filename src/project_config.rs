use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::coordinator::ConfirmationPolicy;
use crate::errors::ConfigError;
use crate::interpreter::Language;
use crate::llm_handler::LlmProvider;
use crate::prompts::PromptOverride;

pub const ASSISTANT_CONFIG_FILE: &str = "assistant_config.json";

// Environment overrides applied after the config file is read
pub const ENV_GATEWAY_URL: &str = "CIVIC_ASSIST_GATEWAY_URL";
pub const ENV_MODEL: &str = "CIVIC_ASSIST_MODEL";
pub const ENV_LANGUAGE: &str = "CIVIC_ASSIST_LANGUAGE";
pub const ENV_PORT: &str = "CIVIC_ASSIST_PORT";

pub const DEFAULT_PENDING_CONFIRMATION_TTL_SECS: i64 = 15 * 60;
/// Upper bound for `pending_confirmation_ttl_secs` (one week)
pub const MAX_PENDING_CONFIRMATION_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const PENDING_TTL_KEY: &str = "pending_confirmation_ttl_secs";

/// Hosted LLM gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub provider: LlmProvider,
    /// Overrides the provider's default endpoint
    pub endpoint: Option<String>,
    /// Overrides the provider's default model
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            model: None,
            api_key_env: "CIVIC_ASSIST_API_KEY".to_string(),
            timeout_secs: 60,
            max_tokens: 2048,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: String,
    /// When set, logs are also written to daily rolling files here
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "civic-assist.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub default_language: Language,
    pub logging: LoggingConfig,
    pub confirmation: ConfirmationPolicy,
    /// How long a tool call waits for confirmation before it is dropped
    pub pending_confirmation_ttl_secs: i64,
    /// Per-template prompt overrides, keyed by template id
    pub prompt_overrides: HashMap<String, PromptOverride>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            server: ServerConfig::default(),
            default_language: Language::Ar,
            logging: LoggingConfig::default(),
            confirmation: ConfirmationPolicy::default(),
            pending_confirmation_ttl_secs: DEFAULT_PENDING_CONFIRMATION_TTL_SECS,
            prompt_overrides: HashMap::new(),
        }
    }
}

impl AssistantConfig {
    /// Reject settings that would make the assistant misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttl = self.pending_confirmation_ttl_secs;
        if !(1..=MAX_PENDING_CONFIRMATION_TTL_SECS).contains(&ttl) {
            return Err(ConfigError::InvalidOverride {
                key: PENDING_TTL_KEY.to_string(),
                value: ttl.to_string(),
            });
        }
        Ok(())
    }

    /// Confirmation lifetime. Out-of-range values fall back to the default.
    pub fn pending_ttl(&self) -> Duration {
        let ttl = self.pending_confirmation_ttl_secs;
        (1..=MAX_PENDING_CONFIRMATION_TTL_SECS)
            .contains(&ttl)
            .then(|| Duration::try_seconds(ttl))
            .flatten()
            .unwrap_or_else(|| {
                warn!(
                    "{} = {} is out of range, using {}",
                    PENDING_TTL_KEY, ttl, DEFAULT_PENDING_CONFIRMATION_TTL_SECS
                );
                Duration::seconds(DEFAULT_PENDING_CONFIRMATION_TTL_SECS)
            })
    }
}

/// Apply environment overrides. `lookup` resolves a variable name.
pub fn apply_env_overrides<F>(config: &mut AssistantConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_GATEWAY_URL) {
        config.gateway.endpoint = Some(url);
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.gateway.model = Some(model);
    }
    if let Some(language) = lookup(ENV_LANGUAGE) {
        config.default_language = Language::from_payload(language.trim()).ok_or(ConfigError::InvalidOverride {
            key: ENV_LANGUAGE.to_string(),
            value: language,
        })?;
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidOverride {
            key: ENV_PORT.to_string(),
            value: port,
        })?;
    }
    config.validate()
}

pub struct AssistantConfigManager {
    config_file: PathBuf,
}

impl AssistantConfigManager {
    pub fn new(config_file: impl AsRef<Path>) -> Self {
        Self {
            config_file: config_file.as_ref().to_path_buf(),
        }
    }

    fn path_display(&self) -> String {
        self.config_file.display().to_string()
    }

    /// Read the config file. A missing file yields the defaults.
    pub fn load_config(&self) -> Result<AssistantConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AssistantConfig::default());
        }

        let config_str = fs::read_to_string(&self.config_file).map_err(|source| ConfigError::Read {
            path: self.path_display(),
            source,
        })?;
        let config: AssistantConfig = serde_json::from_str(&config_str).map_err(|source| ConfigError::Parse {
            path: self.path_display(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load the config file, then apply process environment overrides
    pub fn load_with_env(&self) -> Result<AssistantConfig, ConfigError> {
        let mut config = self.load_config()?;
        apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn save_config(&self, config: &AssistantConfig) -> Result<(), ConfigError> {
        let write_error = |source: std::io::Error| ConfigError::Write {
            path: self.path_display(),
            source,
        };

        let config_str = serde_json::to_string_pretty(config).map_err(|e| write_error(e.into()))?;

        if let Some(parent) = self.config_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }
        fs::write(&self.config_file, config_str).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ConfirmationMode;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = AssistantConfigManager::new(temp_dir.path().join("absent.json"));

        let config = manager.load_config().unwrap();
        assert_eq!(config, AssistantConfig::default());
        assert_eq!(config.default_language, Language::Ar);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(ASSISTANT_CONFIG_FILE);
        let manager = AssistantConfigManager::new(&path);

        let mut config = AssistantConfig::default();
        config.default_language = Language::En;
        config.gateway.provider = LlmProvider::Anthropic;
        config.confirmation.mode = ConfirmationMode::Always;
        config.prompt_overrides.insert(
            "assistant_chat".to_string(),
            PromptOverride {
                user: Some("Citizen says: {{message}}".to_string()),
                ..PromptOverride::default()
            },
        );
        manager.save_config(&config).unwrap();

        let reloaded = AssistantConfigManager::new(&path).load_config().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(ASSISTANT_CONFIG_FILE);
        fs::write(&path, r#"{ "server": { "port": 9090 }, "gateway": { "model": "gpt-4o-mini" } }"#).unwrap();

        let config = AssistantConfigManager::new(&path).load_config().unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.gateway.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.gateway.api_key_env, "CIVIC_ASSIST_API_KEY");
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(ASSISTANT_CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let result = AssistantConfigManager::new(&path).load_config();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_GATEWAY_URL, "http://localhost:4000/v1/chat/completions"),
            (ENV_MODEL, "local-model"),
            (ENV_LANGUAGE, "en"),
            (ENV_PORT, " 8181 "),
        ]
        .into_iter()
        .collect();

        let mut config = AssistantConfig::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.gateway.endpoint.as_deref(), Some("http://localhost:4000/v1/chat/completions"));
        assert_eq!(config.gateway.model.as_deref(), Some("local-model"));
        assert_eq!(config.default_language, Language::En);
        assert_eq!(config.server.port, 8181);
    }

    #[test]
    fn test_invalid_env_override_is_rejected() {
        let mut config = AssistantConfig::default();
        let result = apply_env_overrides(&mut config, |key| (key == ENV_PORT).then(|| "eighty".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidOverride { ref key, .. }) if key == ENV_PORT));

        let result = apply_env_overrides(&mut config, |key| (key == ENV_LANGUAGE).then(|| "fr".to_string()));
        assert!(result.is_err());

        let result = apply_env_overrides(&mut config, |key| (key == ENV_LANGUAGE).then(|| "AR".to_string()));
        assert!(result.is_err());

        apply_env_overrides(&mut config, |key| (key == ENV_LANGUAGE).then(|| " en\n".to_string())).unwrap();
        assert_eq!(config.default_language, Language::En);
    }

    #[test]
    fn test_out_of_range_ttl_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(ASSISTANT_CONFIG_FILE);

        for ttl in [0, -1, i64::MAX, MAX_PENDING_CONFIRMATION_TTL_SECS + 1] {
            fs::write(&path, format!(r#"{{ "pending_confirmation_ttl_secs": {} }}"#, ttl)).unwrap();
            let result = AssistantConfigManager::new(&path).load_config();
            assert!(
                matches!(result, Err(ConfigError::InvalidOverride { ref key, ref value })
                    if key == "pending_confirmation_ttl_secs" && *value == ttl.to_string()),
                "ttl {} was accepted",
                ttl
            );
        }

        fs::write(&path, r#"{ "pending_confirmation_ttl_secs": 60 }"#).unwrap();
        let config = AssistantConfigManager::new(&path).load_config().unwrap();
        assert_eq!(config.pending_ttl(), Duration::seconds(60));
    }

    #[test]
    fn test_pending_ttl_falls_back_when_out_of_range() {
        let mut config = AssistantConfig::default();
        assert_eq!(config.pending_ttl(), Duration::minutes(15));

        for ttl in [i64::MAX, i64::MIN, 0, -30] {
            config.pending_confirmation_ttl_secs = ttl;
            assert_eq!(config.pending_ttl(), Duration::minutes(15));
            assert!(config.validate().is_err());
        }
    }
}
