use crate::services::providers::gemini::GEMINI_API_BASE;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 30;
/// Two hours.
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 7200;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub sessions: SessionConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Gemini API key. `None` runs the service in fallback mode.
    pub api_key: Option<String>,
    /// Model name, e.g. gemini-2.0-flash.
    pub name: String,
    /// Gemini REST endpoint root.
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ChatConfig {
            common: common_config,
            model: ModelConfig {
                api_key: env::var("GOOGLE_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                name: get_env("CHAT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                api_base: env::var("GEMINI_API_BASE")
                    .unwrap_or_else(|_| GEMINI_API_BASE.to_string()),
                timeout_secs: get_env_u64(
                    "CHAT_MODEL_TIMEOUT_SECS",
                    DEFAULT_MODEL_TIMEOUT_SECS,
                    is_prod,
                )?,
            },
            sessions: SessionConfig {
                timeout_secs: get_env_u64(
                    "SESSION_TIMEOUT_SECS",
                    DEFAULT_SESSION_TIMEOUT_SECS,
                    is_prod,
                )?,
                cleanup_interval_secs: get_env_u64(
                    "SESSION_CLEANUP_INTERVAL_SECS",
                    DEFAULT_CLEANUP_INTERVAL_SECS,
                    is_prod,
                )?,
            },
            cors: CorsConfig {
                allowed_origin: get_env(
                    "CORS_ALLOWED_ORIGIN",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
            },
        })
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        // A zero period would make tokio::time::interval panic.
        Duration::from_secs(self.sessions.cleanup_interval_secs.max(1))
    }
}

impl Default for ChatConfig {
    /// Development defaults without a model credential.
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            model: ModelConfig {
                api_key: None,
                name: "gemini-2.0-flash".to_string(),
                api_base: GEMINI_API_BASE.to_string(),
                timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            },
            sessions: SessionConfig {
                timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
                cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            },
            cors: CorsConfig {
                allowed_origin: "http://localhost:3000".to_string(),
            },
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_env_u64(key: &str, default: u64, is_prod: bool) -> Result<u64, AppError> {
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} must be a whole number, got {:?}", key, raw))
    })
}
