//! Configuration loaded from the process environment.
//!
//! Call [`Config::from_env`] once at startup, after the binary has loaded
//! any `.env` file with `dotenvy`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the backend.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding `history.json`.
    pub data_dir: PathBuf,
    /// Required value of the `x-api-key` header. `None` disables auth.
    pub api_access_key: Option<SecretString>,
    pub vision: VisionConfig,
    pub voice: VoiceConfig,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Upper bound on stored analysis records.
    pub history_max: usize,
    /// Request body and image size limit in megabytes.
    pub request_limit_mb: usize,
    pub rate_limit: RateLimitConfig,
}

/// AI vision provider settings.
#[derive(Debug, Clone, Default)]
pub struct VisionConfig {
    /// Endpoint of the remote provider. `None` selects the stub provider.
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// Voice relay settings.
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    pub upstream_url: Option<String>,
    pub api_key: Option<SecretString>,
    /// Sent to the upstream once the connection opens.
    pub init_payload: Option<String>,
}

/// Fixed-window rate limiting for the `/api` routes.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5174,
            data_dir: PathBuf::from("data"),
            api_access_key: None,
            vision: VisionConfig {
                timeout: Duration::from_secs(120),
                ..Default::default()
            },
            voice: VoiceConfig::default(),
            cors_origins: Vec::new(),
            history_max: 500,
            request_limit_mb: 20,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let ai_api_key = get("AI_API_KEY").map(SecretString::from);

        let history_max = parse_or(&get, "HISTORY_MAX", defaults.history_max);
        if history_max == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HISTORY_MAX".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let window_secs = parse_or(&get, "RATE_LIMIT_WINDOW_SECS", 60u64);

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            api_access_key: get("API_ACCESS_KEY").map(SecretString::from),
            vision: VisionConfig {
                url: get("AI_VISION_URL"),
                api_key: ai_api_key.clone(),
                timeout: defaults.vision.timeout,
            },
            voice: VoiceConfig {
                upstream_url: get("AI_VOICE_WS_URL"),
                api_key: ai_api_key,
                init_payload: get("AI_VOICE_INIT_PAYLOAD"),
            },
            cors_origins: get("CORS_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            history_max,
            request_limit_mb: parse_or(&get, "REQUEST_LIMIT_MB", defaults.request_limit_mb),
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(window_secs.max(1)),
                max_requests: parse_or(
                    &get,
                    "RATE_LIMIT_MAX",
                    defaults.rate_limit.max_requests,
                ),
            },
        })
    }

    /// Path of the persisted history document.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    /// Maximum accepted request size in bytes.
    pub fn request_limit_bytes(&self) -> usize {
        self.request_limit_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring invalid numeric setting, using default");
            default
        }),
        None => default,
    }
}

/// Split a comma-separated list, dropping empty items.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
