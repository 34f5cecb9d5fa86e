use once_cell::sync::Lazy;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDriver {
    Memory,
    Durable,
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub delay_step_ms: u64,
    pub stable_threshold: u32,
    pub max_total_wait_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SynthesisPoolConfig {
    pub default_concurrency: usize,
    pub max_concurrency: usize,
    pub throttle_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub instruction_char_limit: usize,
    pub section_char_limit: usize,
    pub max_connections: usize,
    pub pagination_limit: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_driver: StorageDriver,
    pub database_url: Option<String>,
    pub issuer_url: String,
    pub signing_private_key: String,
    pub signing_public_key: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub authorization_code_ttl_seconds: i64,
    pub supported_scopes: Vec<String>,
    pub default_scopes: Vec<String>,
    pub allowed_client_ids: Vec<String>,
    pub allowed_redirect_uris: Vec<String>,
    pub upstream_api_url: String,
    pub upstream_api_timeout_ms: u64,
    pub upstream_token_exchange_timeout_ms: u64,
    pub polling: PollingConfig,
    pub synthesis_pool: SynthesisPoolConfig,
    pub limits: LimitsConfig,
    pub bind_address: String,
    pub cleanup_interval_seconds: u64,
    pub cors_allowed_origins: Vec<String>,
    pub developer_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingRequired(key.to_string()))
        };
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let parse_u64_or_default = |key: &str, default: u64| -> u64 {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_u32_or_default = |key: &str, default: u32| -> u32 {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_usize_or_default = |key: &str, default: usize| -> usize {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_i64_or_default = |key: &str, default: i64| -> i64 {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_bool_or_default = |key: &str, default: bool| -> bool {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_list = |key: &str| -> Vec<String> {
            env::var(key)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        let storage_driver_raw = get_or_default("STORAGE_DRIVER", "memory");
        let database_url = env::var("DATABASE_URL").ok();
        let storage_driver = match (storage_driver_raw.as_str(), &database_url) {
            ("durable", Some(_)) => StorageDriver::Durable,
            ("durable", None) => {
                tracing::warn!(
                    "STORAGE_DRIVER=durable requested but DATABASE_URL is unset; falling back to memory"
                );
                StorageDriver::Memory
            }
            ("memory", _) => StorageDriver::Memory,
            (other, _) => {
                return Err(ConfigError::InvalidValue {
                    key: "STORAGE_DRIVER".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let max_connections = parse_usize_or_default("MAX_CONNECTIONS", 50).min(50);
        let pagination_limit = parse_usize_or_default("PAGINATION_LIMIT", 100).min(100);

        Ok(Self {
            storage_driver,
            database_url,
            issuer_url: get_or_default("ISSUER_URL", "http://localhost:8080"),
            signing_private_key: get_required("SIGNING_PRIVATE_KEY")?,
            signing_public_key: get_required("SIGNING_PUBLIC_KEY")?,
            access_token_ttl_seconds: parse_i64_or_default("ACCESS_TOKEN_TTL_SECONDS", 3600),
            refresh_token_ttl_seconds: parse_i64_or_default(
                "REFRESH_TOKEN_TTL_SECONDS",
                30 * 24 * 3600,
            ),
            authorization_code_ttl_seconds: parse_i64_or_default(
                "AUTHORIZATION_CODE_TTL_SECONDS",
                30,
            ),
            supported_scopes: {
                let scopes = parse_list("SUPPORTED_SCOPES");
                if scopes.is_empty() {
                    vec![
                        "read".to_string(),
                        "privy:token:exchange".to_string(),
                    ]
                } else {
                    scopes
                }
            },
            default_scopes: {
                let scopes = parse_list("DEFAULT_SCOPES");
                if scopes.is_empty() {
                    vec!["read".to_string()]
                } else {
                    scopes
                }
            },
            allowed_client_ids: parse_list("ALLOWED_CLIENT_IDS"),
            allowed_redirect_uris: parse_list("ALLOWED_REDIRECT_URIS"),
            upstream_api_url: get_or_default("UPSTREAM_API_URL", "https://upstream.example.test"),
            upstream_api_timeout_ms: parse_u64_or_default("UPSTREAM_API_TIMEOUT_MS", 60_000),
            upstream_token_exchange_timeout_ms: parse_u64_or_default(
                "UPSTREAM_TOKEN_EXCHANGE_TIMEOUT_MS",
                10_000,
            ),
            polling: PollingConfig {
                max_attempts: parse_u32_or_default("POLL_MAX_ATTEMPTS", 8),
                base_delay_ms: parse_u64_or_default("POLL_BASE_DELAY_MS", 300),
                delay_step_ms: parse_u64_or_default("POLL_DELAY_STEP_MS", 200),
                stable_threshold: parse_u32_or_default("POLL_STABLE_THRESHOLD", 2),
                max_total_wait_ms: parse_u64_or_default("POLL_MAX_TOTAL_WAIT_MS", 5_000),
            },
            synthesis_pool: SynthesisPoolConfig {
                default_concurrency: parse_usize_or_default("SYNTHESIS_DEFAULT_CONCURRENCY", 2),
                max_concurrency: parse_usize_or_default("SYNTHESIS_MAX_CONCURRENCY", 5),
                throttle_ms: parse_u64_or_default("SYNTHESIS_THROTTLE_MS", 75),
            },
            limits: LimitsConfig {
                instruction_char_limit: parse_usize_or_default("INSTRUCTION_CHAR_LIMIT", 4_000),
                section_char_limit: parse_usize_or_default("SECTION_CHAR_LIMIT", 1_000),
                max_connections,
                pagination_limit,
            },
            bind_address: get_or_default("BIND_ADDRESS", "0.0.0.0:8080"),
            cleanup_interval_seconds: parse_u64_or_default("CLEANUP_INTERVAL_SECONDS", 300),
            cors_allowed_origins: parse_list("CORS_ALLOWED_ORIGINS"),
            developer_mode: parse_bool_or_default("DEVELOPER_MODE", false),
        })
    }

    pub fn is_durable(&self) -> bool {
        matches!(self.storage_driver, StorageDriver::Durable)
    }
}

/// Convenience accessor for code paths that cannot easily thread `AppState`
/// through (e.g. early startup logging). Request handling always goes
/// through `AppState`, constructed explicitly in `main`/tests, not through
/// this singleton.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::from_env().expect("failed to load configuration from environment")
});

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        for key in [
            "STORAGE_DRIVER",
            "DATABASE_URL",
            "ISSUER_URL",
            "SIGNING_PRIVATE_KEY",
            "SIGNING_PUBLIC_KEY",
            "MAX_CONNECTIONS",
            "PAGINATION_LIMIT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn falls_back_to_memory_without_database_url() {
        clear_env();
        env::set_var("STORAGE_DRIVER", "durable");
        env::set_var("SIGNING_PRIVATE_KEY", "dummy");
        env::set_var("SIGNING_PUBLIC_KEY", "dummy");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.storage_driver, StorageDriver::Memory);
    }

    #[test]
    #[serial]
    fn caps_limits_to_spec_maximums() {
        clear_env();
        env::set_var("SIGNING_PRIVATE_KEY", "dummy");
        env::set_var("SIGNING_PUBLIC_KEY", "dummy");
        env::set_var("MAX_CONNECTIONS", "999");
        env::set_var("PAGINATION_LIMIT", "999");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.limits.max_connections, 50);
        assert_eq!(config.limits.pagination_limit, 100);
    }

    #[test]
    #[serial]
    fn missing_signing_key_is_a_hard_error() {
        clear_env();
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }
}
