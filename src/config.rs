use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.razorpay.com";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;

/// Application configuration with validation.
///
/// Values are layered from `config/default.toml`, `config/<environment>.toml`
/// and `APP__`-prefixed environment variables, last one wins.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key for signing access tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: usize,

    /// Shared secret required by the development token-mint endpoint.
    /// When unset the endpoint is disabled.
    #[serde(default)]
    pub auth_bootstrap_secret: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_bootstrap_schema: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool sizing and timeouts
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Request timeout applied by the HTTP server (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Razorpay key id (publishable, returned to the storefront client)
    pub razorpay_key_id: String,

    /// Razorpay key secret; also the HMAC key for checkout signature checks
    #[validate(length(min = 8))]
    pub razorpay_key_secret: String,

    /// Razorpay API base URL (overridden in tests)
    #[serde(default = "default_gateway_base_url")]
    pub razorpay_base_url: String,

    /// Timeout for gateway order-creation calls (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// ISO currency code charged at checkout
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_jwt_expiration() -> usize {
    3600
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_event_channel_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(
        database_url: impl Into<String>,
        jwt_secret: impl Into<String>,
        razorpay_key_id: impl Into<String>,
        razorpay_key_secret: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: default_jwt_expiration(),
            auth_bootstrap_secret: None,
            host: default_host(),
            port: DEFAULT_PORT,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_bootstrap_schema: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            razorpay_key_id: razorpay_key_id.into(),
            razorpay_key_secret: razorpay_key_secret.into(),
            razorpay_base_url: default_gateway_base_url(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            currency: default_currency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment.as_str(), "development" | "dev" | "test")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Permissive CORS is only acceptable in development or when opted in.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

/// Load configuration from files and environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment =
        std::env::var("APP__ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default");
    builder = builder.add_source(File::from(default_path).required(false));

    let env_path = Path::new(CONFIG_DIR).join(&environment);
    builder = builder.add_source(File::from(env_path).required(false));

    builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    info!(environment = %config.environment, "configuration loaded");
    Ok(config)
}

/// Initialize the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aurum_api={log_level},tower_http=info")));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:",
            "a_jwt_secret_that_is_long_enough_for_validation",
            "rzp_test_key",
            "rzp_test_secret",
            "test",
        )
    }

    #[test]
    fn validation_rejects_short_jwt_secret() {
        let mut cfg = test_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn development_allows_permissive_cors() {
        let cfg = test_config();
        assert!(cfg.is_development());
        assert!(cfg.should_allow_permissive_cors());
    }

    #[test]
    fn production_requires_explicit_cors_opt_in() {
        let mut cfg = test_config();
        cfg.environment = "production".into();
        assert!(!cfg.should_allow_permissive_cors());
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
