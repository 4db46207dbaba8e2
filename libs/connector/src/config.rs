#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_parse_or_default};
use serde_json::{Value, json};

use crate::common::RetryPolicy;
use crate::events::EventBus;
use crate::settings::{DEFAULT_DATABASE_NAME, DEFAULT_ENDPOINT};

/// Connection manager configuration
///
/// Construct it manually or load it from environment variables (with the
/// `config` feature).
///
/// # Example
///
/// ```ignore
/// use mongo_connector::ConnectorConfig;
///
/// let config = ConnectorConfig::with_database("mongodb://localhost:27017", "orders")
///     .with_app_name("orders-api")
///     .with_retry_delay_ms(1000);
///
/// // From environment variables (requires `config` feature)
/// let config = ConnectorConfig::from_env()?;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorConfig {
    /// MongoDB connection string
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    pub endpoint: String,

    /// Database selected when none is given explicitly
    pub database: String,

    /// Optional application name for server logs
    pub app_name: Option<String>,

    /// Delay before a failed connect is retried
    pub retry_delay_ms: u64,

    /// Reconnect when a setting changes while a client is stored
    pub reconnect_on_change: bool,

    /// Buffered lifecycle events per subscriber
    pub event_capacity: usize,
}

impl ConnectorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_database(endpoint: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_reconnect_on_change(mut self, enabled: bool) -> Self {
        self.reconnect_on_change = enabled;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new().with_delay_ms(self.retry_delay_ms)
    }

    /// Client options implied by this config, merged onto the defaults
    pub fn client_options(&self) -> Option<Value> {
        self.app_name
            .as_ref()
            .map(|app_name| json!({ "appName": app_name }))
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database: DEFAULT_DATABASE_NAME.to_string(),
            app_name: None,
            retry_delay_ms: RetryPolicy::DEFAULT_DELAY_MS,
            reconnect_on_change: false,
            event_capacity: EventBus::<()>::DEFAULT_CAPACITY,
        }
    }
}

/// Load ConnectorConfig from environment variables
///
/// Environment variables:
/// - `MONGODB_URL` or `MONGO_URL` (default: mongodb://127.0.0.1:27017/)
/// - `MONGODB_DATABASE` or `MONGO_DATABASE` (default: default)
/// - `MONGODB_APP_NAME` (optional)
/// - `MONGODB_RETRY_DELAY_MS` (default: 3000)
/// - `MONGODB_RECONNECT_ON_CHANGE` (default: false)
/// - `MONGODB_EVENT_CAPACITY` (default: 64)
#[cfg(feature = "config")]
impl FromEnv for ConnectorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let endpoint = std::env::var("MONGODB_URL")
            .or_else(|_| std::env::var("MONGO_URL"))
            .unwrap_or(defaults.endpoint);

        let database = std::env::var("MONGODB_DATABASE")
            .or_else(|_| std::env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.database);

        let app_name = std::env::var("MONGODB_APP_NAME")
            .ok()
            .filter(|name| !name.is_empty());

        Ok(Self {
            endpoint,
            database,
            app_name,
            retry_delay_ms: env_parse_or_default("MONGODB_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            reconnect_on_change: env_parse_or_default(
                "MONGODB_RECONNECT_ON_CHANGE",
                defaults.reconnect_on_change,
            )?,
            event_capacity: env_parse_or_default("MONGODB_EVENT_CAPACITY", defaults.event_capacity)?,
        })
    }
}
