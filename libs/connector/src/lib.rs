//! Lazily connected MongoDB manager with automatic retry and lifecycle events
//!
//! A [`ConnectionManager`] holds the endpoint, database name and client
//! options, opens a client on first use and keeps retrying failed attempts.
//! Every change is published as a [`LifecycleEvent`].
//!
//! # Features
//!
//! - `mongodb` (default) - [`mongodb::MongoDriver`] backed by the official driver
//! - `config` - [`ConnectorConfig`] loading via `core_config::FromEnv`
//! - `all` - All features
//!
//! # Examples
//!
//! ```ignore
//! use mongo_connector::{ConnectorConfig, ManagerScope, mongodb::MongoDriver};
//! use core_config::FromEnv;
//!
//! let scope = ManagerScope::new(MongoDriver, ConnectorConfig::from_env()?);
//! let manager = scope.instance(None, None);
//!
//! // connects, selects the configured database and returns the collection
//! let orders = manager.collection("orders").await?;
//! ```
//!
//! ## Retry behaviour
//!
//! A failed connect emits `ConnectionFailed` and arms one retry. It fires
//! after the configured delay (3s by default) or as soon as a setting
//! changes, whichever comes first, and repeats until a connect succeeds.

pub mod common;
pub mod config;
pub mod driver;
pub mod events;
pub mod health;
pub mod manager;
pub mod scope;
pub mod settings;

#[cfg(feature = "mongodb")]
pub mod mongodb;

// Re-exports for convenience
pub use common::{ConnectorError, ConnectorResult, RetryPolicy, RetryTrigger};
pub use config::ConnectorConfig;
pub use driver::{Driver, DriverClient, DriverDatabase};
pub use events::{EventBus, LifecycleEvent, SettingChange, SettingKind, SettingValue};
pub use health::{HealthStatus, check_health};
pub use manager::ConnectionManager;
pub use scope::ManagerScope;
pub use settings::{ClientSettings, DEFAULT_DATABASE_NAME, DEFAULT_ENDPOINT};
