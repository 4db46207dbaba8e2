use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::config::ConnectorConfig;
use crate::driver::Driver;
use crate::manager::ConnectionManager;
use crate::settings::redact;

/// Owner of the shared [`ConnectionManager`] for one lifecycle scope
///
/// Bootstrap code builds one scope per process (or per test) and hands it
/// to whoever needs the manager. The manager is created on the first
/// [`ManagerScope::instance`] call; later calls return the same manager and
/// reconfigure it.
///
/// # Example
///
/// ```ignore
/// use mongo_connector::{ConnectorConfig, ManagerScope, mongodb::MongoDriver};
///
/// let scope = ManagerScope::new(MongoDriver, ConnectorConfig::from_env()?);
/// let manager = scope.instance(None, None);
/// let users = manager.collection("users").await?;
/// ```
pub struct ManagerScope<D: Driver> {
    driver: Arc<D>,
    config: ConnectorConfig,
    manager: OnceLock<ConnectionManager<D>>,
}

impl<D: Driver> ManagerScope<D> {
    pub fn new(driver: D, config: ConnectorConfig) -> Self {
        Self {
            driver: Arc::new(driver),
            config,
            manager: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// The scope's manager, created on first use.
    ///
    /// `endpoint` and `options` go through the validated setters on every
    /// call, so an invalid or unchanged value leaves the manager as it is.
    pub fn instance(&self, endpoint: Option<&str>, options: Option<&Value>) -> ConnectionManager<D> {
        debug!(
            endpoint = ?endpoint.map(redact),
            options = ?options,
            "Retrieving connection manager"
        );

        let manager = self.manager.get_or_init(|| {
            ConnectionManager::with_shared_driver(Arc::clone(&self.driver), &self.config)
        });

        if let Some(endpoint) = endpoint {
            manager.set_endpoint(endpoint);
        }
        if let Some(options) = options {
            manager.set_options(options);
        }

        manager.clone()
    }

    /// The manager, if [`Self::instance`] has been called
    pub fn get(&self) -> Option<ConnectionManager<D>> {
        self.manager.get().cloned()
    }
}

impl<D: Driver> std::fmt::Debug for ManagerScope<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerScope")
            .field("config", &self.config)
            .field("manager", &self.manager.get())
            .finish()
    }
}
