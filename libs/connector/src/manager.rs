//! Connection lifecycle manager
//!
//! ```text
//!            connect()                     success
//!   Idle ─────────────────> Connecting ───────────────> Connected ──close──> Disconnect event
//!                               │   ^                   (handle kept, no reconnect)
//!                       failure │   │ timer elapsed
//!                               v   │ or setting changed
//!                           RetryArmed
//! ```
//!
//! Failures never surface as errors from [`ConnectionManager::connect`]; they
//! are published as [`LifecycleEvent::ConnectionFailed`] and retried with a
//! fixed delay, forever, until a connect succeeds.

use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::{
    ConnectorError, ConnectorResult, RetryGuard, RetryPolicy, RetryTrigger, lock,
};
use crate::config::ConnectorConfig;
use crate::driver::{Driver, DriverClient, DriverDatabase};
use crate::events::{EventBus, LifecycleEvent, SettingChange, SettingKind};
use crate::health::{HealthStatus, check_health};
use crate::settings::{ClientSettings, Settings, is_connection_string, redact};

type Client<D> = <D as Driver>::Client;
type Database<D> = <<D as Driver>::Client as DriverClient>::Database;
type Collection<D> = <Database<D> as DriverDatabase>::Collection;

struct Connection<D: Driver> {
    client: Option<Client<D>>,
    database: Option<Database<D>>,
}

struct Inner<D: Driver> {
    driver: Arc<D>,
    settings: Mutex<Settings>,
    connection: Mutex<Connection<D>>,
    events: EventBus<Client<D>>,
    retry: RetryGuard,
    policy: RetryPolicy,
    reconnect_on_change: bool,
    // single-shot: set when a reconnect is scheduled, cleared by whoever runs it
    reconnect_pending: AtomicBool,
    // bumped on every setting change; armed retries wait on it
    revision: watch::Sender<u64>,
    close_watcher: Mutex<Option<JoinHandle<()>>>,
}

impl<D: Driver> Drop for Inner<D> {
    fn drop(&mut self) {
        self.retry.consume_any();
        if let Some(watcher) = lock(&self.close_watcher).take() {
            watcher.abort();
        }
    }
}

/// Lazily connected, self-healing handle to a database
///
/// Cloning is cheap and every clone shares the same state. Background
/// tasks (retry timers, close observers) hold weak references, so dropping
/// the last clone stops them.
///
/// # Example
///
/// ```ignore
/// use mongo_connector::{ConnectionManager, LifecycleEvent, mongodb::MongoDriver};
///
/// let manager = ConnectionManager::new(MongoDriver);
/// let mut events = manager.subscribe();
///
/// let orders = manager.collection("orders").await?;
///
/// while let Ok(event) = events.recv().await {
///     tracing::info!(event = event.name(), "lifecycle");
/// }
/// ```
pub struct ConnectionManager<D: Driver> {
    inner: Arc<Inner<D>>,
}

impl<D: Driver> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &redact(&self.endpoint()))
            .field("database_name", &self.database_name())
            .field("connected", &self.is_connected())
            .field("retry_armed", &self.is_retry_armed())
            .finish()
    }
}

impl<D: Driver> ConnectionManager<D> {
    /// Create a manager with the default configuration
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, &ConnectorConfig::default())
    }

    pub fn with_config(driver: D, config: &ConnectorConfig) -> Self {
        Self::with_shared_driver(Arc::new(driver), config)
    }

    /// Create a manager from a config; invalid config values fall back to defaults.
    pub fn with_shared_driver(driver: Arc<D>, config: &ConnectorConfig) -> Self {
        let mut settings = Settings::default();
        if settings.replace_endpoint(&config.endpoint).is_none()
            && config.endpoint != settings.endpoint()
        {
            warn!(
                endpoint = %redact(&config.endpoint),
                "Configured connection string is invalid, using default"
            );
        }
        settings.replace_database_name(&config.database);
        if let Some(options) = config.client_options() {
            settings.replace_options(&options);
        }

        debug!(
            endpoint = %redact(settings.endpoint()),
            database = %settings.database_name(),
            options = ?settings.options(),
            "Created connection manager"
        );

        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                driver,
                settings: Mutex::new(settings),
                connection: Mutex::new(Connection {
                    client: None,
                    database: None,
                }),
                events: EventBus::new(config.event_capacity),
                retry: RetryGuard::new(),
                policy: config.retry_policy(),
                reconnect_on_change: config.reconnect_on_change,
                reconnect_pending: AtomicBool::new(false),
                revision,
                close_watcher: Mutex::new(None),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner<D>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// True when both handles point at the same manager
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscribe to lifecycle events; drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent<Client<D>>> {
        self.inner.events.subscribe()
    }

    pub fn endpoint(&self) -> String {
        lock(&self.inner.settings).endpoint().to_string()
    }

    pub fn database_name(&self) -> String {
        lock(&self.inner.settings).database_name().to_string()
    }

    pub fn options(&self) -> ClientSettings {
        lock(&self.inner.settings).options().clone()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// The stored client, if any connect has succeeded
    pub fn client(&self) -> Option<Client<D>> {
        lock(&self.inner.connection).client.clone()
    }

    /// The database selected by the last [`Self::database`] call on this client
    pub fn current_database(&self) -> Option<Database<D>> {
        lock(&self.inner.connection).database.clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner.connection).client.is_some()
    }

    pub fn is_retry_armed(&self) -> bool {
        self.inner.retry.is_armed()
    }

    /// Replace the connection string.
    ///
    /// Ignored unless `value` is a valid connection string different from
    /// the current one. Returns whether the endpoint changed.
    pub fn set_endpoint(&self, value: &str) -> bool {
        self.apply_endpoint(value, true)
    }

    fn apply_endpoint(&self, value: &str, reconnect: bool) -> bool {
        let change = lock(&self.inner.settings).replace_endpoint(value);
        let Some(change) = change else {
            debug!(endpoint = %redact(value), "Endpoint unchanged or invalid, ignoring");
            return false;
        };

        debug!(
            current = %redact(&change.current),
            previous = %redact(&change.previous),
            "Endpoint changed"
        );
        self.inner.events.emit(LifecycleEvent::EndpointChanged {
            current: change.current.clone(),
            previous: change.previous.clone(),
        });
        self.setting_changed(SettingChange::text(SettingKind::Endpoint, &change), reconnect);
        true
    }

    /// Replace the database name; ignored when empty or unchanged.
    ///
    /// A selected database handle is dropped so the next access reselects it.
    pub fn set_database_name(&self, value: &str) -> bool {
        let change = lock(&self.inner.settings).replace_database_name(value);
        let Some(change) = change else {
            return false;
        };

        lock(&self.inner.connection).database = None;

        debug!(current = %change.current, previous = %change.previous, "Database name changed");
        self.inner.events.emit(LifecycleEvent::DatabaseNameChanged {
            current: change.current.clone(),
            previous: change.previous.clone(),
        });
        self.setting_changed(SettingChange::text(SettingKind::DatabaseName, &change), true);
        true
    }

    /// Store the defaults merged with `value`.
    ///
    /// Ignored unless `value` is a non-empty JSON object whose merge differs
    /// from the stored options.
    pub fn set_options(&self, value: &Value) -> bool {
        self.apply_options(value, true)
    }

    fn apply_options(&self, value: &Value, reconnect: bool) -> bool {
        let change = lock(&self.inner.settings).replace_options(value);
        let Some(change) = change else {
            return false;
        };

        debug!(current = ?change.current, "Client options changed");
        self.inner.events.emit(LifecycleEvent::OptionsChanged {
            current: change.current.clone(),
            previous: change.previous.clone(),
        });
        self.setting_changed(SettingChange::options(&change), reconnect);
        true
    }

    /// Publish a change and wake any armed retry.
    ///
    /// `reconnect` is false when the change comes from [`Self::connect`],
    /// which makes its own attempt.
    fn setting_changed(&self, change: SettingChange, reconnect: bool) {
        let kind = change.kind;
        self.inner.events.emit(LifecycleEvent::SettingChanged(change));
        self.inner.revision.send_modify(|revision| *revision += 1);

        if reconnect
            && self.inner.reconnect_on_change
            && self.is_connected()
            && !self.is_retry_armed()
        {
            self.schedule_reconnect(kind);
        }
    }

    /// Schedule one reconnect; further changes before it runs join it.
    fn schedule_reconnect(&self, kind: SettingKind) {
        if self
            .inner
            .reconnect_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(setting = %kind, "Reconnect already scheduled");
            return;
        }

        info!(setting = %kind, "Setting changed while connected, reconnecting");
        let weak = Arc::downgrade(&self.inner);
        let scheduled = spawn_background("reconnect", async move {
            if let Some(manager) = Self::from_weak(&weak) {
                if manager.inner.reconnect_pending.swap(false, Ordering::SeqCst) {
                    manager.connect(None, None).await;
                }
            }
        });

        if scheduled.is_none() {
            self.inner.reconnect_pending.store(false, Ordering::SeqCst);
        }
    }

    /// Connect with the current settings, optionally replacing endpoint and options first.
    ///
    /// Always returns the manager. On failure a
    /// [`LifecycleEvent::ConnectionFailed`] is emitted and a retry is armed.
    /// An explicit endpoint that fails validation counts as a failed attempt.
    pub async fn connect(&self, endpoint: Option<&str>, options: Option<&Value>) -> &Self {
        // an explicit attempt supersedes any pending retry or reconnect
        self.inner.retry.consume_any();
        self.inner.reconnect_pending.store(false, Ordering::SeqCst);

        if let Some(endpoint) = endpoint {
            self.apply_endpoint(endpoint, false);
        }
        if let Some(options) = options {
            self.apply_options(options, false);
        }

        if let Some(rejected) = endpoint.filter(|value| !is_connection_string(value)) {
            warn!(
                endpoint = %redact(rejected),
                "Rejected connection string, waiting for a valid endpoint"
            );
            self.on_failed(ConnectorError::InvalidEndpoint(redact(rejected)));
            return self;
        }

        let (endpoint, settings) = {
            let settings = lock(&self.inner.settings);
            (settings.endpoint().to_string(), settings.options().clone())
        };

        debug!(endpoint = %redact(&endpoint), "Connecting to client");
        match self.inner.driver.connect(&endpoint, &settings).await {
            Ok(client) => {
                info!(endpoint = %redact(&endpoint), "Connected to client");
                self.on_connected(client);
            }
            Err(err) => {
                warn!(
                    endpoint = %redact(&endpoint),
                    error = %err,
                    delay_ms = self.inner.policy.delay.as_millis() as u64,
                    "Connection failed, retrying on setting change or after delay"
                );
                self.on_failed(err);
            }
        }

        self
    }

    fn on_connected(&self, client: Client<D>) {
        {
            let mut connection = lock(&self.inner.connection);
            connection.client = Some(client.clone());
            connection.database = None;
        }

        self.inner.events.emit(LifecycleEvent::Connected(client.clone()));
        self.watch_close(client);
    }

    fn on_failed(&self, err: ConnectorError) {
        let client = self.client();
        self.inner.events.emit(LifecycleEvent::ConnectionFailed {
            client,
            reason: err.to_string(),
        });
        self.arm_retry();
    }

    /// Observe the client's close notification, replacing any earlier observer.
    fn watch_close(&self, client: Client<D>) {
        let closed = client.closed();
        let weak = Arc::downgrade(&self.inner);
        let watcher = spawn_background("close watcher", async move {
            closed.await;
            if let Some(manager) = Self::from_weak(&weak) {
                manager.on_close(client);
            }
        });

        let previous = std::mem::replace(&mut *lock(&self.inner.close_watcher), watcher);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn on_close(&self, client: Client<D>) {
        debug!(endpoint = %redact(&self.endpoint()), "Disconnected from client");
        self.inner.events.emit(LifecycleEvent::Disconnect(client));
    }

    /// Arm the single pending retry: whichever of the timer or a setting
    /// change comes first wakes it.
    fn arm_retry(&self) {
        let Some(generation) = self.inner.retry.try_arm() else {
            debug!("Retry already armed");
            return;
        };

        // subscribing marks the current revision as seen
        let mut changes = self.inner.revision.subscribe();
        let delay = self.inner.policy.delay;
        let weak = Arc::downgrade(&self.inner);

        let waiter = spawn_background("retry waiter", async move {
            let trigger = tokio::select! {
                _ = tokio::time::sleep(delay) => RetryTrigger::Timer,
                _ = changes.changed() => RetryTrigger::SettingChanged,
            };

            if let Some(manager) = Self::from_weak(&weak) {
                if manager.inner.retry.consume(generation) {
                    manager.retry(trigger).await;
                }
            }
        });

        // without a runtime the retry stays armed for a manual on_retries()
        if let Some(waiter) = waiter {
            self.inner.retry.attach(generation, waiter);
        }
    }

    /// Run the armed retry now.
    ///
    /// Does nothing when no retry is armed, so concurrent triggers collapse
    /// into one attempt.
    pub async fn on_retries(&self) -> &Self {
        if self.inner.retry.consume_any() {
            self.retry(RetryTrigger::Manual).await;
        } else {
            debug!("No retry armed");
        }
        self
    }

    async fn retry(&self, trigger: RetryTrigger) {
        info!(
            trigger = ?trigger,
            endpoint = %redact(&self.endpoint()),
            "Retrying connection"
        );
        self.connect(None, None).await;
    }

    /// Select a database, connecting first when no client is stored.
    pub async fn database(&self, name: Option<&str>) -> &Self {
        if !self.is_connected() {
            self.connect(None, None).await;
        }

        if let Some(name) = name {
            self.set_database_name(name);
        }

        let database_name = self.database_name();
        let mut connection = lock(&self.inner.connection);
        match connection.client.as_ref().map(|c| c.database(&database_name)) {
            Some(database) => {
                connection.database = Some(database);
                debug!(database = %database_name, "Selected database");
            }
            None => {
                warn!(database = %database_name, "No client available, database not selected");
            }
        }

        self
    }

    /// Fetch a collection, connecting and selecting the database as needed.
    ///
    /// Returns [`ConnectorError::NotConnected`] when no client could be
    /// established; the armed retry keeps running in the background.
    pub async fn collection(&self, name: &str) -> ConnectorResult<Collection<D>> {
        debug!(collection = %name, "Retrieving collection");

        let needs_database = {
            let connection = lock(&self.inner.connection);
            connection.client.is_none() || connection.database.is_none()
        };
        if needs_database {
            self.database(None).await;
        }

        lock(&self.inner.connection)
            .database
            .as_ref()
            .map(|database| database.collection(name))
            .ok_or_else(|| {
                ConnectorError::NotConnected(format!(
                    "collection '{name}' requested before a connection was established"
                ))
            })
    }

    /// Ping the stored client.
    pub async fn check_health(&self) -> HealthStatus {
        match self.client() {
            Some(client) => check_health(&client).await,
            None => HealthStatus::unavailable("no client connected"),
        }
    }

    /// Stop background work: cancel the armed retry and the close observer.
    ///
    /// The stored client is kept; settings and events remain usable.
    pub fn shutdown(&self) {
        if self.inner.retry.consume_any() {
            debug!("Cancelled pending retry");
        }
        if let Some(watcher) = lock(&self.inner.close_watcher).take() {
            watcher.abort();
        }
        info!("Connection manager shut down");
    }
}

/// Spawn background work on the current tokio runtime.
///
/// Returns `None`, with a warning, when called outside a runtime.
fn spawn_background<F>(task: &'static str, future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn(future)),
        Err(_) => {
            warn!(task, "No async runtime, background task not started");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use mockall::mock;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    static NEXT_ID: AtomicU32 = AtomicU32::new(1);

    #[derive(Debug, Clone)]
    struct FakeClient {
        id: u32,
        closed: Arc<watch::Sender<bool>>,
    }

    impl FakeClient {
        fn new() -> Self {
            let (closed, _) = watch::channel(false);
            Self {
                id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
                closed: Arc::new(closed),
            }
        }

        fn close(&self) {
            self.closed.send_replace(true);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct FakeDatabase {
        name: String,
    }

    impl DriverDatabase for FakeDatabase {
        type Collection = (String, String);

        fn collection(&self, name: &str) -> Self::Collection {
            (self.name.clone(), name.to_string())
        }
    }

    #[async_trait]
    impl DriverClient for FakeClient {
        type Database = FakeDatabase;

        fn database(&self, name: &str) -> FakeDatabase {
            FakeDatabase {
                name: name.to_string(),
            }
        }

        fn closed(&self) -> BoxFuture<'static, ()> {
            let mut rx = self.closed.subscribe();
            async move {
                let _ = rx.wait_for(|closed| *closed).await;
            }
            .boxed()
        }

        async fn ping(&self) -> ConnectorResult<()> {
            Ok(())
        }
    }

    mock! {
        Driver {}

        #[async_trait]
        impl Driver for Driver {
            type Client = FakeClient;

            async fn connect(&self, endpoint: &str, settings: &ClientSettings) -> ConnectorResult<FakeClient>;
        }
    }

    fn refused() -> ConnectorResult<FakeClient> {
        Err(ConnectorError::ConnectionFailed("connection refused".to_string()))
    }

    fn drain<C: Clone>(rx: &mut broadcast::Receiver<LifecycleEvent<C>>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        names
    }

    #[tokio::test]
    async fn test_connect_uses_current_settings() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .withf(|endpoint, settings| {
                endpoint == "mongodb://db:27017/"
                    && settings.get_u64("maxPoolSize") == Some(10)
                    && settings.get_u64("minPoolSize") == Some(5)
            })
            .times(1)
            .returning(|_, _| Ok(FakeClient::new()));

        let manager = ConnectionManager::new(driver);
        let mut events = manager.subscribe();

        manager
            .connect(Some("mongodb://db:27017/"), Some(&json!({ "maxPoolSize": 10 })))
            .await;

        assert!(manager.is_connected());
        assert!(!manager.is_retry_armed());
        assert_eq!(
            drain(&mut events),
            vec![
                "endpoint-changed",
                "setting-changed",
                "options-changed",
                "setting-changed",
                "connected",
            ]
        );
    }

    #[tokio::test]
    async fn test_setters_ignore_duplicates_and_invalid_values() {
        let manager = ConnectionManager::new(MockDriver::new());
        let mut events = manager.subscribe();

        assert!(manager.set_endpoint("mongodb://db:27017/"));
        assert!(!manager.set_endpoint("mongodb://db:27017/"));
        assert!(!manager.set_endpoint(""));
        assert!(!manager.set_endpoint("db:27017"));
        assert!(!manager.set_database_name(""));
        assert!(!manager.set_database_name("default"));
        assert!(!manager.set_options(&json!({})));
        assert!(!manager.set_options(&json!("maxPoolSize=5")));

        assert_eq!(manager.endpoint(), "mongodb://db:27017/");
        assert_eq!(drain(&mut events), vec!["endpoint-changed", "setting-changed"]);
    }

    #[tokio::test]
    async fn test_options_always_merged_with_defaults() {
        let manager = ConnectionManager::new(MockDriver::new());

        manager.set_options(&json!({ "appName": "probe" }));
        let options = manager.options();
        assert_eq!(options.get_str("appName"), Some("probe"));
        assert_eq!(options.get_u64("maxPoolSize"), Some(100));

        manager.set_options(&json!({ "maxPoolSize": 100, "minPoolSize": 1 }));
        let options = manager.options();
        assert_eq!(options.get_str("appName"), None);
        assert_eq!(options.get_u64("minPoolSize"), Some(1));
        assert_eq!(options.get_u64("connectTimeoutMS"), Some(10_000));
    }

    #[tokio::test]
    async fn test_failed_connect_arms_retry_without_error() {
        let mut driver = MockDriver::new();
        driver.expect_connect().times(1).returning(|_, _| refused());

        let manager = ConnectionManager::new(driver);
        let mut events = manager.subscribe();

        let returned = manager.connect(None, None).await;
        assert!(returned.ptr_eq(&manager));
        assert!(!manager.is_connected());
        assert!(manager.is_retry_armed());

        match events.try_recv().unwrap() {
            LifecycleEvent::ConnectionFailed { client, reason } => {
                assert!(client.is_none());
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        manager.shutdown();
        assert!(!manager.is_retry_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retries_runs_once_per_failure() {
        let mut driver = MockDriver::new();
        let mut seq = mockall::Sequence::new();
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| refused());
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(FakeClient::new()));

        let manager = ConnectionManager::new(driver);
        manager.connect(None, None).await;

        manager.on_retries().await;
        assert!(manager.is_connected());

        // nothing armed any more: neither a second call nor the timer connects again
        manager.on_retries().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_collection_connects_and_selects_database() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .times(1)
            .returning(|_, _| Ok(FakeClient::new()));

        let manager = ConnectionManager::with_config(
            driver,
            &ConnectorConfig::with_database("mongodb://db:27017/", "shop"),
        );

        let collection = manager.collection("orders").await.unwrap();
        assert_eq!(collection, ("shop".to_string(), "orders".to_string()));

        // stored database is reused, no further connect
        let collection = manager.collection("users").await.unwrap();
        assert_eq!(collection.1, "users");
    }

    #[tokio::test]
    async fn test_database_name_change_reselects_database() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .times(1)
            .returning(|_, _| Ok(FakeClient::new()));

        let manager = ConnectionManager::new(driver);
        manager.database(Some("first")).await;
        assert_eq!(
            manager.current_database().map(|db| db.name),
            Some("first".to_string())
        );

        manager.set_database_name("second");
        assert!(manager.current_database().is_none());

        let (database, _) = manager.collection("items").await.unwrap();
        assert_eq!(database, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_without_connection_is_an_error() {
        let mut driver = MockDriver::new();
        driver.expect_connect().returning(|_, _| refused());

        let manager = ConnectionManager::new(driver);
        let err = manager.collection("orders").await.unwrap_err();

        assert!(matches!(err, ConnectorError::NotConnected(_)));
        assert!(manager.is_retry_armed());
        manager.shutdown();
    }

    #[tokio::test]
    async fn test_close_emits_disconnect_and_keeps_client() {
        let client = FakeClient::new();
        let returned = client.clone();

        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .times(1)
            .returning(move |_, _| Ok(returned.clone()));

        let manager = ConnectionManager::new(driver);
        let mut events = manager.subscribe();
        manager.connect(None, None).await;
        assert_eq!(events.recv().await.unwrap().name(), "connected");

        client.close();
        match events.recv().await.unwrap() {
            LifecycleEvent::Disconnect(closed) => assert_eq!(closed.id, client.id),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_on_change_when_enabled() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .times(2)
            .returning(|_, _| Ok(FakeClient::new()));

        let config = ConnectorConfig::default().with_reconnect_on_change(true);
        let manager = ConnectionManager::with_config(driver, &config);
        let mut events = manager.subscribe();

        manager.connect(None, None).await;
        manager.set_endpoint("mongodb://replica:27017/");

        let mut connected = 0;
        while connected < 2 {
            if let LifecycleEvent::Connected(_) = events.recv().await.unwrap() {
                connected += 1;
            }
        }
    }

    #[test]
    fn test_connect_outside_runtime_does_not_panic() {
        let mut driver = MockDriver::new();
        let mut seq = mockall::Sequence::new();
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| refused());
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(FakeClient::new()));

        let config = ConnectorConfig::default().with_reconnect_on_change(true);
        let manager = ConnectionManager::with_config(driver, &config);

        // no waiter can be spawned, so the retry waits for a manual trigger
        futures::executor::block_on(manager.connect(None, None));
        assert!(manager.is_retry_armed());

        futures::executor::block_on(manager.on_retries());
        assert!(manager.is_connected());

        // no reconnect task either; the pending flag must not stick
        assert!(manager.set_endpoint("mongodb://replica:27017/"));
        assert!(!manager.inner.reconnect_pending.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_health_without_client() {
        let manager = ConnectionManager::new(MockDriver::new());
        let status = manager.check_health().await;
        assert!(!status.healthy);
    }

    #[test]
    fn test_invalid_configured_endpoint_falls_back() {
        let manager =
            ConnectionManager::with_config(MockDriver::new(), &ConnectorConfig::new("localhost"));
        assert_eq!(manager.endpoint(), crate::settings::DEFAULT_ENDPOINT);
        assert_eq!(manager.retry_policy().delay, Duration::from_millis(3000));
    }
}
