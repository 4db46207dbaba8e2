//! Scripted in-memory driver
//!
//! `StubDriver` records every connect attempt and fails or succeeds as
//! instructed, so lifecycle and retry behaviour can be tested without a
//! database.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use mongo_connector::{ClientSettings, ConnectorError, ConnectorResult, Driver, DriverClient, DriverDatabase};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// One recorded call to [`StubDriver::connect`]
#[derive(Debug, Clone)]
pub struct Attempt {
    pub endpoint: String,
    pub settings: ClientSettings,
    /// Tokio time, so paused-clock tests can measure retry delays
    pub at: Instant,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct StubState {
    attempts: Mutex<Vec<Attempt>>,
    failing_endpoints: Mutex<HashSet<String>>,
    fail_next: AtomicUsize,
    latency: Mutex<Duration>,
    clients: Mutex<Vec<StubClient>>,
    next_id: AtomicU32,
}

/// Driver whose outcome is scripted by the test
///
/// Clones share state: keep one clone in the test and hand the other to
/// the manager.
///
/// # Example
///
/// ```
/// use test_utils::StubDriver;
///
/// let driver = StubDriver::new()
///     .failing_endpoint("mongodb://down:27017/")
///     .fail_next(1);
/// assert_eq!(driver.attempt_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StubDriver {
    state: Arc<StubState>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect to `endpoint` fails
    pub fn failing_endpoint(self, endpoint: &str) -> Self {
        self.state
            .failing_endpoints
            .lock()
            .unwrap()
            .insert(endpoint.to_string());
        self
    }

    /// The next `count` connects fail regardless of endpoint
    pub fn fail_next(self, count: usize) -> Self {
        self.state.fail_next.store(count, Ordering::SeqCst);
        self
    }

    /// Every connect takes `latency` before it resolves
    ///
    /// The attempt is recorded when the connect starts.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.state.latency.lock().unwrap() = latency;
        self
    }

    /// Stop failing connects to `endpoint`
    pub fn recover_endpoint(&self, endpoint: &str) {
        self.state.failing_endpoints.lock().unwrap().remove(endpoint);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.state.attempts.lock().unwrap().len()
    }

    /// Clients handed out so far, oldest first
    pub fn clients(&self) -> Vec<StubClient> {
        self.state.clients.lock().unwrap().clone()
    }

    pub fn last_client(&self) -> Option<StubClient> {
        self.state.clients.lock().unwrap().last().cloned()
    }

    fn should_fail(&self, endpoint: &str) -> bool {
        let forced = self
            .state
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        forced || self.state.failing_endpoints.lock().unwrap().contains(endpoint)
    }
}

#[async_trait]
impl Driver for StubDriver {
    type Client = StubClient;

    async fn connect(&self, endpoint: &str, settings: &ClientSettings) -> ConnectorResult<StubClient> {
        let failed = self.should_fail(endpoint);

        self.state.attempts.lock().unwrap().push(Attempt {
            endpoint: endpoint.to_string(),
            settings: settings.clone(),
            at: Instant::now(),
            succeeded: !failed,
        });

        let latency = *self.state.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if failed {
            tracing::debug!(endpoint, "Stub connect failing as scripted");
            return Err(ConnectorError::ConnectionFailed(format!(
                "stub refused {endpoint}"
            )));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let client = StubClient::new(id, endpoint);
        self.state.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Client handed out by [`StubDriver`]
#[derive(Debug, Clone)]
pub struct StubClient {
    id: u32,
    endpoint: String,
    closed: Arc<watch::Sender<bool>>,
}

impl StubClient {
    fn new(id: u32, endpoint: &str) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id,
            endpoint: endpoint.to_string(),
            closed: Arc::new(closed),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fire the close notification, as a server shutdown would
    pub fn close(&self) {
        self.closed.send_replace(true);
    }
}

#[async_trait]
impl DriverClient for StubClient {
    type Database = StubDatabase;

    fn database(&self, name: &str) -> StubDatabase {
        StubDatabase {
            client_id: self.id,
            name: name.to_string(),
        }
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let mut closed = self.closed.subscribe();
        async move {
            let _ = closed.wait_for(|closed| *closed).await;
        }
        .boxed()
    }

    async fn ping(&self) -> ConnectorResult<()> {
        if *self.closed.borrow() {
            Err(ConnectorError::HealthCheckFailed(format!(
                "client {} is closed",
                self.id
            )))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDatabase {
    pub client_id: u32,
    pub name: String,
}

impl DriverDatabase for StubDatabase {
    type Collection = StubCollection;

    fn collection(&self, name: &str) -> StubCollection {
        StubCollection {
            client_id: self.client_id,
            database: self.name.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubCollection {
    pub client_id: u32,
    pub database: String,
    pub name: String,
}
