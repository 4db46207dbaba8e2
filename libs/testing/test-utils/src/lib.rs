//! Shared test utilities for connector testing
//!
//! This crate provides reusable test infrastructure:
//! - `StubDriver`: Scripted in-memory driver (always available)
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Lifecycle event helpers (always available)
//!
//! # Features
//!
//! - `mongo`: Enables MongoDB container infrastructure
//! - `all`: Enables all container infrastructure
//!
//! # Usage
//!
//! ## Stub driver
//!
//! ```rust,ignore
//! use mongo_connector::ConnectionManager;
//! use test_utils::StubDriver;
//!
//! #[tokio::test(start_paused = true)]
//! async fn my_retry_test() {
//!     let driver = StubDriver::new().fail_next(1);
//!     let manager = ConnectionManager::new(driver.clone());
//!
//!     manager.connect(None, None).await;
//!     tokio::time::sleep(std::time::Duration::from_secs(4)).await;
//!
//!     assert_eq!(driver.attempt_count(), 2);
//! }
//! ```
//!
//! ## MongoDB Testing
//!
//! Add `features = ["mongo"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["mongo"] }
//! ```

mod stub;

#[cfg(feature = "mongo")]
mod mongo;

pub use stub::{Attempt, StubClient, StubCollection, StubDatabase, StubDriver};

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

/// Builder for test data with deterministic names
///
/// Parallel tests sharing one server stay apart by deriving database and
/// collection names from the test name.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_collection_roundtrip");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("orders", "main"), "test-orders-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Database name unique to this builder's seed
    pub fn database_name(&self) -> String {
        format!("test_db_{}", self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    use mongo_connector::LifecycleEvent;
    use std::time::Duration;
    use tokio::sync::broadcast::Receiver;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Wait for the next lifecycle event, panicking after `timeout`
    pub async fn next_event<C: Clone>(
        events: &mut Receiver<LifecycleEvent<C>>,
        timeout: Duration,
    ) -> LifecycleEvent<C> {
        match tokio::time::timeout(timeout, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => panic!("event channel failed: {err}"),
            Err(_) => panic!("no lifecycle event within {timeout:?}"),
        }
    }

    /// Names of every event already queued, in order
    pub fn drain_names<C: Clone>(events: &mut Receiver<LifecycleEvent<C>>) -> Vec<&'static str> {
        let mut names = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => names.push(event.name()),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        names
    }

    /// Count queued events with the given name
    pub fn count_named(names: &[&str], name: &str) -> usize {
        names.iter().filter(|n| **n == name).count()
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
