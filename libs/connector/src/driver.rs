//! Seams between the manager and a concrete database client
//!
//! The manager only needs four capabilities from a driver: open a client,
//! derive database and collection handles, and learn when the client closes.
//! [`crate::mongodb::MongoDriver`] binds them to the `mongodb` crate; tests
//! plug in scripted drivers.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

use crate::common::ConnectorResult;
use crate::settings::ClientSettings;

/// Opens clients for a connection string and option set
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Client: DriverClient;

    /// Establish and verify a client.
    async fn connect(&self, endpoint: &str, settings: &ClientSettings)
    -> ConnectorResult<Self::Client>;
}

/// A live client handle
#[async_trait]
pub trait DriverClient: Clone + fmt::Debug + Send + Sync + 'static {
    type Database: DriverDatabase;

    fn database(&self, name: &str) -> Self::Database;

    /// Resolves once the client reports that it has closed.
    fn closed(&self) -> BoxFuture<'static, ()>;

    /// Lightweight round trip to the server
    async fn ping(&self) -> ConnectorResult<()>;
}

/// A database handle derived from a client
pub trait DriverDatabase: Clone + fmt::Debug + Send + Sync + 'static {
    type Collection: Send;

    fn collection(&self, name: &str) -> Self::Collection;
}
