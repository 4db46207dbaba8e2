use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use mongodb::bson::Document;
use mongodb::event::EventHandler;
use mongodb::event::sdam::SdamEvent;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::common::{ConnectorError, ConnectorResult};
use crate::driver::{Driver, DriverClient, DriverDatabase};
use crate::settings::{ClientSettings, redact};

/// [`Driver`] backed by the official `mongodb` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

/// Connected MongoDB client plus its close signal
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
    closed: watch::Receiver<bool>,
}

impl MongoClient {
    /// The underlying driver client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Copy the option keys the Rust driver understands onto parsed options.
///
/// Keys that are absent or of the wrong type leave the parsed value alone.
pub(crate) fn apply_settings(options: &mut ClientOptions, settings: &ClientSettings) {
    if let Some(size) = settings.get_u64("maxPoolSize").and_then(|v| u32::try_from(v).ok()) {
        options.max_pool_size = Some(size);
    }
    if let Some(size) = settings.get_u64("minPoolSize").and_then(|v| u32::try_from(v).ok()) {
        options.min_pool_size = Some(size);
    }
    if let Some(ms) = settings.get_u64("connectTimeoutMS") {
        options.connect_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = settings.get_u64("serverSelectionTimeoutMS") {
        options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(app_name) = settings.get_str("appName") {
        options.app_name = Some(app_name.to_string());
    }
}

#[async_trait]
impl Driver for MongoDriver {
    type Client = MongoClient;

    /// Parse the connection string, apply settings and verify the client
    /// with a lightweight `listDatabases` round trip.
    async fn connect(&self, endpoint: &str, settings: &ClientSettings) -> ConnectorResult<MongoClient> {
        info!(endpoint = %redact(endpoint), "Attempting to connect to MongoDB");

        let mut options = ClientOptions::parse(endpoint).await?;
        apply_settings(&mut options, settings);

        let (closed_tx, closed_rx) = watch::channel(false);
        options.sdam_event_handler = Some(EventHandler::callback(move |event: SdamEvent| {
            if let SdamEvent::TopologyClosed(_) = event {
                debug!("MongoDB topology closed");
                closed_tx.send_replace(true);
            }
        }));

        let client = Client::with_options(options)?;

        client
            .list_database_names()
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        info!("Successfully connected to MongoDB");
        Ok(MongoClient {
            client,
            closed: closed_rx,
        })
    }
}

#[async_trait]
impl DriverClient for MongoClient {
    type Database = Database;

    fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let mut closed = self.closed.clone();
        async move {
            // a dropped sender means the client is gone as well
            let _ = closed.wait_for(|closed| *closed).await;
        }
        .boxed()
    }

    async fn ping(&self) -> ConnectorResult<()> {
        self.client
            .list_database_names()
            .await
            .map(|_| ())
            .map_err(|e| ConnectorError::HealthCheckFailed(e.to_string()))
    }
}

impl DriverDatabase for Database {
    type Collection = Collection<Document>;

    fn collection(&self, name: &str) -> Collection<Document> {
        Database::collection::<Document>(self, name)
    }
}
