//! Connector Probe - Entry Point
//!
//! Connects to MongoDB with the lazily connected manager and logs its lifecycle.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    connector_probe::run().await
}
