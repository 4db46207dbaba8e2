//! End-to-end checks against a real MongoDB container
//!
//! Run with `cargo test -p mongo_connector --test live_mongo -- --ignored`
//! (requires Docker).

#![cfg(feature = "mongodb")]

use mongo_connector::mongodb::{Document, MongoConnectionManager, MongoDriver};
use mongo_connector::{ConnectionManager, ConnectorConfig, DriverClient};
use serde_json::json;
use std::time::Duration;
use test_utils::{TestDataBuilder, TestMongo};

#[tokio::test]
#[ignore] // Requires Docker
async fn test_collection_roundtrip() {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name("test_collection_roundtrip");

    let manager: MongoConnectionManager = ConnectionManager::with_config(
        MongoDriver,
        &ConnectorConfig::with_database(mongo.connection_string(), builder.database_name()),
    );

    let collection = manager.collection("items").await.unwrap();
    let mut doc = Document::new();
    doc.insert("name", builder.name("item", "main"));
    collection.insert_one(doc).await.unwrap();

    assert_eq!(collection.count_documents(Document::new()).await.unwrap(), 1);
    assert!(manager.check_health().await.healthy);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_retry_reaches_late_server() {
    let config = ConnectorConfig::new("mongodb://127.0.0.1:1/").with_retry_delay_ms(100);
    let manager = ConnectionManager::with_config(MongoDriver, &config);
    manager.set_options(&json!({ "serverSelectionTimeoutMS": 200 }));

    manager.connect(None, None).await;
    assert!(!manager.is_connected());
    assert!(manager.is_retry_armed());

    let mongo = TestMongo::new().await;
    manager.set_endpoint(mongo.connection_string());

    tokio::time::timeout(Duration::from_secs(30), async {
        while !manager.is_connected() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();

    assert!(manager.client().unwrap().ping().await.is_ok());
}
