//! MongoDB driver binding
//!
//! Connects through the official `mongodb` crate and reports a close when
//! the client's topology shuts down.

mod driver;

pub use driver::{MongoClient, MongoDriver};

// Re-export MongoDB types for convenience
pub use mongodb::bson::Document;
pub use mongodb::{Client, Collection, Database};

/// Manager bound to the MongoDB driver
pub type MongoConnectionManager = crate::ConnectionManager<MongoDriver>;

/// Scope bound to the MongoDB driver
pub type MongoManagerScope = crate::ManagerScope<MongoDriver>;
