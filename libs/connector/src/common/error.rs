/// Unified error type for connector operations
///
/// Connection failures inside [`crate::ConnectionManager::connect`] are turned
/// into lifecycle events; this type surfaces from driver implementations,
/// configuration loading and [`crate::ConnectionManager::collection`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// MongoDB driver errors
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// The driver could not establish a client
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection string rejected by validation
    #[error("Invalid connection string: {0}")]
    InvalidEndpoint(String),

    /// No client is available for the requested operation
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(feature = "config")]
impl From<core_config::ConfigError> for ConnectorError {
    fn from(err: core_config::ConfigError) -> Self {
        ConnectorError::ConfigError(err.to_string())
    }
}

/// Result type alias for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
