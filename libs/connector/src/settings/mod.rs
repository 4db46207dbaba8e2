//! Connection settings and their validated setters

mod endpoint;
mod options;

pub use endpoint::{is_connection_string, redact};
pub use options::ClientSettings;

use serde_json::Value;

/// Endpoint used until one is configured
pub const DEFAULT_ENDPOINT: &str = "mongodb://127.0.0.1:27017/";

/// Database name used until one is configured
pub const DEFAULT_DATABASE_NAME: &str = "default";

/// A replaced setting value
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub current: T,
    pub previous: T,
}

/// Mutable connection settings
///
/// Every `replace_*` method is a no-op (returns `None`) when the value is
/// invalid or equal to the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    endpoint: String,
    database_name: String,
    options: ClientSettings,
}

impl Settings {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn options(&self) -> &ClientSettings {
        &self.options
    }

    pub fn replace_endpoint(&mut self, value: &str) -> Option<Change<String>> {
        if !is_connection_string(value) || value == self.endpoint {
            return None;
        }

        let previous = std::mem::replace(&mut self.endpoint, value.to_string());
        Some(Change {
            current: self.endpoint.clone(),
            previous,
        })
    }

    pub fn replace_database_name(&mut self, value: &str) -> Option<Change<String>> {
        if value.trim().is_empty() || value == self.database_name {
            return None;
        }

        let previous = std::mem::replace(&mut self.database_name, value.to_string());
        Some(Change {
            current: self.database_name.clone(),
            previous,
        })
    }

    /// Store the defaults merged with `value`, compared against the stored merge.
    pub fn replace_options(&mut self, value: &Value) -> Option<Change<ClientSettings>> {
        let merged = ClientSettings::merged(value)?;
        if merged == self.options {
            return None;
        }

        let previous = std::mem::replace(&mut self.options, merged);
        Some(Change {
            current: self.options.clone(),
            previous,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            options: ClientSettings::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint(), "mongodb://127.0.0.1:27017/");
        assert_eq!(settings.database_name(), "default");
        assert_eq!(settings.options(), &ClientSettings::defaults());
    }

    #[test]
    fn test_replace_endpoint() {
        let mut settings = Settings::default();

        let change = settings.replace_endpoint("mongodb://db:27017/").unwrap();
        assert_eq!(change.current, "mongodb://db:27017/");
        assert_eq!(change.previous, DEFAULT_ENDPOINT);

        assert!(settings.replace_endpoint("mongodb://db:27017/").is_none());
        assert!(settings.replace_endpoint("").is_none());
        assert!(settings.replace_endpoint("not a url").is_none());
        assert_eq!(settings.endpoint(), "mongodb://db:27017/");
    }

    #[test]
    fn test_replace_database_name() {
        let mut settings = Settings::default();

        assert!(settings.replace_database_name("").is_none());
        assert!(settings.replace_database_name("   ").is_none());
        assert!(settings.replace_database_name("default").is_none());

        let change = settings.replace_database_name("orders").unwrap();
        assert_eq!(change.previous, "default");
        assert_eq!(settings.database_name(), "orders");
    }

    #[test]
    fn test_replace_options_compares_merged_values() {
        let mut settings = Settings::default();

        // equal to the defaults once merged
        assert!(settings.replace_options(&json!({ "maxPoolSize": 100 })).is_none());

        let change = settings.replace_options(&json!({ "maxPoolSize": 20 })).unwrap();
        assert_eq!(change.previous, ClientSettings::defaults());
        assert_eq!(change.current.get_u64("maxPoolSize"), Some(20));
        assert_eq!(change.current.get_u64("minPoolSize"), Some(5));

        assert!(settings.replace_options(&json!({ "maxPoolSize": 20 })).is_none());
        assert!(settings.replace_options(&json!({})).is_none());
    }

    #[test]
    fn test_replace_options_does_not_accumulate() {
        let mut settings = Settings::default();
        settings.replace_options(&json!({ "appName": "a" })).unwrap();
        settings.replace_options(&json!({ "maxPoolSize": 1 })).unwrap();

        assert_eq!(settings.options().get_str("appName"), None);
        assert_eq!(settings.options().get_u64("maxPoolSize"), Some(1));
    }
}
