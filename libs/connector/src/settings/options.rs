use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Client options passed through to the driver
///
/// Keys follow the MongoDB connection string option names (`maxPoolSize`,
/// `appName`, ...). The manager never interprets them; drivers pick the keys
/// they understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSettings(Map<String, Value>);

impl ClientSettings {
    /// Baseline options every stored value is merged onto
    ///
    /// - maxPoolSize: 100
    /// - minPoolSize: 5
    /// - connectTimeoutMS: 10000
    /// - serverSelectionTimeoutMS: 30000
    pub fn defaults() -> Self {
        let mut map = Map::new();
        map.insert("maxPoolSize".to_string(), json!(100));
        map.insert("minPoolSize".to_string(), json!(5));
        map.insert("connectTimeoutMS".to_string(), json!(10_000));
        map.insert("serverSelectionTimeoutMS".to_string(), json!(30_000));
        Self(map)
    }

    /// Shallow-merge `overrides` onto the defaults.
    ///
    /// Returns `None` unless `overrides` is a non-empty JSON object.
    pub fn merged(overrides: &Value) -> Option<Self> {
        let provided = overrides.as_object().filter(|map| !map.is_empty())?;

        let mut merged = Self::defaults();
        for (key, value) in provided {
            merged.0.insert(key.clone(), value.clone());
        }
        Some(merged)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::defaults()
    }
}
