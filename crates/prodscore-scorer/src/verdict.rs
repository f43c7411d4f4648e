use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON object a scorer returned, after response-shape normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredVerdict {
    fields: Map<String, Value>,
}

impl StructuredVerdict {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up `key` inside the object stored under `group`
    pub fn get_in(&self, group: &str, key: &str) -> Option<&Value> {
        self.fields
            .get(group)
            .and_then(Value::as_object)
            .and_then(|g| g.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}
