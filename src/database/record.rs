use serde_json::{Map, Value};

use crate::isolation::{MutationPayload, TenantFieldBinding};

/// Fields managed by the data layer; API input may not set them
const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at", "trashed_at", "deleted_at"];

/// Errors that can occur while building a record from input
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// Column -> value payload for inserts and updates.
///
/// Exposes the tenant binding capability, so the scope resolver always
/// overwrites whatever tenant value the caller put in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from API input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                if let Some(key) = map.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
                    return Err(RecordError::SystemFieldNotAllowed(key.clone()));
                }
                Ok(Self { fields: map })
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a user field; system fields are ignored
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", key);
            return self;
        }
        self.fields.insert(key, value.into());
        self
    }

    /// Set any field, including system fields
    pub fn set_system_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

impl MutationPayload for Record {
    fn tenant_binding(&mut self) -> Option<&mut dyn TenantFieldBinding> {
        Some(self)
    }
}

impl TenantFieldBinding for Record {
    fn set_tenant_id(&mut self, column: &str, tenant_id: &str) {
        self.set_system_field(column, tenant_id);
    }
}
