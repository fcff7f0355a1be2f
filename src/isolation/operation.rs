use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::OperationKind;

/// Equality condition `[qualifier.]field = value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub field: String,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            qualifier: None,
            field: field.into(),
            value: value.into(),
        }
    }

    /// Condition on a column of a specific resource (used for joined reads)
    pub fn qualified(qualifier: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{} = {}", q, self.field, self.value),
            None => write!(f, "{} = {}", self.field, self.value),
        }
    }
}

/// Description of one intended statement against a named resource.
///
/// Repository code builds one of these per statement, passes it through the
/// scope resolver, and executes only what comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation<P = Value> {
    pub resource: String,
    pub kind: OperationKind,
    /// AND-combined, in caller order
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub joins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
}

impl<P> Operation<P> {
    pub fn new(resource: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            resource: resource.into(),
            kind,
            predicates: Vec::new(),
            joins: Vec::new(),
            payload: None,
        }
    }

    pub fn read(resource: impl Into<String>) -> Self {
        Self::new(resource, OperationKind::Read)
    }

    pub fn insert(resource: impl Into<String>, payload: P) -> Self {
        Self::new(resource, OperationKind::Insert).with_payload(payload)
    }

    pub fn update(resource: impl Into<String>, payload: P) -> Self {
        Self::new(resource, OperationKind::Update).with_payload(payload)
    }

    pub fn delete(resource: impl Into<String>) -> Self {
        Self::new(resource, OperationKind::Delete)
    }

    /// Add `field = value` to the predicate list
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::new(field, value));
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn join(mut self, resource: impl Into<String>) -> Self {
        self.joins.push(resource.into());
        self
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    /// Append a predicate unless an identical one is already present
    pub(crate) fn merge_predicate(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }
}
