use serde_json::Value;

use super::manager::DatabaseError;
use super::record::Record;
use crate::isolation::{Operation, Predicate};
use crate::types::OperationKind;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Payloads that can be written as a row
pub trait ColumnValues {
    fn column_values(&self) -> Vec<(String, Value)>;
}

impl ColumnValues for Value {
    fn column_values(&self) -> Vec<(String, Value)> {
        match self {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => vec![],
        }
    }
}

impl ColumnValues for Record {
    fn column_values(&self) -> Vec<(String, Value)> {
        self.fields().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Renders a (resolved) operation into parameterised PostgreSQL.
///
/// The renderer trusts the operation it is given: it must already have been
/// through the scope resolver.
pub struct Statement {
    params: Vec<Value>,
}

impl Statement {
    pub fn render<P: ColumnValues>(op: &Operation<P>) -> Result<SqlResult, DatabaseError> {
        let mut statement = Self { params: vec![] };
        let query = match op.kind {
            OperationKind::Read => statement.select(op),
            OperationKind::Insert => statement.insert(op)?,
            OperationKind::Update => statement.update(op)?,
            OperationKind::Delete => statement.delete(op)?,
        };
        Ok(SqlResult { query, params: statement.params })
    }

    fn select<P>(&mut self, op: &Operation<P>) -> String {
        let from = std::iter::once(&op.resource)
            .chain(op.joins.iter())
            .map(|r| quote_ident(r))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = self.where_clause(&op.predicates);
        [format!("SELECT * FROM {}", from), where_clause]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn insert<P: ColumnValues>(&mut self, op: &Operation<P>) -> Result<String, DatabaseError> {
        let values = Self::payload_values(op)?;
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(quote_ident(&column));
            placeholders.push(self.param(value));
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_ident(&op.resource),
            columns.join(", "),
            placeholders.join(", ")
        ))
    }

    fn update<P: ColumnValues>(&mut self, op: &Operation<P>) -> Result<String, DatabaseError> {
        Self::reject_joins(op)?;
        let values = Self::payload_values(op)?;
        let assignments = values
            .into_iter()
            .map(|(column, value)| format!("{} = {}", quote_ident(&column), self.param(value)))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = self.where_clause(&op.predicates);
        if where_clause.is_empty() {
            tracing::warn!("Rendering UPDATE on '{}' without predicates", op.resource);
        }
        Ok([format!("UPDATE {} SET {}", quote_ident(&op.resource), assignments), where_clause]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn delete<P>(&mut self, op: &Operation<P>) -> Result<String, DatabaseError> {
        Self::reject_joins(op)?;
        let where_clause = self.where_clause(&op.predicates);
        if where_clause.is_empty() {
            tracing::warn!("Rendering DELETE on '{}' without predicates", op.resource);
        }
        Ok([format!("DELETE FROM {}", quote_ident(&op.resource)), where_clause]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn where_clause(&mut self, predicates: &[Predicate]) -> String {
        if predicates.is_empty() {
            return String::new();
        }
        let conditions = predicates
            .iter()
            .map(|p| self.condition(p))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("WHERE {}", conditions)
    }

    fn condition(&mut self, predicate: &Predicate) -> String {
        let column = match &predicate.qualifier {
            Some(q) => format!("{}.{}", quote_ident(q), quote_ident(&predicate.field)),
            None => quote_path(&predicate.field),
        };
        if predicate.value.is_null() {
            format!("{} IS NULL", column)
        } else {
            format!("{} = {}", column, self.param(predicate.value.clone()))
        }
    }

    fn payload_values<P: ColumnValues>(op: &Operation<P>) -> Result<Vec<(String, Value)>, DatabaseError> {
        let values = op.payload.as_ref().map(|p| p.column_values()).unwrap_or_default();
        if values.is_empty() {
            return Err(DatabaseError::QueryError(format!(
                "{} on '{}' requires a non-empty payload",
                op.kind, op.resource
            )));
        }
        Ok(values)
    }

    fn reject_joins<P>(op: &Operation<P>) -> Result<(), DatabaseError> {
        if op.has_joins() {
            return Err(DatabaseError::QueryError(format!(
                "{} on '{}' cannot join other resources",
                op.kind, op.resource
            )));
        }
        Ok(())
    }

    fn param(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly dotted `table.column` reference
fn quote_path(path: &str) -> String {
    path.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}
