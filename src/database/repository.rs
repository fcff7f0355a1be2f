use serde_json::Value;
use sqlx::{self, postgres::{PgArguments, PgRow}, PgPool};

use super::manager::DatabaseError;
use super::statement::{ColumnValues, SqlResult, Statement};
use crate::context::TenantContext;
use crate::isolation::{MutationPayload, Operation, ScopeResolver};

/// Data access that can only issue tenant-scoped statements.
///
/// Every call resolves the operation against the request context first and
/// returns before touching the pool when resolution fails.
pub struct ScopedRepository {
    pool: PgPool,
    resolver: ScopeResolver,
    query_logging: bool,
}

impl ScopedRepository {
    pub fn new(pool: PgPool, resolver: ScopeResolver) -> Self {
        Self {
            pool,
            resolver,
            query_logging: false,
        }
    }

    /// Repository over the global resolver and config
    pub fn from_config(pool: PgPool) -> Self {
        let config = crate::config::config();
        Self {
            pool,
            resolver: ScopeResolver::from_config(config),
            query_logging: config.database.enable_query_logging,
        }
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Resolve and render without executing
    pub fn prepare<P>(&self, ctx: &TenantContext, op: Operation<P>) -> Result<SqlResult, DatabaseError>
    where
        P: MutationPayload + ColumnValues,
    {
        let scoped = self.resolver.resolve(ctx, op)?;
        let sql = Statement::render(&scoped)?;
        if self.query_logging {
            tracing::debug!("SQL: {} ({} params)", sql.query, sql.params.len());
        }
        Ok(sql)
    }

    /// Run an insert, update or delete; returns rows affected
    pub async fn execute<P>(&self, ctx: &TenantContext, op: Operation<P>) -> Result<u64, DatabaseError>
    where
        P: MutationPayload + ColumnValues,
    {
        let sql = self.prepare(ctx, op)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Run a statement and return its rows
    pub async fn fetch_all<P>(&self, ctx: &TenantContext, op: Operation<P>) -> Result<Vec<PgRow>, DatabaseError>
    where
        P: MutationPayload + ColumnValues,
    {
        let sql = self.prepare(ctx, op)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays and objects go over the wire as JSONB
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v)),
    }
}
