#![allow(dead_code)]

use tenant_scope::isolation::{PolicyTable, ScopeResolver};
use tenant_scope::TenantContext;

/// Resolver over a private copy of the built-in table, so tests never race on the global registry
pub fn resolver() -> ScopeResolver {
    ScopeResolver::with_table(PolicyTable::builtin())
}

pub fn tenant(id: &str) -> TenantContext {
    TenantContext::new().with_tenant_id(id)
}

/// One resource per policy in the built-in table, plus one unregistered name
pub const RESOURCES: &[&str] = &["orders", "users", "tenant_analytics", "invoices"];

/// Tenant id shapes seen in practice: plain, hyphenated, leading digit, UUID
pub const TENANTS: &[&str] = &["t1", "acme-01", "42", "550e8400-e29b-41d4-a716-446655440000"];
