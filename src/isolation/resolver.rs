use once_cell::sync::Lazy;
use std::sync::Arc;

use super::binder::{MutationPayload, TenantFieldBinder};
use super::error::IsolationError;
use super::operation::{Operation, Predicate};
use super::policy::{self, IsolationPolicy, PolicyRegistry, PolicyTable};
use crate::config::AppConfig;
use crate::context::TenantContext;
use crate::types::OperationKind;

pub const DEFAULT_TENANT_COLUMN: &str = "tenant_id";

/// Applies isolation policies to operation descriptors.
///
/// Resolution is a pure transformation: no I/O, no locking, no shared mutable
/// state. Each call reads one registry snapshot, so a concurrent table swap is
/// either fully visible or not visible at all.
#[derive(Clone)]
pub struct ScopeResolver {
    registry: Arc<PolicyRegistry>,
    tenant_column: String,
    binder: TenantFieldBinder,
    audit_bypass: bool,
    warn_unknown_resources: bool,
    log_resolutions: bool,
}

impl ScopeResolver {
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            registry,
            tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
            binder: TenantFieldBinder::new(DEFAULT_TENANT_COLUMN),
            audit_bypass: false,
            warn_unknown_resources: false,
            log_resolutions: false,
        }
    }

    /// Resolver over a private, fixed policy table
    pub fn with_table(table: PolicyTable) -> Self {
        Self::new(Arc::new(PolicyRegistry::new(table)))
    }

    /// Resolver over the global registry, configured from the app config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Arc::clone(policy::registry()))
            .tenant_column(&config.isolation.tenant_column)
            .audit_bypass(config.security.enable_audit_logging)
            .warn_unknown_resources(config.isolation.warn_unknown_resources)
            .log_resolutions(config.isolation.log_resolutions)
    }

    pub fn tenant_column(mut self, column: &str) -> Self {
        self.tenant_column = column.to_string();
        self.binder = TenantFieldBinder::new(column);
        self
    }

    pub fn audit_bypass(mut self, enabled: bool) -> Self {
        self.audit_bypass = enabled;
        self
    }

    pub fn warn_unknown_resources(mut self, enabled: bool) -> Self {
        self.warn_unknown_resources = enabled;
        self
    }

    pub fn log_resolutions(mut self, enabled: bool) -> Self {
        self.log_resolutions = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    pub fn column(&self) -> &str {
        &self.tenant_column
    }

    /// Scope `op` to the tenant in `ctx`.
    ///
    /// Returns the operation that may be executed, or an error after which
    /// nothing may be executed at all.
    pub fn resolve<P: MutationPayload>(
        &self,
        ctx: &TenantContext,
        mut op: Operation<P>,
    ) -> Result<Operation<P>, IsolationError> {
        if ctx.is_system_internal() {
            if self.audit_bypass {
                tracing::info!(
                    "System context bypassing tenant isolation: {} {}",
                    op.kind,
                    op.resource
                );
            }
            return Ok(op);
        }

        let tenant_id = match ctx.tenant_id() {
            Some(id) => id,
            None => {
                tracing::warn!(
                    "Rejected {} on '{}': request context has no tenant id",
                    op.kind,
                    op.resource
                );
                return Err(IsolationError::MissingTenantId);
            }
        };

        let table = self.registry.snapshot();
        let (base, policy) = table.classify(&op.resource, tenant_id);

        // Base names only; partition names carry the raw tenant id
        validate_resource(base)?;
        for join in &op.joins {
            validate_resource(table.classify(join, tenant_id).0)?;
        }

        if self.warn_unknown_resources && !table.is_registered(&op.resource, tenant_id) {
            tracing::warn!("Resource '{}' has no isolation policy, defaulting to {}", base, policy);
        }
        if self.log_resolutions {
            tracing::debug!("Resolving {} on '{}' as {} for tenant {}", op.kind, op.resource, policy, tenant_id);
        }

        match policy {
            IsolationPolicy::Shared => {}
            IsolationPolicy::PhysicalPartition => {
                op.resource = partition_name(tenant_id, base)?;
            }
            IsolationPolicy::LogicalColumn => {
                self.scope_logical(&table, tenant_id, &mut op)?;
            }
        }

        Ok(op)
    }

    fn scope_logical<P: MutationPayload>(
        &self,
        table: &PolicyTable,
        tenant_id: &str,
        op: &mut Operation<P>,
    ) -> Result<(), IsolationError> {
        if op.kind == OperationKind::Read && op.has_joins() {
            // Column names are ambiguous across joined resources, so qualify every scope
            op.merge_predicate(Predicate::qualified(op.resource.clone(), self.tenant_column.clone(), tenant_id));

            let mut joins = Vec::with_capacity(op.joins.len());
            for join in std::mem::take(&mut op.joins) {
                let (join_base, join_policy) = table.classify(&join, tenant_id);
                match join_policy {
                    IsolationPolicy::Shared => joins.push(join),
                    IsolationPolicy::LogicalColumn => {
                        op.merge_predicate(Predicate::qualified(join.clone(), self.tenant_column.clone(), tenant_id));
                        joins.push(join);
                    }
                    IsolationPolicy::PhysicalPartition => {
                        joins.push(partition_name(tenant_id, join_base)?);
                    }
                }
            }
            op.joins = joins;
        } else {
            op.merge_predicate(Predicate::new(self.tenant_column.clone(), tenant_id));
        }

        if let Some(payload) = op.payload.as_mut() {
            if !self.binder.bind(payload, tenant_id) && self.log_resolutions {
                tracing::debug!("Payload for '{}' has no tenant field binding, skipped", op.resource);
            }
        }

        Ok(())
    }
}

/// Per-tenant table name `{tenant_id}_{resource}`
pub fn partition_name(tenant_id: &str, base: &str) -> Result<String, IsolationError> {
    if !tenant_id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(IsolationError::Resolution(format!(
            "tenant id '{}' cannot be used in a partition name",
            tenant_id
        )));
    }
    Ok(format!("{}_{}", tenant_id, base))
}

fn validate_resource(name: &str) -> Result<(), IsolationError> {
    if policy::is_valid_resource_name(name) {
        Ok(())
    } else {
        Err(IsolationError::Resolution(format!("invalid resource name '{}'", name)))
    }
}

// Global resolver over the global registry, configured once from CONFIG
pub static RESOLVER: Lazy<ScopeResolver> = Lazy::new(|| ScopeResolver::from_config(crate::config::config()));

pub fn resolver() -> &'static ScopeResolver {
    &RESOLVER
}

/// Scope an operation with the process-wide resolver
pub fn resolve<P: MutationPayload>(ctx: &TenantContext, op: Operation<P>) -> Result<Operation<P>, IsolationError> {
    resolver().resolve(ctx, op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Platform;
    use serde_json::{json, Value};

    fn resolver() -> ScopeResolver {
        ScopeResolver::with_table(PolicyTable::builtin())
    }

    fn t1() -> TenantContext {
        TenantContext::new().with_tenant_id("t1").with_platform(Platform::Web)
    }

    #[test]
    fn test_plain_read_gets_tenant_predicate() {
        let op: Operation = Operation::read("orders");
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(resolved.resource, "orders");
        assert_eq!(resolved.predicates, vec![Predicate::new("tenant_id", "t1")]);
    }

    #[test]
    fn test_delete_keeps_caller_predicates() {
        let op: Operation = Operation::delete("orders").filter("id", 42);
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(
            resolved.predicates,
            vec![Predicate::new("id", 42), Predicate::new("tenant_id", "t1")]
        );
    }

    #[test]
    fn test_caller_supplied_foreign_tenant_predicate_is_kept_and_anded() {
        // Both conditions must hold, so the foreign tenant matches nothing
        let op: Operation = Operation::delete("orders").filter("tenant_id", "t2");
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(
            resolved.predicates,
            vec![Predicate::new("tenant_id", "t2"), Predicate::new("tenant_id", "t1")]
        );
    }

    #[test]
    fn test_update_binds_payload_over_spoofed_tenant() {
        let op = Operation::update("orders", json!({ "status": "paid", "tenant_id": "t2" })).filter("id", 7);
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(resolved.payload, Some(json!({ "status": "paid", "tenant_id": "t1" })));
        assert_eq!(
            resolved.predicates,
            vec![Predicate::new("id", 7), Predicate::new("tenant_id", "t1")]
        );
    }

    #[test]
    fn test_insert_binds_payload() {
        let op = Operation::insert("products", json!({ "name": "mug" }));
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(resolved.payload, Some(json!({ "name": "mug", "tenant_id": "t1" })));
    }

    #[test]
    fn test_payload_without_capability_still_scoped() {
        let op = Operation::update("orders", Value::String("opaque".into()));
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(resolved.payload, Some(Value::String("opaque".into())));
        assert_eq!(resolved.predicates, vec![Predicate::new("tenant_id", "t1")]);
    }

    #[test]
    fn test_shared_resource_untouched() {
        let op: Operation = Operation::read("users").filter("email", "a@b.c");
        let resolved = resolver().resolve(&t1(), op.clone()).unwrap();
        assert_eq!(resolved, op);
    }

    #[test]
    fn test_physical_partition_renamed_once() {
        let op: Operation = Operation::read("tenant_analytics").filter("day", "2024-01-01");
        let once = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(once.resource, "t1_tenant_analytics");
        assert_eq!(once.predicates, vec![Predicate::new("day", "2024-01-01")]);

        let twice = resolver().resolve(&t1(), once.clone()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_missing_tenant_is_fatal() {
        let op: Operation = Operation::read("orders");
        assert_eq!(
            resolver().resolve(&TenantContext::new(), op.clone()),
            Err(IsolationError::MissingTenantId)
        );
        assert_eq!(
            resolver().resolve(&TenantContext::new().with_tenant_id(""), op),
            Err(IsolationError::MissingTenantId)
        );
    }

    #[test]
    fn test_missing_tenant_is_fatal_even_for_shared() {
        let op: Operation = Operation::read("users");
        assert_eq!(
            resolver().resolve(&TenantContext::new(), op),
            Err(IsolationError::MissingTenantId)
        );
    }

    #[test]
    fn test_system_context_bypasses_everything() {
        let op: Operation = Operation::delete("orders");
        let resolved = resolver().audit_bypass(true).resolve(&TenantContext::system(), op.clone()).unwrap();
        assert_eq!(resolved, op);
        assert!(resolved.predicates.is_empty());
    }

    #[test]
    fn test_joined_read_qualifies_logical_resources_only() {
        let op: Operation = Operation::read("orders")
            .join("order_items")
            .join("users")
            .join("invoices")
            .filter("orders.id", 1);
        let resolved = resolver().resolve(&t1(), op).unwrap();

        assert_eq!(
            resolved.predicates,
            vec![
                Predicate::new("orders.id", 1),
                Predicate::qualified("orders", "tenant_id", "t1"),
                Predicate::qualified("order_items", "tenant_id", "t1"),
                Predicate::qualified("invoices", "tenant_id", "t1"),
            ]
        );
        assert_eq!(resolved.joins, vec!["order_items", "users", "invoices"]);
    }

    #[test]
    fn test_joined_partition_is_renamed() {
        let op: Operation = Operation::read("orders").join("tenant_analytics");
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(resolved.joins, vec!["t1_tenant_analytics"]);
        assert_eq!(resolved.predicates, vec![Predicate::qualified("orders", "tenant_id", "t1")]);

        let again = resolver().resolve(&t1(), resolved.clone()).unwrap();
        assert_eq!(again, resolved);
    }

    #[test]
    fn test_joined_delete_gets_unqualified_tenant_predicate() {
        let op: Operation = Operation::delete("orders").join("order_items").filter("id", 3);
        let resolved = resolver().resolve(&t1(), op).unwrap();
        assert_eq!(
            resolved.predicates,
            vec![Predicate::new("id", 3), Predicate::new("tenant_id", "t1")]
        );
        assert_eq!(resolved.joins, vec!["order_items"]);

        let again = resolver().resolve(&t1(), resolved.clone()).unwrap();
        assert_eq!(again, resolved);
    }

    #[test]
    fn test_partition_for_non_identifier_tenant_resolves_again() {
        for tenant in ["acme-01", "42", "550e8400-e29b-41d4-a716-446655440000"] {
            let ctx = TenantContext::new().with_tenant_id(tenant);
            let op: Operation = Operation::read("tenant_analytics");
            let once = resolver().resolve(&ctx, op).unwrap();
            assert_eq!(once.resource, format!("{}_tenant_analytics", tenant));

            let twice = resolver().resolve(&ctx, once.clone()).unwrap();
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn test_configured_tenant_column() {
        let op: Operation = Operation::read("orders");
        let resolved = resolver().tenant_column("org_id").resolve(&t1(), op).unwrap();
        assert_eq!(resolved.predicates, vec![Predicate::new("org_id", "t1")]);
    }

    #[test]
    fn test_invalid_resource_name_fails_resolution() {
        let op: Operation = Operation::new("orders; drop table x", OperationKind::Read);
        assert!(matches!(
            resolver().resolve(&t1(), op),
            Err(IsolationError::Resolution(_))
        ));
    }

    #[test]
    fn test_partition_name_rejects_unsafe_tenant_id() {
        assert!(partition_name("t1\"", "tenant_analytics").is_err());
        assert_eq!(partition_name("acme-01", "tenant_analytics").unwrap(), "acme-01_tenant_analytics");
    }

    #[test]
    fn test_registry_swap_seen_by_next_resolution() {
        let resolver = resolver();
        resolver
            .registry()
            .replace(PolicyTable::from_entries([("orders", IsolationPolicy::Shared)]).unwrap());

        let op: Operation = Operation::read("orders");
        let resolved = resolver.resolve(&t1(), op).unwrap();
        assert!(resolved.predicates.is_empty());
    }
}
