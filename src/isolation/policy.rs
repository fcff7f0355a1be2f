use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::error::PolicyError;

/// Strategy used to keep one tenant's rows away from another's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPolicy {
    /// Global resource, never filtered
    Shared,
    /// Rows carry a tenant column that every statement is filtered on
    LogicalColumn,
    /// Each tenant owns a dedicated `{tenant}_{resource}` table
    PhysicalPartition,
}

impl IsolationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationPolicy::Shared => "shared",
            IsolationPolicy::LogicalColumn => "logical_column",
            IsolationPolicy::PhysicalPartition => "physical_partition",
        }
    }
}

impl fmt::Display for IsolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(IsolationPolicy::Shared),
            "logical_column" | "logical" => Ok(IsolationPolicy::LogicalColumn),
            "physical_partition" | "physical" => Ok(IsolationPolicy::PhysicalPartition),
            other => Err(format!("Unknown isolation policy: {}", other)),
        }
    }
}

/// Resources that are global to the platform
const DEFAULT_SHARED: &[&str] = &[
    "users",
    "tenants",
    "platforms",
    "plans",
    "templates",
    "system_settings",
];

/// Resources stored in per-tenant tables
const DEFAULT_PHYSICAL: &[&str] = &["tenant_analytics", "tenant_audit_logs"];

/// Resources filtered on the tenant column. Anything unlisted is treated the same way.
const DEFAULT_LOGICAL: &[&str] = &[
    "orders",
    "order_items",
    "products",
    "payments",
    "refunds",
    "sites",
    "pages",
    "members",
    "roles",
];

/// On-disk shape of the policy table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    #[serde(default)]
    pub shared: Vec<String>,
    #[serde(default)]
    pub logical_column: Vec<String>,
    #[serde(default)]
    pub physical_partition: Vec<String>,
}

/// Immutable resource -> policy mapping.
/// Never mutated once built; runtime changes go through [`PolicyRegistry::replace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    entries: HashMap<String, IsolationPolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table used when no policy file is configured
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for name in DEFAULT_SHARED {
            entries.insert(name.to_string(), IsolationPolicy::Shared);
        }
        for name in DEFAULT_PHYSICAL {
            entries.insert(name.to_string(), IsolationPolicy::PhysicalPartition);
        }
        for name in DEFAULT_LOGICAL {
            entries.insert(name.to_string(), IsolationPolicy::LogicalColumn);
        }
        Self { entries }
    }

    /// Build from `(resource, policy)` pairs, rejecting duplicates and bad names
    pub fn from_entries<I, S>(entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (S, IsolationPolicy)>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        for (name, policy) in entries {
            let name = name.into();
            if !is_valid_resource_name(&name) {
                return Err(PolicyError::InvalidResource(name));
            }
            if map.insert(name.clone(), policy).is_some() {
                return Err(PolicyError::Conflict(name));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn from_file(file: PolicyFile) -> Result<Self, PolicyError> {
        let entries = file
            .shared
            .into_iter()
            .map(|name| (name, IsolationPolicy::Shared))
            .chain(file.logical_column.into_iter().map(|name| (name, IsolationPolicy::LogicalColumn)))
            .chain(file.physical_partition.into_iter().map(|name| (name, IsolationPolicy::PhysicalPartition)));
        Self::from_entries(entries)
    }

    pub fn from_yaml(source: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(source)?;
        Self::from_file(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    /// Copy of this table with one entry added or changed
    pub fn with_policy(&self, resource: impl Into<String>, policy: IsolationPolicy) -> Result<Self, PolicyError> {
        let resource = resource.into();
        if !is_valid_resource_name(&resource) {
            return Err(PolicyError::InvalidResource(resource));
        }
        let mut entries = self.entries.clone();
        entries.insert(resource, policy);
        Ok(Self { entries })
    }

    /// Explicitly registered policy, if any
    pub fn get(&self, resource: &str) -> Option<IsolationPolicy> {
        self.entries.get(resource).copied()
    }

    /// Policy for a resource; unregistered names are LogicalColumn
    pub fn policy(&self, resource: &str) -> IsolationPolicy {
        self.get(resource).unwrap_or(IsolationPolicy::LogicalColumn)
    }

    /// Base resource name and policy, seen from a tenant's point of view.
    ///
    /// The exact name wins when it is registered. Otherwise a leading
    /// `"{tenant_id}_"` prefix is stripped, so a name that was already rewritten
    /// for a partition classifies the same as the original. Checking the exact
    /// name first means a registered resource that happens to start with the
    /// tenant id (tenant `tenant`, resource `tenant_analytics`) is never stripped.
    pub fn classify<'a>(&self, resource: &'a str, tenant_id: &str) -> (&'a str, IsolationPolicy) {
        if let Some(policy) = self.get(resource) {
            return (resource, policy);
        }
        let base = strip_tenant_prefix(resource, tenant_id);
        (base, self.policy(base))
    }

    pub fn is_registered(&self, resource: &str, tenant_id: &str) -> bool {
        self.get(resource).is_some() || self.get(strip_tenant_prefix(resource, tenant_id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by resource name
    pub fn sorted(&self) -> BTreeMap<&str, IsolationPolicy> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }
}

/// Process-wide policy registry.
///
/// Readers take a snapshot (`Arc<PolicyTable>`) without locking. Writers build a
/// complete new table and swap it in, so no reader ever sees a half-applied change.
pub struct PolicyRegistry {
    table: ArcSwap<PolicyTable>,
}

impl PolicyRegistry {
    pub fn new(table: PolicyTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn snapshot(&self) -> Arc<PolicyTable> {
        self.table.load_full()
    }

    /// Atomically replace the whole table
    pub fn replace(&self, table: PolicyTable) {
        tracing::info!("Replacing isolation policy table ({} resources)", table.len());
        self.table.store(Arc::new(table));
    }

    /// Copy-on-write update of a single entry
    pub fn update(&self, resource: &str, policy: IsolationPolicy) -> Result<(), PolicyError> {
        let mut result = Ok(());
        self.table.rcu(|current| match current.with_policy(resource, policy) {
            Ok(next) => Arc::new(next),
            Err(e) => {
                result = Err(e);
                Arc::clone(current)
            }
        });
        if result.is_ok() {
            tracing::info!("Isolation policy for '{}' set to {}", resource, policy);
        }
        result
    }

    pub fn policy(&self, resource: &str) -> IsolationPolicy {
        self.table.load().policy(resource)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new(PolicyTable::builtin())
    }
}

// Global registry - built-in defaults until startup code installs the configured table
pub static REGISTRY: Lazy<Arc<PolicyRegistry>> = Lazy::new(|| Arc::new(PolicyRegistry::default()));

pub fn registry() -> &'static Arc<PolicyRegistry> {
    &REGISTRY
}

/// Load the configured policy table (or the built-in one) into the global registry
pub fn install_from_config(config: &crate::config::IsolationConfig) -> Result<(), PolicyError> {
    let table = match &config.policy_file {
        Some(path) => {
            let table = PolicyTable::load(path)?;
            tracing::info!("Loaded {} isolation policies from {}", table.len(), path.display());
            table
        }
        None => PolicyTable::builtin(),
    };
    registry().replace(table);
    Ok(())
}

pub fn strip_tenant_prefix<'a>(resource: &'a str, tenant_id: &str) -> &'a str {
    if tenant_id.is_empty() {
        return resource;
    }
    resource
        .strip_prefix(tenant_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(resource)
}

pub(crate) fn is_valid_resource_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = PolicyTable::builtin();
        assert_eq!(table.policy("orders"), IsolationPolicy::LogicalColumn);
        assert_eq!(table.policy("users"), IsolationPolicy::Shared);
        assert_eq!(table.policy("tenant_analytics"), IsolationPolicy::PhysicalPartition);
    }

    #[test]
    fn test_unknown_resource_defaults_to_logical_column() {
        let table = PolicyTable::new();
        assert_eq!(table.policy("invoices"), IsolationPolicy::LogicalColumn);
        assert_eq!(table.get("invoices"), None);
    }

    #[test]
    fn test_classify_strips_tenant_prefix() {
        let table = PolicyTable::builtin();
        assert_eq!(
            table.classify("t1_tenant_analytics", "t1"),
            ("tenant_analytics", IsolationPolicy::PhysicalPartition)
        );
        assert_eq!(table.classify("t1_users", "t1"), ("users", IsolationPolicy::Shared));
        // Another tenant's prefix is not stripped
        assert_eq!(
            table.classify("t2_tenant_analytics", "t1"),
            ("t2_tenant_analytics", IsolationPolicy::LogicalColumn)
        );
    }

    #[test]
    fn test_classify_prefers_exact_match() {
        // Tenant id "tenant" must not turn "tenant_analytics" into "analytics"
        let table = PolicyTable::builtin();
        assert_eq!(
            table.classify("tenant_analytics", "tenant"),
            ("tenant_analytics", IsolationPolicy::PhysicalPartition)
        );
    }

    #[test]
    fn test_strip_tenant_prefix_edges() {
        assert_eq!(strip_tenant_prefix("t1_", "t1"), "t1_");
        assert_eq!(strip_tenant_prefix("t1orders", "t1"), "t1orders");
        assert_eq!(strip_tenant_prefix("orders", ""), "orders");
    }

    #[test]
    fn test_from_yaml() {
        let yaml = "shared: [users]\nlogical_column: [orders]\nphysical_partition: [tenant_analytics]\n";
        let table = PolicyTable::from_yaml(yaml).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.policy("users"), IsolationPolicy::Shared);
        assert_eq!(table.policy("tenant_analytics"), IsolationPolicy::PhysicalPartition);
    }

    #[test]
    fn test_duplicate_resource_is_conflict() {
        let yaml = "shared: [orders]\nlogical_column: [orders]\n";
        match PolicyTable::from_yaml(yaml) {
            Err(PolicyError::Conflict(name)) => assert_eq!(name, "orders"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_resource_name_rejected() {
        let result = PolicyTable::from_entries([("orders; drop", IsolationPolicy::Shared)]);
        assert!(matches!(result, Err(PolicyError::InvalidResource(_))));
    }

    #[test]
    fn test_registry_replace_is_whole_table() {
        let registry = PolicyRegistry::default();
        let before = registry.snapshot();

        registry.replace(PolicyTable::from_entries([("orders", IsolationPolicy::Shared)]).unwrap());

        // Old snapshot is untouched
        assert_eq!(before.policy("orders"), IsolationPolicy::LogicalColumn);
        assert_eq!(before.policy("users"), IsolationPolicy::Shared);
        // New table replaces everything
        assert_eq!(registry.policy("orders"), IsolationPolicy::Shared);
        assert_eq!(registry.policy("users"), IsolationPolicy::LogicalColumn);
    }

    #[test]
    fn test_registry_update_single_entry() {
        let registry = PolicyRegistry::default();
        registry.update("invoices", IsolationPolicy::PhysicalPartition).unwrap();
        assert_eq!(registry.policy("invoices"), IsolationPolicy::PhysicalPartition);
        assert_eq!(registry.policy("users"), IsolationPolicy::Shared);

        assert!(registry.update("", IsolationPolicy::Shared).is_err());
    }
}
