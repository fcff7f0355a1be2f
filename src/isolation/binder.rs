use serde_json::Value;

/// Capability of a payload that carries a tenant identifier field
pub trait TenantFieldBinding {
    /// Overwrite the tenant identifier. `column` is the configured tenant
    /// column, for payloads that store fields by name.
    fn set_tenant_id(&mut self, column: &str, tenant_id: &str);
}

/// Anything that can travel as the payload of an insert or update.
///
/// Payload types opt into tenant binding by returning themselves from
/// `tenant_binding`. The default is no capability, in which case binding is
/// skipped and only predicate scoping applies.
pub trait MutationPayload {
    fn tenant_binding(&mut self) -> Option<&mut dyn TenantFieldBinding> {
        None
    }
}

/// JSON objects bind the tenant column by key; other JSON values have no tenant field
impl MutationPayload for Value {
    fn tenant_binding(&mut self) -> Option<&mut dyn TenantFieldBinding> {
        if self.is_object() {
            Some(self)
        } else {
            None
        }
    }
}

impl TenantFieldBinding for Value {
    fn set_tenant_id(&mut self, column: &str, tenant_id: &str) {
        if let Some(map) = self.as_object_mut() {
            map.insert(column.to_string(), Value::String(tenant_id.to_string()));
        }
    }
}

/// Forces the request's tenant id onto outgoing payloads
#[derive(Debug, Clone)]
pub struct TenantFieldBinder {
    column: String,
}

impl TenantFieldBinder {
    pub fn new(column: impl Into<String>) -> Self {
        Self { column: column.into() }
    }

    /// Returns `true` when the payload exposed the capability and was bound
    pub fn bind<P: MutationPayload + ?Sized>(&self, payload: &mut P, tenant_id: &str) -> bool {
        match payload.tenant_binding() {
            Some(binding) => {
                binding.set_tenant_id(&self.column, tenant_id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct OrderInput {
        tenant_id: String,
        total: i64,
    }

    impl TenantFieldBinding for OrderInput {
        fn set_tenant_id(&mut self, _column: &str, tenant_id: &str) {
            self.tenant_id = tenant_id.to_string();
        }
    }

    impl MutationPayload for OrderInput {
        fn tenant_binding(&mut self) -> Option<&mut dyn TenantFieldBinding> {
            Some(self)
        }
    }

    struct AuditNote(String);

    impl MutationPayload for AuditNote {}

    #[test]
    fn test_bind_overwrites_spoofed_tenant() {
        let binder = TenantFieldBinder::new("tenant_id");
        let mut input = OrderInput { tenant_id: "t2".to_string(), total: 10 };

        assert!(binder.bind(&mut input, "t1"));
        assert_eq!(input.tenant_id, "t1");
        assert_eq!(input.total, 10);
    }

    #[test]
    fn test_bind_without_capability_is_noop() {
        let binder = TenantFieldBinder::new("tenant_id");
        let mut note = AuditNote("hello".to_string());

        assert!(!binder.bind(&mut note, "t1"));
        assert_eq!(note.0, "hello");
    }

    #[test]
    fn test_bind_json_object_uses_configured_column() {
        let binder = TenantFieldBinder::new("org_id");
        let mut payload = json!({ "org_id": "evil", "name": "x" });

        assert!(binder.bind(&mut payload, "t1"));
        assert_eq!(payload, json!({ "org_id": "t1", "name": "x" }));
    }

    #[test]
    fn test_bind_json_scalar_is_noop() {
        let binder = TenantFieldBinder::new("tenant_id");
        let mut payload = json!([1, 2, 3]);

        assert!(!binder.bind(&mut payload, "t1"));
        assert_eq!(payload, json!([1, 2, 3]));
    }
}
