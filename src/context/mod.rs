use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client surface a request originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Admin,
    Mobile,
    Api,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Admin => "admin",
            Platform::Mobile => "mobile",
            Platform::Api => "api",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "admin" => Ok(Platform::Admin),
            "mobile" => Ok(Platform::Mobile),
            "api" => Ok(Platform::Api),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}

/// Immutable tenant scope carried through a single request.
///
/// Built by the authentication layer for every inbound request and handed to
/// repository code. The `with_*` methods return a derived copy; the receiver is
/// never modified, so a context can be shared freely between tasks.
///
/// The system-internal flag can only be obtained through [`TenantContext::system`].
/// No derivation sets it, so a request-origin context can never turn into a bypass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<String>,
    tenant_type: Option<i32>,
    platform: Option<Platform>,
    system_internal: bool,
}

impl TenantContext {
    /// Empty request-origin context (no tenant, not internal)
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for trusted background work that skips every isolation rule
    pub fn system() -> Self {
        Self {
            system_internal: true,
            ..Self::default()
        }
    }

    pub fn with_tenant_id(&self, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..self.clone()
        }
    }

    pub fn with_tenant_type(&self, tenant_type: i32) -> Self {
        Self {
            tenant_type: Some(tenant_type),
            ..self.clone()
        }
    }

    pub fn with_platform(&self, platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..self.clone()
        }
    }

    /// Tenant id, or `None` when absent or blank
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn tenant_type(&self) -> Option<i32> {
        self.tenant_type
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn is_system_internal(&self) -> bool {
        self.system_internal
    }
}
