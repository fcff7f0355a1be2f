use thiserror::Error;

/// Failures raised while scoping an operation to a tenant.
/// None of these are transient; callers must abort the request, never retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IsolationError {
    #[error("Missing tenant id in request context")]
    MissingTenantId,

    #[error("Isolation resolution failed: {0}")]
    Resolution(String),
}

/// Errors from loading or replacing the policy table
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Resource '{0}' is listed under more than one policy")]
    Conflict(String),

    #[error("Invalid resource name: '{0}'")]
    InvalidResource(String),
}
