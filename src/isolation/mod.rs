//! Tenant isolation engine.
//!
//! Repository code describes each statement as an [`Operation`] and passes it
//! through [`ScopeResolver::resolve`] together with the request's
//! [`TenantContext`](crate::context::TenantContext). Only the returned operation
//! may be executed; an error means the statement must not run at all.

pub mod binder;
pub mod error;
pub mod operation;
pub mod policy;
pub mod resolver;

pub use binder::{MutationPayload, TenantFieldBinder, TenantFieldBinding};
pub use error::{IsolationError, PolicyError};
pub use operation::{Operation, Predicate};
pub use policy::{registry, IsolationPolicy, PolicyRegistry, PolicyTable};
pub use resolver::{resolve, resolver, ScopeResolver, DEFAULT_TENANT_COLUMN};
