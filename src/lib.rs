pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod isolation;
pub mod middleware;
pub mod types;

pub use context::{Platform, TenantContext};
pub use isolation::{resolve, IsolationError, IsolationPolicy, Operation, Predicate, ScopeResolver};
pub use types::OperationKind;
