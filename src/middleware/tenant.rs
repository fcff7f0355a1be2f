use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::context::{Platform, TenantContext};
use crate::error::ApiError;

/// Verified identity claims, inserted into request extensions by the
/// authentication layer in front of this one
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TenantClaims {
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_type: Option<i32>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl From<&TenantClaims> for TenantContext {
    fn from(claims: &TenantClaims) -> Self {
        let mut ctx = TenantContext::new().with_tenant_id(claims.tenant_id.as_str());
        if let Some(tenant_type) = claims.tenant_type {
            ctx = ctx.with_tenant_type(tenant_type);
        }
        if let Some(platform) = claims.platform {
            ctx = ctx.with_platform(platform);
        }
        ctx
    }
}

/// Middleware that turns verified claims into a typed `TenantContext`.
/// Requests without claims are rejected before reaching any repository.
pub async fn tenant_context_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let claims = request
        .extensions()
        .get::<TenantClaims>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required before tenant scoping"))?;

    let ctx = TenantContext::from(claims);
    if ctx.tenant_id().is_none() {
        tracing::warn!("Rejecting request: authenticated claims carry a blank tenant id");
        return Err(ApiError::forbidden("Tenant context required"));
    }

    tracing::debug!("Tenant context attached: {:?} via {:?}", ctx.tenant_id(), ctx.platform());
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}

/// Handlers take `TenantContext` as an argument; it is only present once the
/// middleware above has run. A system context can never come from a request.
#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Missing tenant context"))?;

        if ctx.is_system_internal() {
            tracing::error!("System context found on an inbound request; rejecting");
            return Err(ApiError::forbidden("Tenant context required"));
        }
        Ok(ctx)
    }
}
