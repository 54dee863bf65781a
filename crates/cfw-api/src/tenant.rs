//! Tenant selection from the `X-Tenant-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cfw_core::TenantId;

use crate::error::AppError;
use crate::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The tenant a request acts on. Falls back to the configured default
/// tenant when the header is absent; either must pass the allow-list.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantId);

impl FromRequestParts<AppState> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = match parts.headers.get(TENANT_HEADER) {
            Some(raw) => {
                let text = raw
                    .to_str()
                    .map_err(|_| AppError::BadRequest("X-Tenant-Id must be ASCII".into()))?;
                TenantId::new(text).map_err(|e| AppError::BadRequest(e.to_string()))
            }
            None => state
                .config
                .default_tenant
                .clone()
                .ok_or_else(|| AppError::BadRequest("X-Tenant-Id header is required".into())),
        }?;
        if !state.config.permits(&id) {
            return Err(AppError::Forbidden(format!("tenant {id} is not served here")));
        }
        Ok(Tenant(id))
    }
}
