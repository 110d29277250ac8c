use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use log::*;

pub(crate) const TENANT_HEADER: &str = "x-tenant-id";
pub(crate) const USER_HEADER: &str = "x-user-id";

/// Identity resolved by the upstream gateway.
///
/// Authentication happens before requests reach this service; the gateway
/// forwards the tenant (required) and user (optional) as headers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TenantContext {
    pub tenant_id: String,
    pub user_id: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_value(&parts.headers, TENANT_HEADER).ok_or_else(|| {
            debug!("Rejecting request without a {TENANT_HEADER} header");
            (
                StatusCode::BAD_REQUEST,
                format!("Missing {TENANT_HEADER} header"),
            )
        })?;

        Ok(TenantContext {
            tenant_id,
            user_id: header_value(&parts.headers, USER_HEADER),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
