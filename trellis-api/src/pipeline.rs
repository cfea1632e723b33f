// Tenant pipeline: admin path blocking, caller resolution, prefix stripping

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{Uri, header::HOST, request::Parts, uri::PathAndQuery},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use trellis_core::{ManagementError, Result};
use trellis_tenancy::{ResolvedCaller, Tenant};

const ADMIN_PATH: &str = "/Admin";

/// True when `path` is `base` or below it, compared case-insensitively.
fn is_under(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return false;
    }
    match path.get(..base.len()) {
        Some(head) if head.eq_ignore_ascii_case(base) => {
            matches!(path.as_bytes().get(base.len()), None | Some(b'/'))
        }
        _ => false,
    }
}

pub fn is_admin_path(path: &str, admin_base_path: &str) -> bool {
    is_under(path, ADMIN_PATH) || is_under(path, admin_base_path)
}

/// `uri` without its first path segment, query preserved.
fn strip_prefix(uri: &Uri, prefix: &str) -> Result<Uri> {
    let path = uri.path();
    let rest = path
        .strip_prefix('/')
        .and_then(|p| p.get(prefix.len()..))
        .unwrap_or_default();
    let rest = if rest.is_empty() { "/" } else { rest };

    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| ManagementError::problem(format!("Invalid request path: {}", e)))?,
    );
    Uri::from_parts(parts).map_err(|e| ManagementError::problem(format!("Invalid request uri: {}", e)))
}

fn not_found() -> Response {
    ApiError(ManagementError::not_found("Not found.")).into_response()
}

pub async fn tenant_pipeline(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = &state.settings;
    let path = request.uri().path().to_string();

    if settings.disable_admin_path_access && is_admin_path(&path, &settings.admin_base_path) {
        warn!(path = %path, "Admin path access is disabled");
        return not_found();
    }

    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let caller = match state.resolver.resolve(host.as_deref(), &path) {
        Ok(caller) => caller,
        Err(err) => {
            debug!(path = %path, error = %err, "Caller tenant rejected");
            return ApiError(err).into_response();
        }
    };

    if let Some(prefix) = &caller.prefix {
        match strip_prefix(request.uri(), prefix) {
            Ok(uri) => {
                if settings.disable_admin_path_access
                    && is_admin_path(uri.path(), &settings.admin_base_path)
                {
                    warn!(path = %path, tenant = %caller.tenant.name, "Admin path access is disabled");
                    return not_found();
                }
                *request.uri_mut() = uri;
            }
            Err(err) => return ApiError(err).into_response(),
        }
    }

    debug!(tenant = %caller.tenant.name, path = %path, "Caller tenant resolved");
    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// The tenant the request was addressed to.
pub struct Caller(pub Tenant);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedCaller>()
            .map(|resolved| Caller(resolved.tenant.clone()))
            .ok_or_else(|| ApiError(ManagementError::problem("Caller tenant was not resolved.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_paths() {
        assert!(is_admin_path("/Admin", "/Admin"));
        assert!(is_admin_path("/admin/users", "/Admin"));
        assert!(is_admin_path("/backoffice/x", "/backoffice"));
        assert!(is_admin_path("/Admin", "/backoffice"));
        assert!(!is_admin_path("/Administrator", "/Admin"));
        assert!(!is_admin_path("/api/management/tenants", "/Admin"));
    }

    #[test]
    fn test_strip_prefix_keeps_query() {
        let uri: Uri = "/acme/api/management/users?tenant=acme".parse().unwrap();
        let stripped = strip_prefix(&uri, "acme").unwrap();
        assert_eq!(stripped.path(), "/api/management/users");
        assert_eq!(stripped.query(), Some("tenant=acme"));

        let uri: Uri = "/acme".parse().unwrap();
        assert_eq!(strip_prefix(&uri, "acme").unwrap().path(), "/");
    }
}
