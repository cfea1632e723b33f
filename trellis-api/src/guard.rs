// Boundary guard for the management API

use crate::error::ApiError;
use crate::settings::ApiKeySettings;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_core::{ManagementError, Result};

/// Route permissions checked before dispatch.
pub mod permissions {
    pub const MANAGE_TENANTS: &str = "ManageTenants";
    pub const MANAGE_FEATURES: &str = "ManageFeatures";
    pub const MANAGE_TENANT_FEATURE_PROFILES: &str = "ManageTenantFeatureProfiles";
    pub const MANAGE_USERS: &str = "ManageUsers";
    pub const MANAGE_ROLES: &str = "ManageRoles";
    pub const MANAGE_APPLICATIONS: &str = "ManageApplications";
    pub const MANAGE_SCOPES: &str = "ManageScopes";
    pub const MANAGE_RECIPES: &str = "ManageRecipes";
    pub const MANAGE_SETTINGS: &str = "ManageSettings";

    /// Grants every permission.
    pub const ALL: &str = "*";
}

/// Who passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    ApiKey(String),
}

pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub struct ManagementGuard {
    keys: Vec<ApiKeySettings>,
    allow_anonymous: bool,
}

impl ManagementGuard {
    pub fn new(keys: Vec<ApiKeySettings>, allow_anonymous: bool) -> Self {
        Self {
            keys,
            allow_anonymous,
        }
    }

    fn find_key(&self, token: &str) -> Option<&ApiKeySettings> {
        let digest = token_digest(token);
        self.keys
            .iter()
            .find(|key| key.sha256.trim().eq_ignore_ascii_case(&digest))
    }

    /// Check the `Authorization` header value against `permission`.
    ///
    /// Without a recognized key the caller is anonymous, which is only
    /// accepted when anonymous management access is enabled.
    pub fn authorize(&self, authorization: Option<&str>, permission: &str) -> Result<Principal> {
        let key = authorization
            .and_then(bearer_token)
            .and_then(|token| self.find_key(token));

        let Some(key) = key else {
            if self.allow_anonymous {
                return Ok(Principal::Anonymous);
            }
            return Err(ManagementError::unauthorized("Authentication is required."));
        };

        let granted = key
            .permissions
            .iter()
            .any(|p| p == permissions::ALL || p.eq_ignore_ascii_case(permission));
        if !granted {
            return Err(ManagementError::forbidden(format!(
                "API key '{}' lacks the '{}' permission.",
                key.name, permission
            )));
        }
        Ok(Principal::ApiKey(key.name.clone()))
    }
}

/// State of the per-route permission middleware.
#[derive(Clone)]
pub struct PermissionGate {
    guard: Arc<ManagementGuard>,
    permission: &'static str,
}

impl PermissionGate {
    pub fn new(guard: Arc<ManagementGuard>, permission: &'static str) -> Self {
        Self { guard, permission }
    }
}

pub async fn require_permission(
    State(gate): State<PermissionGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match gate.guard.authorize(authorization, gate.permission) {
        Ok(principal) => {
            debug!(permission = gate.permission, principal = ?principal, "Management request authorized");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            warn!(
                permission = gate.permission,
                path = %request.uri().path(),
                status = err.status_code(),
                "Management request rejected"
            );
            ApiError(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, token: &str, permissions: &[&str]) -> ApiKeySettings {
        ApiKeySettings {
            name: name.into(),
            sha256: token_digest(token),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn guard(allow_anonymous: bool) -> ManagementGuard {
        ManagementGuard::new(
            vec![
                key("ops", "ops-token", &[permissions::ALL]),
                key("support", "support-token", &[permissions::MANAGE_USERS]),
            ],
            allow_anonymous,
        )
    }

    #[test]
    fn test_token_digest() {
        assert_eq!(
            token_digest("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_wildcard_key_is_granted_everything() {
        let guard = guard(false);
        let principal = guard
            .authorize(Some("Bearer ops-token"), permissions::MANAGE_TENANTS)
            .unwrap();
        assert_eq!(principal, Principal::ApiKey("ops".into()));
    }

    #[test]
    fn test_missing_permission_is_forbidden() {
        let guard = guard(false);
        assert!(guard
            .authorize(Some("Bearer support-token"), permissions::MANAGE_USERS)
            .is_ok());

        let err = guard
            .authorize(Some("Bearer support-token"), permissions::MANAGE_TENANTS)
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_anonymous_access_is_denied_by_default() {
        let err = guard(false)
            .authorize(None, permissions::MANAGE_USERS)
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = guard(false)
            .authorize(Some("Bearer unknown"), permissions::MANAGE_USERS)
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_anonymous_access_when_enabled() {
        let principal = guard(true).authorize(None, permissions::MANAGE_TENANTS).unwrap();
        assert_eq!(principal, Principal::Anonymous);

        // a known key keeps its own restrictions
        let err = guard(true)
            .authorize(Some("Bearer support-token"), permissions::MANAGE_TENANTS)
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
