// OpenId application management

use crate::store::{ClientType, ConsentType, OpenIdApplication, OpenIdStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use trellis_core::names::{is_remove_operation, non_blank, normalize_names};
use trellis_core::{ManagementError, Result};
use url::Url;
use uuid::Uuid;

/// Permission prefix marking a scope grant.
pub const SCOPE_PERMISSION_PREFIX: &str = "scp:";

/// Hash a client secret for storage.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trimmed, de-duplicated absolute URIs, or `invalidUris` listing the rest.
pub fn normalize_absolute_uris(uris: &[String], message: &str) -> Result<Vec<String>> {
    let uris = normalize_names(uris);
    let invalid: Vec<&String> = uris.iter().filter(|u| Url::parse(u).is_err()).collect();
    if invalid.is_empty() {
        Ok(uris)
    } else {
        Err(ManagementError::invalid(message).with_detail("invalidUris", invalid))
    }
}

fn is_scope_permission(permission: &str) -> bool {
    permission
        .get(..SCOPE_PERMISSION_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SCOPE_PERMISSION_PREFIX))
}

fn scope_names(permissions: &[String]) -> Vec<String> {
    permissions
        .iter()
        .filter(|p| is_scope_permission(p))
        .map(|p| p[SCOPE_PERMISSION_PREFIX.len()..].to_string())
        .collect()
}

fn plain_permissions(permissions: &[String]) -> Vec<String> {
    permissions
        .iter()
        .filter(|p| !is_scope_permission(p))
        .cloned()
        .collect()
}

fn combine_permissions(plain: Vec<String>, scopes: &[String]) -> Vec<String> {
    let mut permissions = plain;
    permissions.extend(
        scopes
            .iter()
            .map(|s| format!("{}{}", SCOPE_PERMISSION_PREFIX, s)),
    );
    permissions
}

fn check_secret_rule(application: &OpenIdApplication) -> Result<()> {
    match (application.client_type, &application.client_secret_hash) {
        (ClientType::Public, Some(_)) => Err(ManagementError::invalid(
            "Public clients cannot have a client secret.",
        )),
        (ClientType::Confidential, None) => Err(ManagementError::invalid(
            "ClientSecret is required for confidential clients.",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationItem {
    pub id: String,
    pub client_id: String,
    pub display_name: String,
    pub client_type: ClientType,
    pub consent_type: ConsentType,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub scope_names: Vec<String>,
    pub permission_names: Vec<String>,
    pub role_names: Vec<String>,
    pub requirements: Vec<String>,
}

impl From<OpenIdApplication> for ApplicationItem {
    fn from(application: OpenIdApplication) -> Self {
        Self {
            scope_names: scope_names(&application.permissions),
            permission_names: plain_permissions(&application.permissions),
            id: application.id,
            client_id: application.client_id,
            display_name: application.display_name,
            client_type: application.client_type,
            consent_type: application.consent_type,
            redirect_uris: application.redirect_uris,
            post_logout_redirect_uris: application.post_logout_redirect_uris,
            role_names: application.roles,
            requirements: application.requirements,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateApplicationRequest {
    pub client_id: String,
    pub display_name: String,
    pub client_type: Option<String>,
    pub consent_type: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub scope_names: Vec<String>,
    pub permission_names: Vec<String>,
    pub role_names: Vec<String>,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchApplicationRequest {
    pub client_id: Option<String>,
    pub display_name: Option<String>,
    pub client_type: Option<String>,
    pub consent_type: Option<String>,
    /// Blank clears the stored secret.
    pub client_secret: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub post_logout_redirect_uris: Option<Vec<String>>,
    pub scope_names: Option<Vec<String>>,
    pub permission_names: Option<Vec<String>>,
    pub role_names: Option<Vec<String>>,
    pub requirements: Option<Vec<String>>,
    pub operation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationPatchOutcome {
    Updated(ApplicationItem),
    Removed(String),
}

fn parse_or_default<T: Default>(
    value: Option<&str>,
    parse: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    match non_blank(value) {
        Some(value) => parse(&value),
        None => Ok(T::default()),
    }
}

pub struct ApplicationService {
    store: Arc<dyn OpenIdStore>,
}

impl ApplicationService {
    pub fn new(store: Arc<dyn OpenIdStore>) -> Self {
        Self { store }
    }

    async fn ensure_unique_client_id(&self, client_id: &str, own_id: Option<&str>) -> Result<()> {
        let taken = self
            .store
            .applications()
            .await?
            .into_iter()
            .any(|a| a.client_id.eq_ignore_ascii_case(client_id) && Some(a.id.as_str()) != own_id);
        if taken {
            return Err(ManagementError::conflict(format!(
                "Application '{}' already exists.",
                client_id
            )));
        }
        Ok(())
    }

    /// Ordered by display name, then client id.
    pub async fn list(&self) -> Result<Vec<ApplicationItem>> {
        let mut applications = self.store.applications().await?;
        applications.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.client_id.to_lowercase().cmp(&b.client_id.to_lowercase()))
        });
        Ok(applications.into_iter().map(ApplicationItem::from).collect())
    }

    pub async fn create(&self, request: CreateApplicationRequest) -> Result<ApplicationItem> {
        let (Some(client_id), Some(display_name)) = (
            non_blank(Some(request.client_id.as_str())),
            non_blank(Some(request.display_name.as_str())),
        ) else {
            return Err(ManagementError::invalid(
                "ClientId and DisplayName are required.",
            ));
        };

        let application = OpenIdApplication {
            id: Uuid::new_v4().simple().to_string(),
            client_type: parse_or_default(request.client_type.as_deref(), ClientType::parse)?,
            consent_type: parse_or_default(request.consent_type.as_deref(), ConsentType::parse)?,
            client_secret_hash: non_blank(request.client_secret.as_deref())
                .map(|s| hash_secret(&s)),
            redirect_uris: normalize_absolute_uris(
                &request.redirect_uris,
                "Invalid redirect URIs detected.",
            )?,
            post_logout_redirect_uris: normalize_absolute_uris(
                &request.post_logout_redirect_uris,
                "Invalid post logout redirect URIs detected.",
            )?,
            permissions: combine_permissions(
                plain_permissions(&normalize_names(&request.permission_names)),
                &normalize_names(&request.scope_names),
            ),
            roles: normalize_names(&request.role_names),
            requirements: normalize_names(&request.requirements),
            client_id,
            display_name,
        };
        check_secret_rule(&application)?;
        self.ensure_unique_client_id(&application.client_id, None)
            .await?;

        self.store.save_application(application.clone()).await?;
        info!(client_id = %application.client_id, "OpenId application created");
        Ok(application.into())
    }

    pub async fn patch(
        &self,
        id: &str,
        request: PatchApplicationRequest,
    ) -> Result<ApplicationPatchOutcome> {
        let current = self.store.find_application(id).await?.ok_or_else(|| {
            ManagementError::not_found(format!("Application '{}' was not found.", id))
        })?;

        if is_remove_operation(request.operation.as_deref())? {
            self.store.delete_application(&current.id).await?;
            info!(client_id = %current.client_id, "OpenId application removed");
            return Ok(ApplicationPatchOutcome::Removed(current.id));
        }

        let mut draft = current.clone();
        if let Some(client_id) = &request.client_id {
            draft.client_id = non_blank(Some(client_id.as_str()))
                .ok_or_else(|| ManagementError::invalid("ClientId cannot be empty."))?;
        }
        if let Some(display_name) = &request.display_name {
            draft.display_name = non_blank(Some(display_name.as_str()))
                .ok_or_else(|| ManagementError::invalid("DisplayName cannot be empty."))?;
        }
        if let Some(client_type) = &request.client_type {
            draft.client_type = ClientType::parse(client_type)?;
        }
        if let Some(consent_type) = &request.consent_type {
            draft.consent_type = ConsentType::parse(consent_type)?;
        }
        if let Some(secret) = &request.client_secret {
            draft.client_secret_hash = non_blank(Some(secret.as_str())).map(|s| hash_secret(&s));
        }
        if let Some(uris) = &request.redirect_uris {
            draft.redirect_uris = normalize_absolute_uris(uris, "Invalid redirect URIs detected.")?;
        }
        if let Some(uris) = &request.post_logout_redirect_uris {
            draft.post_logout_redirect_uris =
                normalize_absolute_uris(uris, "Invalid post logout redirect URIs detected.")?;
        }
        if request.permission_names.is_some() || request.scope_names.is_some() {
            let plain = match &request.permission_names {
                Some(names) => plain_permissions(&normalize_names(names)),
                None => plain_permissions(&current.permissions),
            };
            let scopes = match &request.scope_names {
                Some(names) => normalize_names(names),
                None => scope_names(&current.permissions),
            };
            draft.permissions = combine_permissions(plain, &scopes);
        }
        if let Some(roles) = &request.role_names {
            draft.roles = normalize_names(roles);
        }
        if let Some(requirements) = &request.requirements {
            draft.requirements = normalize_names(requirements);
        }

        check_secret_rule(&draft)?;
        if !draft.client_id.eq_ignore_ascii_case(&current.client_id) {
            self.ensure_unique_client_id(&draft.client_id, Some(&current.id))
                .await?;
        }

        self.store.save_application(draft.clone()).await?;
        info!(client_id = %draft.client_id, "OpenId application updated");
        Ok(ApplicationPatchOutcome::Updated(draft.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryOpenIdStore;
    use serde_json::json;

    fn service() -> (ApplicationService, Arc<InMemoryOpenIdStore>) {
        let store = Arc::new(InMemoryOpenIdStore::new());
        (ApplicationService::new(store.clone()), store)
    }

    fn confidential(client_id: &str) -> CreateApplicationRequest {
        CreateApplicationRequest {
            client_id: client_id.to_string(),
            display_name: format!("{} app", client_id),
            client_secret: Some("top-secret".into()),
            redirect_uris: vec!["https://app.example.com/callback".into()],
            scope_names: vec!["api".into()],
            permission_names: vec!["ept:token".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_confidential_application() {
        let (service, store) = service();
        let item = service.create(confidential("portal")).await.unwrap();

        assert_eq!(item.client_type, ClientType::Confidential);
        assert_eq!(item.consent_type, ConsentType::Explicit);
        assert_eq!(item.scope_names, vec!["api"]);
        assert_eq!(item.permission_names, vec!["ept:token"]);

        let stored = store.find_application("portal").await.unwrap().unwrap();
        assert_eq!(stored.client_secret_hash, Some(hash_secret("top-secret")));
        assert!(stored.permissions.contains(&"scp:api".to_string()));

        let body = serde_json::to_value(&item).unwrap();
        assert!(body.get("clientSecret").is_none());
        assert_eq!(body["clientType"], json!("confidential"));
    }

    #[tokio::test]
    async fn test_secret_rules() {
        let (service, _) = service();
        let mut request = confidential("portal");
        request.client_secret = None;
        let err = service.create(request).await.unwrap_err();
        assert_eq!(err.message(), "ClientSecret is required for confidential clients.");

        let mut request = confidential("spa");
        request.client_type = Some("public".into());
        let err = service.create(request).await.unwrap_err();
        assert_eq!(err.message(), "Public clients cannot have a client secret.");
    }

    #[tokio::test]
    async fn test_invalid_redirect_uris() {
        let (service, store) = service();
        let mut request = confidential("portal");
        request.redirect_uris = vec!["https://ok.example.com".into(), "/relative".into()];

        let err = service.create(request).await.unwrap_err();
        assert_eq!(err.detail("invalidUris").unwrap(), &json!(["/relative"]));
        assert!(store.applications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_client_id() {
        let (service, _) = service();
        service.create(confidential("portal")).await.unwrap();
        let err = service.create(confidential("PORTAL")).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_patch_checks_resulting_state() {
        let (service, _) = service();
        let item = service.create(confidential("portal")).await.unwrap();

        let err = service
            .patch(
                &item.id,
                PatchApplicationRequest {
                    client_type: Some("public".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Public clients cannot have a client secret.");

        let outcome = service
            .patch(
                "portal",
                PatchApplicationRequest {
                    client_type: Some("public".into()),
                    client_secret: Some("".into()),
                    scope_names: Some(vec!["profile".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ApplicationPatchOutcome::Updated(updated) = outcome else {
            panic!("expected update");
        };
        assert_eq!(updated.client_type, ClientType::Public);
        assert_eq!(updated.scope_names, vec!["profile"]);
        assert_eq!(updated.permission_names, vec!["ept:token"]);
    }

    #[tokio::test]
    async fn test_patch_rename_and_remove() {
        let (service, _) = service();
        let portal = service.create(confidential("portal")).await.unwrap();
        service.create(confidential("admin")).await.unwrap();

        let err = service
            .patch(
                &portal.id,
                PatchApplicationRequest {
                    client_id: Some("admin".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let outcome = service
            .patch(
                &portal.id,
                PatchApplicationRequest {
                    operation: Some("remove".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, ApplicationPatchOutcome::Removed(portal.id));

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_id, "admin");
    }
}
