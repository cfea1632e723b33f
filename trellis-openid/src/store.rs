// OpenId entity storage

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use trellis_core::{ManagementError, Result};

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALLOWED: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Case-insensitive parse; invalid values report the allowed set.
            pub fn parse(value: &str) -> Result<Self> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ManagementError::invalid(format!(
                    "Unsupported {} '{}'.",
                    $label, value
                ))
                .with_detail("allowed", Self::ALLOWED))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// OAuth client type.
    ClientType, "client type" {
        Confidential => "confidential",
        Public => "public",
    }
);

string_enum!(
    /// How user consent is collected for an application.
    ConsentType, "consent type" {
        Explicit => "explicit",
        External => "external",
        Implicit => "implicit",
        Systematic => "systematic",
    }
);

impl Default for ClientType {
    fn default() -> Self {
        Self::Confidential
    }
}

impl Default for ConsentType {
    fn default() -> Self {
        Self::Explicit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIdApplication {
    pub id: String,
    pub client_id: String,
    pub display_name: String,
    pub client_type: ClientType,
    pub consent_type: ConsentType,
    /// SHA-256 hex of the client secret.
    pub client_secret_hash: Option<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    /// Plain permissions plus `scp:`-prefixed scope grants.
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIdScope {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub resources: Vec<String>,
}

/// Per-tenant OpenId storage.
///
/// `save_*` inserts a record or replaces the one with the same id.
#[async_trait]
pub trait OpenIdStore: Send + Sync {
    async fn applications(&self) -> Result<Vec<OpenIdApplication>>;
    async fn find_application(&self, id_or_client_id: &str) -> Result<Option<OpenIdApplication>>;
    async fn save_application(&self, application: OpenIdApplication) -> Result<()>;
    async fn delete_application(&self, id: &str) -> Result<()>;

    async fn scopes(&self) -> Result<Vec<OpenIdScope>>;
    async fn find_scope(&self, id_or_name: &str) -> Result<Option<OpenIdScope>>;
    async fn save_scope(&self, scope: OpenIdScope) -> Result<()>;
    async fn delete_scope(&self, id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryOpenIdStore {
    applications: RwLock<Vec<OpenIdApplication>>,
    scopes: RwLock<Vec<OpenIdScope>>,
}

impl InMemoryOpenIdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &str) {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

#[async_trait]
impl OpenIdStore for InMemoryOpenIdStore {
    async fn applications(&self) -> Result<Vec<OpenIdApplication>> {
        Ok(self.applications.read().clone())
    }

    async fn find_application(&self, id_or_client_id: &str) -> Result<Option<OpenIdApplication>> {
        let applications = self.applications.read();
        let found = applications
            .iter()
            .find(|a| a.id == id_or_client_id)
            .or_else(|| applications.iter().find(|a| a.client_id == id_or_client_id));
        Ok(found.cloned())
    }

    async fn save_application(&self, application: OpenIdApplication) -> Result<()> {
        upsert(&mut self.applications.write(), application, |a| a.id.as_str());
        Ok(())
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        self.applications.write().retain(|a| a.id != id);
        Ok(())
    }

    async fn scopes(&self) -> Result<Vec<OpenIdScope>> {
        Ok(self.scopes.read().clone())
    }

    async fn find_scope(&self, id_or_name: &str) -> Result<Option<OpenIdScope>> {
        let scopes = self.scopes.read();
        let found = scopes
            .iter()
            .find(|s| s.id == id_or_name)
            .or_else(|| scopes.iter().find(|s| s.name == id_or_name));
        Ok(found.cloned())
    }

    async fn save_scope(&self, scope: OpenIdScope) -> Result<()> {
        upsert(&mut self.scopes.write(), scope, |s| s.id.as_str());
        Ok(())
    }

    async fn delete_scope(&self, id: &str) -> Result<()> {
        self.scopes.write().retain(|s| s.id != id);
        Ok(())
    }
}
