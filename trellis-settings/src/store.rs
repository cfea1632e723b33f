// In-memory settings document of one tenant

use crate::localization::LocalizationSettings;
use crate::site::SiteSettings;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct SettingsStore {
    site: RwLock<SiteSettings>,
    localization: RwLock<LocalizationSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose site name starts as the tenant name.
    pub fn for_tenant(tenant: &str) -> Self {
        let store = Self::default();
        store.site.write().site_name = tenant.to_string();
        store
    }

    pub fn site(&self) -> SiteSettings {
        self.site.read().clone()
    }

    pub fn localization(&self) -> LocalizationSettings {
        self.localization.read().clone()
    }

    /// Apply `update` to a copy and store it only when it succeeds.
    pub fn update_site<E>(
        &self,
        update: impl FnOnce(&mut SiteSettings) -> Result<(), E>,
    ) -> Result<SiteSettings, E> {
        let mut guard = self.site.write();
        let mut draft = guard.clone();
        update(&mut draft)?;
        *guard = draft.clone();
        Ok(draft)
    }

    pub fn update_localization<E>(
        &self,
        update: impl FnOnce(&mut LocalizationSettings) -> Result<(), E>,
    ) -> Result<LocalizationSettings, E> {
        let mut guard = self.localization.write();
        let mut draft = guard.clone();
        update(&mut draft)?;
        *guard = draft.clone();
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_update_keeps_previous() {
        let store = SettingsStore::for_tenant("Acme");
        let result: Result<_, ()> = store.update_site(|site| {
            site.site_name = "Changed".into();
            Err(())
        });
        assert!(result.is_err());
        assert_eq!(store.site().site_name, "Acme");
    }
}
