//! The tenant registry: single source of truth for tenant records.
//!
//! Each record sits behind its own mutex so that updates to one tenant
//! serialize while updates to different tenants proceed independently.
//! Mutations are applied to a copy and committed only when the closure
//! succeeds and the attached store, if any, has saved the result, so a
//! rejected request or a failed write never leaves a partial change.

use crate::store::TenantStore;
use crate::tenant::{Tenant, tenant_key};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use trellis_core::{ManagementError, Result};

type Slot = Arc<Mutex<Tenant>>;

pub struct TenantRegistry {
    default_name: String,
    tenants: RwLock<HashMap<String, Slot>>,
    bindings: RwLock<HashMap<String, (String, String)>>,
    store: Option<Arc<dyn TenantStore>>,
    persist_lock: Mutex<()>,
}

impl TenantRegistry {
    /// In-memory registry seeded with the default tenant.
    pub fn new(default_tenant: Tenant) -> Self {
        let registry = Self {
            default_name: default_tenant.name.clone(),
            tenants: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            store: None,
            persist_lock: Mutex::new(()),
        };
        registry.seed(default_tenant);
        registry
    }

    /// Registry backed by a store. The default tenant is added when the
    /// stored catalog does not contain it.
    pub fn with_store(default_name: &str, store: Arc<dyn TenantStore>) -> Result<Self> {
        let mut stored = store.load()?;
        let mut registry = Self::new(Tenant::default_tenant(default_name));

        if let Some(index) = stored.iter().position(|t| t.is_named(default_name)) {
            let mut default = stored.remove(index);
            default.is_default = true;
            registry.seed(default);
        }
        for mut tenant in stored {
            tenant.is_default = false;
            registry.seed(tenant);
        }

        registry.store = Some(store);
        registry.persist()?;
        Ok(registry)
    }

    fn seed(&self, tenant: Tenant) {
        let key = tenant.key();
        if let Some(binding) = tenant.url_binding() {
            self.bindings.write().insert(key.clone(), binding);
        }
        self.tenants
            .write()
            .insert(key, Arc::new(Mutex::new(tenant)));
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn is_default(&self, name: &str) -> bool {
        self.default_name.eq_ignore_ascii_case(name.trim())
    }

    pub fn default_tenant(&self) -> Result<Tenant> {
        self.get(&self.default_name)
            .ok_or_else(|| ManagementError::problem("Default tenant is missing from the registry."))
    }

    fn slot(&self, name: &str) -> Option<Slot> {
        self.tenants.read().get(&tenant_key(name)).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Tenant> {
        self.slot(name).map(|slot| slot.lock().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tenants.read().contains_key(&tenant_key(name))
    }

    /// All tenants ordered by name, case-insensitive.
    pub fn list(&self) -> Vec<Tenant> {
        let slots: Vec<Slot> = self.tenants.read().values().cloned().collect();
        let mut tenants: Vec<Tenant> = slots.iter().map(|slot| slot.lock().clone()).collect();
        tenants.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        tenants
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_binding(
        bindings: &HashMap<String, (String, String)>,
        key: &str,
        tenant: &Tenant,
    ) -> Result<()> {
        if let Some(binding) = tenant.url_binding() {
            let taken = bindings
                .iter()
                .any(|(other, existing)| other != key && *existing == binding);
            if taken {
                return Err(ManagementError::conflict(format!(
                    "Another tenant already uses host '{}' with prefix '{}'.",
                    tenant.request_url_host, tenant.request_url_prefix
                )));
            }
        }
        Ok(())
    }

    /// Add a new tenant. Fails with `Conflict` when the name is taken.
    pub fn insert(&self, tenant: Tenant) -> Result<Tenant> {
        let key = tenant.key();
        {
            let _write = self.write_guard();
            let mut tenants = self.tenants.write();
            if tenants.contains_key(&key) {
                return Err(ManagementError::conflict(format!(
                    "Tenant '{}' already exists.",
                    tenant.name
                )));
            }

            let mut bindings = self.bindings.write();
            Self::check_binding(&bindings, &key, &tenant)?;
            self.persist_with(&tenants, &key, Some(&tenant))?;
            if let Some(binding) = tenant.url_binding() {
                bindings.insert(key.clone(), binding);
            }
            tenants.insert(key, Arc::new(Mutex::new(tenant.clone())));
        }

        debug!(tenant = %tenant.name, "Tenant added to registry");
        Ok(tenant)
    }

    /// Read-modify-write one tenant under its lock.
    ///
    /// `apply` receives a copy of the current record; the copy replaces the
    /// stored record only when `apply` returns `Ok` and the store accepted it.
    pub fn update<R>(
        &self,
        name: &str,
        apply: impl FnOnce(&mut Tenant) -> Result<R>,
    ) -> Result<(Tenant, R)> {
        let slot = self.slot(name).ok_or_else(|| not_found(name))?;
        let _write = self.write_guard();
        let mut current = slot.lock();
        let mut draft = current.clone();
        let output = apply(&mut draft)?;

        if draft != *current {
            draft.updated_at = Utc::now();
            let key = current.key();
            let mut bindings = self.bindings.write();
            Self::check_binding(&bindings, &key, &draft)?;
            if self.store.is_some() {
                self.persist_with(&self.tenants.read(), &key, Some(&draft))?;
            }
            match draft.url_binding() {
                Some(binding) => bindings.insert(key, binding),
                None => bindings.remove(&key),
            };
            *current = draft;
        }
        Ok((current.clone(), output))
    }

    /// Remove a tenant when `guard` accepts its current state.
    pub fn remove_if(&self, name: &str, guard: impl FnOnce(&Tenant) -> Result<()>) -> Result<Tenant> {
        let removed = {
            let _write = self.write_guard();
            let mut tenants = self.tenants.write();
            let key = tenant_key(name);
            let slot = tenants.get(&key).cloned().ok_or_else(|| not_found(name))?;
            let tenant = slot.lock().clone();
            guard(&tenant)?;
            self.persist_with(&tenants, &key, None)?;
            tenants.remove(&key);
            self.bindings.write().remove(&key);
            tenant
        };

        debug!(tenant = %removed.name, "Tenant removed from registry");
        Ok(removed)
    }

    /// Serializes mutations while a store is attached.
    fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.store.as_ref().map(|_| self.persist_lock.lock())
    }

    /// Write the current catalog to the store, if any.
    fn persist(&self) -> Result<()> {
        self.persist_with(&self.tenants.read(), "", None)
    }

    /// Write the catalog as it stands after a change, before committing it.
    ///
    /// The record under `key` is replaced by `changed`, or left out when
    /// `changed` is `None`. Its slot is never locked here.
    fn persist_with(
        &self,
        tenants: &HashMap<String, Slot>,
        key: &str,
        changed: Option<&Tenant>,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let slots: Vec<Slot> = tenants
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, slot)| slot.clone())
            .collect();
        let mut snapshot: Vec<Tenant> = slots.iter().map(|slot| slot.lock().clone()).collect();
        snapshot.extend(changed.cloned());
        snapshot.sort_by_key(Tenant::key);

        store.save(&snapshot).inspect_err(|err| {
            error!(error = %err, "Failed to persist tenant registry");
        })
    }
}

pub(crate) fn not_found(name: &str) -> ManagementError {
    ManagementError::not_found(format!("Tenant '{}' was not found.", name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileTenantStore;
    use crate::tenant::TenantState;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry() -> TenantRegistry {
        TenantRegistry::new(Tenant::default_tenant("Default"))
    }

    #[test]
    fn test_default_tenant_present() {
        let registry = registry();
        assert!(registry.contains("default"));
        assert!(registry.is_default("DEFAULT"));
        assert!(registry.default_tenant().unwrap().is_default);
    }

    #[test]
    fn test_insert_conflict_is_case_insensitive() {
        let registry = registry();
        registry.insert(Tenant::new("Acme")).unwrap();

        let err = registry.insert(Tenant::new("ACME")).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(registry.get("acme").unwrap().name, "Acme");
    }

    #[test]
    fn test_list_sorted_case_insensitive() {
        let registry = registry();
        registry.insert(Tenant::new("beta")).unwrap();
        registry.insert(Tenant::new("Alpha")).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Alpha", "beta", "Default"]);
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() {
        let registry = registry();
        registry.insert(Tenant::new("acme")).unwrap();

        let result: Result<(Tenant, ())> = registry.update("acme", |tenant| {
            tenant.description = "changed".into();
            Err(ManagementError::invalid("rejected"))
        });

        assert!(result.is_err());
        assert_eq!(registry.get("acme").unwrap().description, "");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let registry = registry();
        let err = registry.update("ghost", |_| Ok(())).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_url_binding_conflict() {
        let registry = registry();
        registry
            .insert(Tenant::new("a").with_request_url_prefix("shared"))
            .unwrap();

        let err = registry
            .insert(Tenant::new("b").with_request_url_prefix("SHARED"))
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        registry.insert(Tenant::new("b")).unwrap();
        let err = registry
            .update("b", |t| {
                t.request_url_prefix = "shared".into();
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(registry.get("b").unwrap().request_url_prefix, "");
    }

    #[test]
    fn test_remove_if_guard() {
        let registry = registry();
        registry
            .insert(Tenant::new("acme").with_state(TenantState::Running))
            .unwrap();

        let err = registry
            .remove_if("acme", |t| {
                if t.state.is_removable() {
                    Ok(())
                } else {
                    Err(ManagementError::invalid("not removable"))
                }
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(registry.contains("acme"));

        registry.remove_if("ACME", |_| Ok(())).unwrap();
        assert!(!registry.contains("acme"));
    }

    #[test]
    fn test_concurrent_updates_to_same_tenant_serialize() {
        let registry = Arc::new(registry());
        registry.insert(Tenant::new("acme")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry
                            .update("acme", |t| {
                                let n: u32 = t.description.parse().unwrap_or(0);
                                t.description = (n + 1).to_string();
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.get("acme").unwrap().description, "400");
    }

    #[test]
    fn test_store_is_loaded_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.json");

        {
            let store = Arc::new(JsonFileTenantStore::new(&path));
            let registry = TenantRegistry::with_store("Default", store).unwrap();
            registry.insert(Tenant::new("acme")).unwrap();
        }

        let store = Arc::new(JsonFileTenantStore::new(&path));
        let registry = TenantRegistry::with_store("Default", store).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("acme").is_some());
        assert!(registry.default_tenant().unwrap().is_default);
    }

    #[derive(Default)]
    struct FlakyStore {
        failing: AtomicBool,
        saved: Mutex<Vec<Tenant>>,
    }

    impl TenantStore for FlakyStore {
        fn load(&self) -> Result<Vec<Tenant>> {
            Ok(Vec::new())
        }

        fn save(&self, tenants: &[Tenant]) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ManagementError::problem("disk full"));
            }
            *self.saved.lock() = tenants.to_vec();
            Ok(())
        }
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let registry = TenantRegistry::with_store("Default", store.clone()).unwrap();
        registry.insert(Tenant::new("acme")).unwrap();
        let acme = registry.get("acme").unwrap();
        store.failing.store(true, Ordering::SeqCst);

        let err = registry
            .insert(Tenant::new("beta").with_request_url_prefix("beta"))
            .unwrap_err();
        assert_eq!(err.message(), "disk full");
        assert!(!registry.contains("beta"));

        let result = registry.update("acme", |tenant| {
            tenant.description = "changed".into();
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(registry.get("acme").unwrap(), acme);

        assert!(registry.remove_if("acme", |_| Ok(())).is_err());
        assert!(registry.contains("acme"));

        store.failing.store(false, Ordering::SeqCst);
        registry
            .insert(Tenant::new("gamma").with_request_url_prefix("beta"))
            .unwrap();
        let saved: Vec<String> = store.saved.lock().iter().map(|t| t.name.clone()).collect();
        assert_eq!(saved, vec!["acme", "Default", "gamma"]);
    }
}
