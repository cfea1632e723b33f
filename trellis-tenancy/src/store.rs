//! Durable storage behind the tenant registry.

use crate::tenant::Tenant;
use std::fs;
use std::path::PathBuf;
use trellis_core::{ManagementError, Result};

/// Persists the whole tenant catalog.
///
/// Called synchronously while the registry holds its write locks, so
/// implementations do plain blocking I/O.
pub trait TenantStore: Send + Sync {
    fn load(&self) -> Result<Vec<Tenant>>;

    /// Replace the stored catalog with `tenants`.
    fn save(&self, tenants: &[Tenant]) -> Result<()>;
}

/// Stores the catalog as one JSON document, replaced atomically on save.
pub struct JsonFileTenantStore {
    path: PathBuf,
}

impl JsonFileTenantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TenantStore for JsonFileTenantStore {
    fn load(&self) -> Result<Vec<Tenant>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ManagementError::problem(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ManagementError::problem(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, tenants: &[Tenant]) -> Result<()> {
        let json = serde_json::to_string_pretty(tenants)
            .map_err(|e| ManagementError::problem(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ManagementError::problem(e.to_string()))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ManagementError::problem(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| ManagementError::problem(e.to_string()))
    }
}
