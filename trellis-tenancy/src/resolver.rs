//! Caller tenant resolution from the request host and path.

use crate::registry::TenantRegistry;
use crate::tenant::Tenant;
use std::sync::Arc;
use trellis_core::{ManagementError, Result};

/// The tenant a request was addressed to, and the path prefix it used.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCaller {
    pub tenant: Tenant,
    pub prefix: Option<String>,
}

/// Resolves the calling tenant.
///
/// The first path segment is matched against `requestUrlPrefix`; the `Host`
/// header (port removed) narrows the match for tenants that declare a host.
/// Tenants bound to a host without a prefix match on host alone. Anything
/// else belongs to the default tenant.
pub struct CallerResolver {
    registry: Arc<TenantRegistry>,
}

impl CallerResolver {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, host: Option<&str>, path: &str) -> Result<ResolvedCaller> {
        let host = host.map(extract_host).unwrap_or_default();
        let segment = first_segment(path);
        let tenants = self.registry.list();

        let host_matches = |tenant: &Tenant| {
            tenant.request_url_host.is_empty() || tenant.request_url_host.eq_ignore_ascii_case(&host)
        };

        if let Some(segment) = segment {
            let mut candidates: Vec<&Tenant> = tenants
                .iter()
                .filter(|t| {
                    !t.is_default
                        && !t.request_url_prefix.is_empty()
                        && t.request_url_prefix.eq_ignore_ascii_case(segment)
                        && host_matches(t)
                })
                .collect();
            // host-specific bindings win over prefix-only ones
            candidates.sort_by_key(|t| t.request_url_host.is_empty());

            if let Some(tenant) = candidates.first() {
                return Self::accept(tenant, Some(segment.to_string()));
            }
        }

        if !host.is_empty() {
            if let Some(tenant) = tenants.iter().find(|t| {
                !t.is_default
                    && t.request_url_prefix.is_empty()
                    && t.request_url_host.eq_ignore_ascii_case(&host)
            }) {
                return Self::accept(tenant, None);
            }
        }

        Ok(ResolvedCaller {
            tenant: self.registry.default_tenant()?,
            prefix: None,
        })
    }

    fn accept(tenant: &Tenant, prefix: Option<String>) -> Result<ResolvedCaller> {
        if !tenant.state.is_running() {
            return Err(ManagementError::not_found(format!(
                "Tenant '{}' is not available.",
                tenant.name
            )));
        }
        Ok(ResolvedCaller {
            tenant: tenant.clone(),
            prefix,
        })
    }
}

/// Host name without port, lowercased.
pub fn extract_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        host.split(']').next().map(|h| format!("{}]", h)).unwrap_or_default()
    } else {
        host.split(':').next().unwrap_or_default().to_string()
    };
    without_port.to_lowercase()
}

fn first_segment(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
