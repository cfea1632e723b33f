// Site settings

use crate::store::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use trellis_core::{ManagementError, Result};
use url::Url;

macro_rules! settings_enum {
    ($name:ident, $label:literal { $($variant:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALLOWED: &'static [&'static str] = &[$(stringify!($variant)),+];

            pub fn parse(value: &str) -> Result<Self> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case(stringify!($variant)) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ManagementError::invalid(format!("Invalid {} '{}'.", $label, value))
                    .with_detail("allowed", Self::ALLOWED))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = match self {
                    $(Self::$variant => stringify!($variant)),+
                };
                f.write_str(text)
            }
        }
    };
}

settings_enum!(ResourceDebugMode, "ResourceDebugMode" {
    FromConfiguration,
    Enabled,
    Disabled,
});

settings_enum!(CacheMode, "CacheMode" {
    FromConfiguration,
    Enabled,
    Disabled,
    DebugEnabled,
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub site_name: String,
    pub time_zone_id: String,
    pub calendar: String,
    pub base_url: String,
    pub page_size: u32,
    pub max_page_size: u32,
    pub max_paged_count: u32,
    pub use_cdn: bool,
    pub cdn_base_url: String,
    pub append_version: bool,
    pub resource_debug_mode: ResourceDebugMode,
    pub cache_mode: CacheMode,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            time_zone_id: "UTC".to_string(),
            calendar: String::new(),
            base_url: String::new(),
            page_size: 10,
            max_page_size: 100,
            max_paged_count: 0,
            use_cdn: false,
            cdn_base_url: String::new(),
            append_version: true,
            resource_debug_mode: ResourceDebugMode::FromConfiguration,
            cache_mode: CacheMode::FromConfiguration,
        }
    }
}

/// Partial update; absent fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettingsPatch {
    pub site_name: Option<String>,
    pub time_zone_id: Option<String>,
    pub calendar: Option<String>,
    pub base_url: Option<String>,
    pub page_size: Option<i64>,
    pub max_page_size: Option<i64>,
    pub max_paged_count: Option<i64>,
    pub use_cdn: Option<bool>,
    pub cdn_base_url: Option<String>,
    pub append_version: Option<bool>,
    pub resource_debug_mode: Option<String>,
    pub cache_mode: Option<String>,
}

fn absolute_or_empty(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if !value.is_empty() && Url::parse(value).is_err() {
        return Err(ManagementError::invalid(format!(
            "{} must be an absolute URL.",
            field
        )));
    }
    Ok(value.to_string())
}

fn positive(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ManagementError::invalid(format!("{} must be greater than 0.", field)))
}

fn time_zone(value: &str) -> Result<String> {
    let value = value.trim();
    if !value.is_empty() && value.parse::<chrono_tz::Tz>().is_err() {
        return Err(ManagementError::invalid(format!(
            "Unknown time zone '{}'.",
            value
        )));
    }
    Ok(value.to_string())
}

impl SiteSettingsPatch {
    pub fn apply(&self, site: &mut SiteSettings) -> Result<()> {
        if let Some(site_name) = &self.site_name {
            site.site_name = site_name.trim().to_string();
        }
        if let Some(time_zone_id) = &self.time_zone_id {
            site.time_zone_id = time_zone(time_zone_id)?;
        }
        if let Some(calendar) = &self.calendar {
            site.calendar = calendar.trim().to_string();
        }
        if let Some(base_url) = &self.base_url {
            site.base_url = absolute_or_empty(base_url, "BaseUrl")?;
        }
        if let Some(page_size) = self.page_size {
            site.page_size = positive(page_size, "PageSize")?;
        }
        if let Some(max_page_size) = self.max_page_size {
            site.max_page_size = positive(max_page_size, "MaxPageSize")?;
        }
        if let Some(max_paged_count) = self.max_paged_count {
            site.max_paged_count = positive(max_paged_count, "MaxPagedCount")?;
        }
        if let Some(use_cdn) = self.use_cdn {
            site.use_cdn = use_cdn;
        }
        if let Some(cdn_base_url) = &self.cdn_base_url {
            site.cdn_base_url = absolute_or_empty(cdn_base_url, "CdnBaseUrl")?;
        }
        if let Some(append_version) = self.append_version {
            site.append_version = append_version;
        }
        if let Some(mode) = &self.resource_debug_mode {
            site.resource_debug_mode = ResourceDebugMode::parse(mode)?;
        }
        if let Some(mode) = &self.cache_mode {
            site.cache_mode = CacheMode::parse(mode)?;
        }

        if site.page_size > 0 && site.max_page_size > 0 && site.page_size > site.max_page_size {
            return Err(ManagementError::invalid(
                "PageSize cannot be greater than MaxPageSize.",
            ));
        }
        Ok(())
    }
}

pub struct SiteSettingsService {
    store: Arc<SettingsStore>,
}

impl SiteSettingsService {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> SiteSettings {
        self.store.site()
    }

    pub fn update(&self, patch: &SiteSettingsPatch) -> Result<SiteSettings> {
        let site = self.store.update_site(|site| patch.apply(site))?;
        info!(site = %site.site_name, "Site settings updated");
        Ok(site)
    }
}
