//! Site and localization settings of a Trellis tenant.
//!
//! ## Features
//!
//! - 🏷️ **Site Settings** - Name, time zone, base and CDN URLs, paging limits, cache modes
//! - 🌍 **Localization** - Default and supported cultures in canonical casing
//! - ✅ **Validated Patches** - Partial updates applied to a draft and stored only when valid
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_settings::*;
//!
//! let store = Arc::new(SettingsStore::for_tenant("Acme"));
//! let site = SiteSettingsService::new(store.clone());
//!
//! site.update(&SiteSettingsPatch {
//!     time_zone_id: Some("Europe/Paris".into()),
//!     ..Default::default()
//! })?;
//! ```

pub mod localization;
pub mod site;
pub mod store;

pub use localization::{
    DEFAULT_CULTURE, LocalizationPatch, LocalizationService, LocalizationSettings,
    normalize_culture,
};
pub use site::{CacheMode, ResourceDebugMode, SiteSettings, SiteSettingsPatch, SiteSettingsService};
pub use store::SettingsStore;
