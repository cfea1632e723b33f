//! Feature management for Trellis tenants.
//!
//! - 📚 **Catalog**: explicit registration table of features and dependencies
//! - 🎚️ **Toggles**: validated, atomic enable/disable with dependency cascades
//! - 🧩 **Profiles**: include/exclude rule sets that limit what a tenant can use
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_features::*;
//!
//! let catalog = Arc::new(
//!     FeatureCatalog::builder()
//!         .register(FeatureDescriptor::new("Trellis.Settings").always_enabled())
//!         .register(FeatureDescriptor::new("Trellis.Workflows"))
//!         .build()?,
//! );
//! let features = TenantFeatures::new(
//!     "Default", true, catalog.clone(), ProfilePolicy::default(), feature_state(&catalog),
//! );
//! let result = toggle_features(&features, &FeatureToggleRequest::enable(["Trellis.Workflows"])).await?;
//! assert_eq!(result.changed.enabled, vec!["Trellis.Workflows"]);
//! ```

pub mod catalog;
pub mod manager;
pub mod profile;
pub mod profiles;
pub mod toggle;

pub use catalog::{FeatureCatalog, FeatureCatalogBuilder, FeatureDescriptor};
pub use manager::{
    EnabledFeatures, FeatureChanges, FeatureSession, FeatureState, TenantFeatures, feature_state,
};
pub use profile::{FeatureProfile, FeatureProfileStore, FeatureRule, ProfilePolicy, RuleKind};
pub use profiles::{
    FeatureProfileItem, FeatureProfileService, ProfileUpsertOutcome, UpsertFeatureProfileRequest,
};
pub use toggle::{
    ChangedFeatures, FeatureItem, FeaturePayload, FeatureToggleRequest, FeatureToggleResult,
    feature_payload, toggle_features,
};
