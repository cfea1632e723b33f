// Localization settings

use crate::store::SettingsStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use trellis_core::names::contains_ignore_case;
use trellis_core::{ManagementError, Result};

// language[-Script][-REGION]
static CULTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2,3})(?:-([A-Za-z]{4}))?(?:-([A-Za-z]{2}|[0-9]{3}))?$").unwrap()
});

pub const DEFAULT_CULTURE: &str = "en-US";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationSettings {
    pub default_culture: String,
    pub supported_cultures: Vec<String>,
}

impl Default for LocalizationSettings {
    fn default() -> Self {
        Self {
            default_culture: DEFAULT_CULTURE.to_string(),
            supported_cultures: vec![DEFAULT_CULTURE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalizationPatch {
    pub default_culture: Option<String>,
    pub supported_cultures: Option<Vec<String>>,
}

/// Canonical casing of a culture tag: `xx`, `xx-YY`, `xx-Yyyy-YY`.
pub fn normalize_culture(value: &str) -> Option<String> {
    let caps = CULTURE.captures(value.trim())?;
    let mut culture = caps[1].to_lowercase();
    if let Some(script) = caps.get(2) {
        let script = script.as_str();
        culture.push('-');
        culture.push_str(&script[..1].to_uppercase());
        culture.push_str(&script[1..].to_lowercase());
    }
    if let Some(region) = caps.get(3) {
        culture.push('-');
        culture.push_str(&region.as_str().to_uppercase());
    }
    Some(culture)
}

/// Normalized, de-duplicated cultures, or `invalidCultures`.
fn normalize_cultures(values: &[String], message: &str) -> Result<Vec<String>> {
    let mut cultures: Vec<String> = Vec::new();
    let mut invalid = Vec::new();
    for value in values.iter().filter(|v| !v.trim().is_empty()) {
        match normalize_culture(value) {
            Some(culture) if !contains_ignore_case(&cultures, &culture) => cultures.push(culture),
            Some(_) => {}
            None => invalid.push(value.trim().to_string()),
        }
    }
    if invalid.is_empty() {
        Ok(cultures)
    } else {
        Err(ManagementError::invalid(message).with_detail("invalidCultures", invalid))
    }
}

impl LocalizationPatch {
    pub fn apply(&self, settings: &mut LocalizationSettings) -> Result<()> {
        if let Some(values) = &self.supported_cultures {
            let cultures = normalize_cultures(values, "Unsupported culture names detected.")?;
            if cultures.is_empty() {
                return Err(ManagementError::invalid("SupportedCultures cannot be empty."));
            }
            settings.supported_cultures = cultures;
        }
        if let Some(value) = &self.default_culture {
            let mut culture =
                normalize_cultures(std::slice::from_ref(value), "DefaultCulture is invalid.")?;
            settings.default_culture = culture.pop().unwrap_or_default();
        }

        if settings.default_culture.is_empty() {
            settings.default_culture = settings
                .supported_cultures
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_CULTURE.to_string());
        }
        if !contains_ignore_case(&settings.supported_cultures, &settings.default_culture) {
            settings
                .supported_cultures
                .push(settings.default_culture.clone());
        }
        Ok(())
    }
}

pub struct LocalizationService {
    store: Arc<SettingsStore>,
}

impl LocalizationService {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> LocalizationSettings {
        self.store.localization()
    }

    pub fn update(&self, patch: &LocalizationPatch) -> Result<LocalizationSettings> {
        let settings = self.store.update_localization(|settings| patch.apply(settings))?;
        info!(
            default_culture = %settings.default_culture,
            cultures = settings.supported_cultures.len(),
            "Localization settings updated"
        );
        Ok(settings)
    }
}
