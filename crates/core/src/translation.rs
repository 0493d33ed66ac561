//! Localized name lookup for catalog keys.
//!
//! Translation files are per-locale JSON documents shaped as
//! `{category: {itemKey: localizedString}}`. Lookups are total: any miss
//! falls back to the caller's default, usually the raw key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Default locale used to resolve prompt terms.
pub const DEFAULT_LOCALE: &str = "en";

/// Default translation namespace (file stem) holding apparel names.
pub const DEFAULT_NAMESPACE: &str = "apparel";

/// `category -> (key -> localized string)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    categories: HashMap<String, HashMap<String, String>>,
}

impl TranslationTable {
    /// Build a table from a parsed translation document.
    ///
    /// Categories that are not objects and values that are not strings are
    /// dropped.
    pub fn from_value(value: &Value) -> Self {
        let categories = value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(category, entries)| {
                        let entries = entries.as_object()?;
                        let strings = entries
                            .iter()
                            .filter_map(|(key, v)| Some((key.clone(), v.as_str()?.to_string())))
                            .collect();
                        Some((category.clone(), strings))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { categories }
    }

    /// Path of the translation file for `locale` under `locales_dir`.
    pub fn file_path(locales_dir: &Path, locale: &str, namespace: &str) -> PathBuf {
        locales_dir.join(locale).join(format!("{namespace}.json"))
    }

    /// Load the translation file for `locale`, falling back to an empty
    /// table if it is missing or malformed.
    pub fn load(locales_dir: &Path, locale: &str, namespace: &str) -> Self {
        let path = Self::file_path(locales_dir, locale, namespace);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Translation file unavailable, using raw keys");
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                let table = Self::from_value(&value);
                tracing::info!(path = %path.display(), categories = table.categories.len(), "Loaded translations");
                table
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Translation file is malformed, using raw keys");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Look up a single entry.
    pub fn get(&self, category: &str, key: &str) -> Option<&str> {
        self.categories.get(category)?.get(key).map(String::as_str)
    }
}

/// Resolve a `<category>.<itemKey>` key to its localized string.
///
/// Returns `default` for an empty key, a key of any other shape, a missing
/// or empty table, or an absent entry.
pub fn resolve(key: &str, table: Option<&TranslationTable>, default: &str) -> String {
    let Some(table) = table.filter(|t| !t.is_empty()) else {
        return default.to_string();
    };
    if key.is_empty() {
        return default.to_string();
    }

    let mut parts = key.split('.');
    let (Some(category), Some(item_key), None) = (parts.next(), parts.next(), parts.next()) else {
        return default.to_string();
    };

    table
        .get(category, item_key)
        .unwrap_or(default)
        .to_string()
}
