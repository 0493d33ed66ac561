//! Catalog record types shared across the workspace.

use serde::{Deserialize, Serialize};

/// A catalog item that can be turned into a product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Unique, non-empty item identifier. Also names the output file.
    pub id: String,
    /// Raw color name, resolved through the `color` translation category.
    pub color_name: String,
    /// Translation key for the item name, e.g. `items.basic_crew_tshirt`.
    pub name_key: String,
    /// Translation key for the style, e.g. `style.basic`.
    pub style_key: String,
}

/// One structurally valid element of the catalog collection.
///
/// The id is optional here: entries without one still reach the run
/// controller so they can be counted as skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: Option<String>,
    pub color_name: String,
    pub name_key: String,
    pub style_key: String,
}

impl CatalogEntry {
    /// Promote to an [`ItemRecord`] when the entry carries a non-empty id.
    pub fn to_record(&self) -> Option<ItemRecord> {
        let id = self.id.as_deref().filter(|id| !id.is_empty())?;
        Some(ItemRecord {
            id: id.to_string(),
            color_name: self.color_name.clone(),
            name_key: self.name_key.clone(),
            style_key: self.style_key.clone(),
        })
    }
}
