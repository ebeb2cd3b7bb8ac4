//! Inventory item models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Inventory record as served by the backend (and cached locally).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InventoryItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "itemKey")]
    pub item_key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub cabinet: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub item_type: String,
    #[serde(default, rename = "use")]
    pub usage: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl InventoryItem {
    /// Bookkeeping key: the inventory key, or a slug of the name for
    /// records that never got one.
    pub fn stock_key(&self) -> String {
        if !self.item_key.is_empty() {
            self.item_key.clone()
        } else {
            self.name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
        }
    }
}

/// Free-text details editable per item, mirrored under `item_details_<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ItemDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub item_type: String,
    #[serde(default, rename = "use")]
    pub usage: String,
    #[serde(default)]
    pub cabinet: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
}

/// An image attached to a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Payload for creating a new inventory record.
#[derive(Debug, Clone, Validate)]
pub struct NewInventoryItem {
    #[validate(length(min = 1, message = "item key is required"))]
    pub item_key: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub category: String,
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i64,
    pub cabinet: String,
    pub description: String,
    pub item_type: String,
    pub usage: String,
    pub image: Option<ImageFile>,
}

impl NewInventoryItem {
    /// Cache-snapshot view used when the backend is unreachable.
    pub fn to_local_item(&self) -> InventoryItem {
        InventoryItem {
            id: None,
            item_key: self.item_key.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            stock: self.stock,
            cabinet: self.cabinet.clone(),
            description: self.description.clone(),
            item_type: self.item_type.clone(),
            usage: self.usage.clone(),
            image: None,
            image_url: None,
        }
    }
}
