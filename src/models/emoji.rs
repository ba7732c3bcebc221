//! Instance custom emoji

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::JsonExt;

/// A `:shortcode:` emoji defined by the instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEmoji {
    /// Name without the surrounding colons
    pub shortcode: String,
    /// Image URL
    pub url: String,
    /// Non-animated image URL
    pub static_url: String,
    /// Offered in the emoji picker
    pub visible_in_picker: bool,
    /// Picker category
    pub category: Option<String>,
}

impl CustomEmoji {
    /// Parse one entry of `/api/v1/custom_emojis`
    pub fn from_json(json: &Value) -> Self {
        Self {
            shortcode: json.str_at("shortcode"),
            url: json.str_at("url"),
            static_url: json.str_at("static_url"),
            visible_in_picker: json.bool_at("visible_in_picker"),
            category: json.opt_str_at("category"),
        }
    }

    /// Parse the whole table, skipping entries without a shortcode
    pub fn list_from_json(json: &Value) -> Vec<Self> {
        json.as_array()
            .map(|items| {
                items
                    .iter()
                    .map(Self::from_json)
                    .filter(|e| !e.shortcode.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
