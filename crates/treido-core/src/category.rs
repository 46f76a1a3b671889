//! # Category Types
//!
//! Categories form a tree, but the storefront never holds the whole tree.
//! It asks for one node at a time and gets back that node's neighbourhood:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CategoryContext for "smartphones"                    │
//! │                                                                         │
//! │                        parent: electronics                              │
//! │                              │                                          │
//! │       ┌──────────────────────┼──────────────────────┐                  │
//! │   siblings:            current: smartphones     siblings:              │
//! │   laptops                    │                   tablets               │
//! │                    ┌─────────┴─────────┐                               │
//! │             children: android       children: ios                      │
//! │                                                                         │
//! │   attributes: brand (select), storage (select), 5g (boolean) ...       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::locale::Locale;
use crate::ATTR_PARAM_PREFIX;

/// A category node without its relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CategoryLite {
    pub id: String,
    pub name: String,
    pub name_bg: Option<String>,
    pub slug: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CategoryLite {
    /// Localized display name.
    pub fn display_name(&self, locale: Locale) -> &str {
        locale.display_name(&self.name, self.name_bg.as_deref())
    }
}

/// How a category attribute is edited and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AttributeType {
    Select,
    Multiselect,
    Boolean,
    Number,
    Text,
    Date,
}

impl AttributeType {
    /// Parses a stored type name. Unknown names fall back to `Text`.
    pub fn parse(value: &str) -> AttributeType {
        match value {
            "select" => AttributeType::Select,
            "multiselect" => AttributeType::Multiselect,
            "boolean" => AttributeType::Boolean,
            "number" => AttributeType::Number,
            "date" => AttributeType::Date,
            _ => AttributeType::Text,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Select => "select",
            AttributeType::Multiselect => "multiselect",
            AttributeType::Boolean => "boolean",
            AttributeType::Number => "number",
            AttributeType::Text => "text",
            AttributeType::Date => "date",
        }
    }
}

/// A filterable/describable attribute attached to a category.
///
/// Attributes with no `category_id` are global and apply everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryAttribute {
    pub id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub name_bg: Option<String>,
    pub attribute_type: AttributeType,
    /// Key used in product attributes and `attr_<key>` filters.
    pub attribute_key: String,
    pub options: Option<Vec<String>>,
    pub options_bg: Option<Vec<String>>,
    pub is_filterable: bool,
    pub is_required: bool,
    pub sort_order: i64,
}

impl CategoryAttribute {
    /// Query parameter name filtering on this attribute.
    pub fn filter_param(&self) -> String {
        format!("{}{}", ATTR_PARAM_PREFIX, self.attribute_key)
    }
}

/// A node plus its immediate neighbourhood and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryContext {
    pub current: CategoryLite,
    pub parent: Option<CategoryLite>,
    pub siblings: Vec<CategoryLite>,
    pub children: Vec<CategoryLite>,
    pub attributes: Vec<CategoryAttribute>,
}

/// Derives an attribute key from a display name: `"Screen Size"` → `"screen_size"`.
pub fn normalize_attribute_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    key
}

/// True for query keys that carry attribute filters.
#[inline]
pub fn is_attr_param(key: &str) -> bool {
    key.starts_with(ATTR_PARAM_PREFIX)
}

/// Returns the attribute key of an `attr_<key>` parameter.
pub fn attr_param_key(key: &str) -> Option<&str> {
    key.strip_prefix(ATTR_PARAM_PREFIX).filter(|k| !k.is_empty())
}

/// Drops every `attr_*` pair, keeping order of the rest.
pub fn without_attr_params(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| !is_attr_param(key))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_attribute_type_fallback() {
        assert_eq!(AttributeType::parse("multiselect"), AttributeType::Multiselect);
        assert_eq!(AttributeType::parse("color-picker"), AttributeType::Text);
    }

    #[test]
    fn test_normalize_attribute_key() {
        assert_eq!(normalize_attribute_key("Screen Size"), "screen_size");
        assert_eq!(normalize_attribute_key("  RAM (GB) "), "ram_gb");
        assert_eq!(normalize_attribute_key("Марка"), "марка");
    }

    #[test]
    fn test_without_attr_params() {
        let params = vec![
            pair("sort", "newest"),
            pair("attr_color", "red"),
            pair("q", "phone"),
            pair("attr_size", "m"),
        ];
        assert_eq!(
            without_attr_params(&params),
            vec![pair("sort", "newest"), pair("q", "phone")]
        );
        assert_eq!(attr_param_key("attr_color"), Some("color"));
        assert_eq!(attr_param_key("attr_"), None);
        assert_eq!(attr_param_key("color"), None);
    }

    #[test]
    fn test_display_name_uses_locale() {
        let cat = CategoryLite {
            id: "c1".into(),
            name: "Phones".into(),
            name_bg: Some("Телефони".into()),
            slug: "phones".into(),
            parent_id: None,
            icon: None,
            image_url: None,
        };
        assert_eq!(cat.display_name(Locale::Bg), "Телефони");
        assert_eq!(cat.display_name(Locale::En), "Phones");
    }
}
