use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::product::lenient_string;

/// Category identifier; the loose foreign key used by `Product::category`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CategoryId(pub String);

impl<'de> Deserialize<'de> for CategoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(CategoryId)
    }
}

impl CategoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        CategoryId(s.to_string())
    }
}

/// A product category with its ordered subcategory labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: CategoryId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_labels")]
    pub subcategories: Vec<String>,
    /// Set on categories created through the admin view.
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Category {
    /// Minimal record for a category id that no source declares yet.
    pub fn synthesize(id: &str, subcategory: Option<&str>) -> Self {
        let name = format_category_name(id);
        Self {
            id: CategoryId(id.to_string()),
            description: default_description(&name),
            name,
            subcategories: subcategory
                .filter(|s| !s.is_empty())
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            is_custom: true,
            created_at: None,
        }
    }

    /// Append a subcategory label unless already present. Returns `true` if added.
    pub fn add_subcategory(&mut self, label: &str) -> bool {
        if label.is_empty() || self.subcategories.iter().any(|s| s == label) {
            return false;
        }
        self.subcategories.push(label.to_string());
        true
    }

    /// Set-union `labels` into this category, keeping first-seen order.
    pub fn merge_subcategories<'a>(&mut self, labels: impl IntoIterator<Item = &'a String>) {
        for label in labels {
            self.add_subcategory(label);
        }
    }
}

/// Turn an id like `hex-bolts` or `anchor_fasteners` into `Hex Bolts` /
/// `Anchor Fasteners`.
pub fn format_category_name(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive an id from a display name: lower-cased, whitespace runs become `-`.
pub fn slugify_category_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) fn default_description(name: &str) -> String {
    format!("Products in {name} category")
}

fn nullable_labels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
