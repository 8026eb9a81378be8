use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque product identifier.
///
/// Bundled and spreadsheet rows sometimes carry numeric ids, so deserialization
/// accepts numbers as well as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProductId(pub String);

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(ProductId)
    }
}

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        ProductId(s.to_string())
    }
}

/// A catalog entry. Every descriptive field defaults to an empty string so
/// filtering never has to deal with absent values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: ProductId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Loose reference to a `Category` id; never checked.
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subcategory: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub material: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size_range: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Direct image URL or a Drive sharing link (see `image::resolve_image_url`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Entries without a name pass through aggregation but are unlikely to
    /// match a search.
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Fields consulted by free-text search, in match order.
    pub fn searchable_fields(&self) -> [&str; 5] {
        [
            &self.name,
            &self.category,
            &self.subcategory,
            &self.material,
            &self.description,
        ]
    }
}

/// Accept strings, numbers, booleans and `null` wherever a text field is
/// expected. Objects and arrays are still rejected.
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => s,
        Some(Loose::Int(n)) => n.to_string(),
        Some(Loose::Float(f)) => f.to_string(),
        Some(Loose::Flag(b)) => b.to_string(),
        None => String::new(),
    })
}
