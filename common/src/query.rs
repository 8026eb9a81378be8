//! Browse and search over the aggregated product list.
//!
//! Each filter is `None`-transparent: an absent selection passes every
//! product through. Filters compose as a strict conjunction and never
//! reorder their input.

use serde::{Deserialize, Serialize};

use crate::product::Product;

/// Exact, case-sensitive match on the category id.
pub fn filter_by_category<'a>(products: &'a [Product], category: Option<&str>) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| matches_category(p, category))
        .collect()
}

/// Exact match on the subcategory label.
pub fn filter_by_subcategory<'a>(
    products: &'a [Product],
    subcategory: Option<&str>,
) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| matches_subcategory(p, subcategory))
        .collect()
}

/// Case-insensitive substring search over name, category, subcategory,
/// material and description. An empty query matches everything.
pub fn search<'a>(products: &'a [Product], query: Option<&str>) -> Vec<&'a Product> {
    let needle = normalize_query(query);
    products
        .iter()
        .filter(|p| matches_search(p, needle.as_deref()))
        .collect()
}

fn matches_category(product: &Product, category: Option<&str>) -> bool {
    category.map_or(true, |c| product.category == c)
}

fn matches_subcategory(product: &Product, subcategory: Option<&str>) -> bool {
    subcategory.map_or(true, |s| product.subcategory == s)
}

fn normalize_query(query: Option<&str>) -> Option<String> {
    query.filter(|q| !q.is_empty()).map(str::to_lowercase)
}

/// `needle` must already be lower-cased.
fn matches_search(product: &Product, needle: Option<&str>) -> bool {
    let Some(needle) = needle else {
        return true;
    };
    product
        .searchable_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// The current browse selection.
///
/// Category and subcategory are independent: selecting a subcategory does
/// not require, or check, that it belongs to the selected category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub search: Option<String>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// No active filter.
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.subcategory.is_none()
            && self.search.as_deref().map_or(true, str::is_empty)
    }

    pub fn matches(&self, product: &Product) -> bool {
        let needle = normalize_query(self.search.as_deref());
        self.matches_with(product, needle.as_deref())
    }

    /// Products passing every active filter, in input order.
    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let needle = normalize_query(self.search.as_deref());
        products
            .iter()
            .filter(|p| self.matches_with(p, needle.as_deref()))
            .collect()
    }

    fn matches_with(&self, product: &Product, needle: Option<&str>) -> bool {
        matches_category(product, self.category.as_deref())
            && matches_subcategory(product, self.subcategory.as_deref())
            && matches_search(product, needle)
    }
}
