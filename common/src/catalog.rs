//! Catalog aggregation.
//!
//! Merges the bundled product list (or a remote replacement) with the
//! device-local custom entries, and the static category taxonomy with the
//! custom one. Products are never de-duplicated by id; categories are merged
//! by id with set-union subcategories.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::category::{Category, CategoryId};
use crate::custom::CustomCatalogStore;
use crate::product::Product;
use crate::storage::KeyValueStore;

/// The static catalog document shipped with the site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundledCatalog {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl BundledCatalog {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Why a remote product fetch could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("remote source answered with HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("remote source returned no products")]
    Empty,
}

/// An optional remote replacement for the bundled product list.
///
/// Implementations perform the I/O and parse the wire format; the
/// aggregator only ever sees `Product` records.
#[allow(async_fn_in_trait)]
pub trait RemoteProductSource {
    async fn fetch_products(&self) -> Result<Vec<Product>, SourceError>;

    /// Human-readable name for logs (e.g. "sheets").
    fn source_name(&self) -> &str;
}

/// Which list ended up as the primary product source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Bundled,
    Remote,
}

/// Primary product list plus how it was obtained.
///
/// When the remote source was enabled but unusable, `products` holds the
/// bundled fallback and `error` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSourcing {
    pub products: Vec<Product>,
    pub source: CatalogSource,
    pub error: Option<SourceError>,
}

impl ProductSourcing {
    pub fn bundled(products: &[Product]) -> Self {
        Self {
            products: products.to_vec(),
            source: CatalogSource::Bundled,
            error: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Pick the primary product list.
///
/// `None` means the remote source is disabled. A fetch error or an empty
/// result falls back to `bundled` with the reason recorded; nothing is
/// retried and nothing is returned as `Err`.
pub async fn resolve_primary_products<R: RemoteProductSource>(
    remote: Option<&R>,
    bundled: &[Product],
) -> ProductSourcing {
    let Some(remote) = remote else {
        return ProductSourcing::bundled(bundled);
    };

    let outcome = match remote.fetch_products().await {
        Ok(products) if products.is_empty() => Err(SourceError::Empty),
        other => other,
    };

    match outcome {
        Ok(products) => {
            info!(
                "Loaded {} products from {}",
                products.len(),
                remote.source_name()
            );
            ProductSourcing {
                products,
                source: CatalogSource::Remote,
                error: None,
            }
        }
        Err(e) => {
            warn!(
                "Falling back to bundled product data ({} unavailable: {e})",
                remote.source_name()
            );
            ProductSourcing {
                products: bundled.to_vec(),
                source: CatalogSource::Bundled,
                error: Some(e),
            }
        }
    }
}

/// Custom entries first, then the primary list; each side keeps its order.
pub fn aggregate_products(primary: &[Product], custom: &[Product]) -> Vec<Product> {
    let mut merged = Vec::with_capacity(custom.len() + primary.len());
    merged.extend_from_slice(custom);
    merged.extend_from_slice(primary);
    merged
}

/// One entry per category id.
///
/// Custom categories come first and keep their name and description; primary
/// categories with an unseen id are appended, while a primary category whose
/// id is already present only contributes missing subcategory labels.
pub fn aggregate_categories(primary: &[Category], custom: &[Category]) -> Vec<Category> {
    let mut merged: Vec<Category> = Vec::with_capacity(custom.len() + primary.len());
    let mut index: HashMap<CategoryId, usize> = HashMap::new();

    for category in custom.iter().chain(primary) {
        match index.get(&category.id) {
            Some(&pos) => merged[pos].merge_subcategories(&category.subcategories),
            None => {
                let mut fresh = category.clone();
                // A single source may itself list a label twice.
                fresh.subcategories.clear();
                fresh.merge_subcategories(&category.subcategories);
                index.insert(category.id.clone(), merged.len());
                merged.push(fresh);
            }
        }
    }
    merged
}

/// The unified, in-memory view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub source: CatalogSource,
    pub error: Option<SourceError>,
}

impl Catalog {
    /// Layer the custom store over the resolved primary products and the
    /// bundled categories.
    pub fn assemble<S: KeyValueStore>(
        bundled: &BundledCatalog,
        sourcing: ProductSourcing,
        custom: &CustomCatalogStore<S>,
    ) -> Self {
        let custom_products = custom.custom_products();
        let custom_categories = custom.custom_categories();
        debug!(
            "Assembling catalog: {} primary + {} custom products, {} static + {} custom categories",
            sourcing.products.len(),
            custom_products.len(),
            bundled.categories.len(),
            custom_categories.len()
        );
        Self {
            products: aggregate_products(&sourcing.products, &custom_products),
            categories: aggregate_categories(&bundled.categories, &custom_categories),
            source: sourcing.source,
            error: sourcing.error,
        }
    }

    /// Resolve the primary source and assemble in one step.
    pub async fn load<R: RemoteProductSource, S: KeyValueStore>(
        bundled: &BundledCatalog,
        remote: Option<&R>,
        custom: &CustomCatalogStore<S>,
    ) -> Self {
        let sourcing = resolve_primary_products(remote, &bundled.products).await;
        Self::assemble(bundled, sourcing, custom)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id.as_str() == id)
    }

    /// Heading for the current selection: the category's name, the raw id
    /// for unknown categories, or "All Products" when nothing is selected.
    pub fn category_name(&self, id: Option<&str>) -> String {
        match id {
            None => "All Products".to_string(),
            Some(id) => self
                .category(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    pub fn subcategories_of(&self, id: &str) -> &[String] {
        self.category(id)
            .map(|c| c.subcategories.as_slice())
            .unwrap_or(&[])
    }
}
