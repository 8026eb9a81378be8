//! Products and categories created through the admin view, persisted in the
//! device-local store alongside the bundled catalog.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::{default_description, slugify_category_name, Category, CategoryId};
use crate::product::{Product, ProductId};
use crate::storage::{
    read_list, KeyValueStore, StorageError, StoredList, CUSTOM_CATEGORIES_KEY, CUSTOM_PRODUCTS_KEY,
};

/// Fields supplied by the admin form when adding a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub size_range: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub material: Option<String>,
    pub size_range: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl ProductUpdate {
    fn apply(self, product: &mut Product) {
        let fields = [
            (self.name, &mut product.name),
            (self.category, &mut product.category),
            (self.subcategory, &mut product.subcategory),
            (self.material, &mut product.material),
            (self.size_range, &mut product.size_range),
            (self.description, &mut product.description),
            (self.image, &mut product.image),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// Fields supplied when adding a category by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    /// Derived from `name` when absent or blank.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomCatalogStats {
    pub total_custom_products: usize,
    pub total_custom_categories: usize,
    pub products_by_category: BTreeMap<String, usize>,
}

/// Custom catalog entries over an injected key-value store.
#[derive(Debug)]
pub struct CustomCatalogStore<S> {
    store: S,
}

impl<S: KeyValueStore> CustomCatalogStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Custom products, newest first. Unreadable data reads as empty.
    pub fn custom_products(&self) -> Vec<Product> {
        read_list(&self.store, CUSTOM_PRODUCTS_KEY)
    }

    /// Custom categories in creation order. Unreadable data reads as empty.
    pub fn custom_categories(&self) -> Vec<Category> {
        read_list(&self.store, CUSTOM_CATEGORIES_KEY)
    }

    /// Insert a product at the front of the custom list and make sure its
    /// category (and subcategory) exists.
    pub fn add_product(
        &mut self,
        new: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StorageError> {
        let mut products = self.stored_products();
        let id = unique_product_id(&products, now);
        let product = Product {
            id,
            name: new.name,
            category: new.category,
            subcategory: new.subcategory,
            material: new.material,
            size_range: new.size_range,
            description: new.description,
            image: new.image,
            created_at: Some(now),
            updated_at: None,
        };
        products.push_front(product.clone());
        products.save(&mut self.store, CUSTOM_PRODUCTS_KEY)?;
        info!("Added custom product {} ({})", product.id, product.name);

        if !product.category.is_empty() {
            let subcategory = Some(product.subcategory.as_str()).filter(|s| !s.is_empty());
            self.ensure_category_exists(&product.category, subcategory, now)?;
        }
        Ok(product)
    }

    /// Patch a custom product. Returns `None` if no product has `id`.
    pub fn update_product(
        &mut self,
        id: &ProductId,
        update: ProductUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, StorageError> {
        let mut products = self.stored_products();
        let Some(product) = products.iter_mut().find(|p| &p.id == id) else {
            debug!("update_product: no custom product {id}");
            return Ok(None);
        };
        update.apply(product);
        product.updated_at = Some(now);
        let updated = product.clone();
        products.save(&mut self.store, CUSTOM_PRODUCTS_KEY)?;
        Ok(Some(updated))
    }

    /// Remove every custom product with `id`. Returns whether any was removed.
    pub fn delete_product(&mut self, id: &ProductId) -> Result<bool, StorageError> {
        let mut products = self.stored_products();
        if products.retain(|p| &p.id != id) == 0 {
            return Ok(false);
        }
        products.save(&mut self.store, CUSTOM_PRODUCTS_KEY)?;
        Ok(true)
    }

    /// Create the category if unknown to the custom list, otherwise add the
    /// subcategory to it when missing.
    pub fn ensure_category_exists(
        &mut self,
        id: &str,
        subcategory: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Category, StorageError> {
        let mut categories = self.stored_categories();
        let found = categories
            .iter_mut()
            .find(|c| c.id.as_str() == id)
            .map(|existing| {
                let added = subcategory.is_some_and(|sub| existing.add_subcategory(sub));
                (added, existing.clone())
            });
        if let Some((added, result)) = found {
            if added {
                categories.save(&mut self.store, CUSTOM_CATEGORIES_KEY)?;
            }
            return Ok(result);
        }

        let mut category = Category::synthesize(id, subcategory);
        category.created_at = Some(now);
        categories.push_back(category.clone());
        categories.save(&mut self.store, CUSTOM_CATEGORIES_KEY)?;
        info!("Created category {id}");
        Ok(category)
    }

    /// Add a category by hand. Returns `None` when the id is already taken.
    pub fn add_category(
        &mut self,
        new: NewCategory,
        now: DateTime<Utc>,
    ) -> Result<Option<Category>, StorageError> {
        let id = new
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| slugify_category_name(&new.name));
        let mut categories = self.stored_categories();
        if categories.iter().any(|c| c.id.as_str() == id) {
            return Ok(None);
        }

        let mut category = Category {
            id: CategoryId(id),
            description: new
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| default_description(&new.name)),
            name: new.name,
            subcategories: Vec::new(),
            is_custom: true,
            created_at: Some(now),
        };
        category.merge_subcategories(&new.subcategories);
        categories.push_back(category.clone());
        categories.save(&mut self.store, CUSTOM_CATEGORIES_KEY)?;
        Ok(Some(category))
    }

    pub fn delete_category(&mut self, id: &str) -> Result<bool, StorageError> {
        let mut categories = self.stored_categories();
        if categories.retain(|c| c.id.as_str() != id) == 0 {
            return Ok(false);
        }
        categories.save(&mut self.store, CUSTOM_CATEGORIES_KEY)?;
        Ok(true)
    }

    pub fn stats(&self) -> CustomCatalogStats {
        let products = self.custom_products();
        let mut products_by_category = BTreeMap::new();
        for p in &products {
            *products_by_category.entry(p.category.clone()).or_insert(0) += 1;
        }
        CustomCatalogStats {
            total_custom_products: products.len(),
            total_custom_categories: self.custom_categories().len(),
            products_by_category,
        }
    }

    /// Drop every custom product and category.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(CUSTOM_PRODUCTS_KEY)?;
        self.store.remove(CUSTOM_CATEGORIES_KEY)
    }

    fn stored_products(&self) -> StoredList<Product> {
        StoredList::load(&self.store, CUSTOM_PRODUCTS_KEY)
    }

    fn stored_categories(&self) -> StoredList<Category> {
        StoredList::load(&self.store, CUSTOM_CATEGORIES_KEY)
    }
}

fn unique_product_id(existing: &StoredList<Product>, now: DateTime<Utc>) -> ProductId {
    let base = format!("custom_{}", now.timestamp_millis());
    let taken = |candidate: &str| existing.iter().any(|p| p.id.as_str() == candidate);
    if !taken(&base) {
        return ProductId(base);
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return ProductId(candidate);
        }
        n += 1;
    }
}
