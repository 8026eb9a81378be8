//! Browsing the assembled catalog.

use apex_catalog_integration::{bundled_catalog, init_tracing, product};
use apex_common::catalog::Catalog;
use apex_common::custom::{CustomCatalogStore, NewProduct};
use apex_common::image::resolve_image_url;
use apex_common::product::Product;
use apex_common::query::{filter_by_category, filter_by_subcategory, search, CatalogQuery};
use apex_common::storage::MemoryStore;
use apex_sheets::SheetsClient;
use chrono::Utc;

fn names(products: &[&Product]) -> Vec<String> {
    products.iter().map(|p| p.name.clone()).collect()
}

#[test]
fn category_then_search_narrows_to_one() {
    let products = vec![
        product("1", "bolts", "M10 Hex Bolt"),
        product("2", "nuts", "M8 Nut"),
    ];
    let bolts: Vec<Product> = filter_by_category(&products, Some("bolts"))
        .into_iter()
        .cloned()
        .collect();
    assert_eq!(names(&search(&bolts, Some("m10"))), vec!["M10 Hex Bolt"]);
}

#[test]
fn search_ignores_case() {
    let catalog = bundled_catalog();
    let upper = names(&search(&catalog.products, Some("BOLT")));
    let lower = names(&search(&catalog.products, Some("bolt")));
    assert!(!upper.is_empty());
    assert_eq!(upper, lower);
}

#[test]
fn products_missing_optional_fields_still_filter() {
    let bare: Product =
        serde_json::from_str(r#"{"id": 9, "name": "Rivet", "category": "fasteners", "subcategory": "Pop"}"#)
            .unwrap();
    let products = vec![bare];
    assert_eq!(filter_by_category(&products, Some("fasteners")).len(), 1);
    assert_eq!(filter_by_subcategory(&products, Some("Pop")).len(), 1);
    assert_eq!(names(&search(&products, Some("rivet"))), vec!["Rivet"]);
    assert!(search(&products, Some("steel")).is_empty());
    assert_eq!(products[0].id.as_str(), "9");
}

#[test]
fn bundled_catalog_queries() {
    let catalog = bundled_catalog();
    let query = CatalogQuery::new().category("bolts").search("ss304");
    assert_eq!(names(&query.apply(&catalog.products)), vec!["Hex Bolt"]);

    let query = CatalogQuery::new().subcategory("Nylock Nuts");
    assert_eq!(names(&query.apply(&catalog.products)), vec!["Nylock Nut"]);

    assert_eq!(
        CatalogQuery::new().apply(&catalog.products).len(),
        catalog.products.len()
    );
}

#[tokio::test]
async fn custom_products_are_searchable_alongside_bundled() {
    init_tracing();
    let bundled = bundled_catalog();
    let mut custom = CustomCatalogStore::new(MemoryStore::new());
    custom
        .add_product(
            NewProduct {
                name: "Hex Bolt (Hot Dip)".into(),
                category: "bolts".into(),
                subcategory: "Hex Bolts".into(),
                material: "HDG".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

    let catalog = Catalog::load::<SheetsClient, _>(&bundled, None, &custom).await;
    let hits = CatalogQuery::new()
        .category("bolts")
        .subcategory("Hex Bolts")
        .apply(&catalog.products);
    assert_eq!(names(&hits), vec!["Hex Bolt (Hot Dip)", "Hex Bolt"]);
    assert_eq!(catalog.category_name(Some("bolts")), "Bolts");
    assert_eq!(catalog.category_name(None), "All Products");
    assert_eq!(catalog.category_name(Some("rivets")), "rivets");
}

#[test]
fn drive_links_resolve_and_others_pass_through() {
    let resolved = resolve_image_url("https://drive.example.com/file/d/ABC123/view");
    assert!(resolved.contains("ABC123"));
    assert!(resolved.contains("thumbnail"));
    assert_eq!(
        resolve_image_url("https://cdn.example.com/img.jpg"),
        "https://cdn.example.com/img.jpg"
    );

    let catalog = bundled_catalog();
    let anchor = catalog
        .products
        .iter()
        .find(|p| p.name == "Wedge Anchor")
        .unwrap();
    assert_eq!(
        resolve_image_url(&anchor.image),
        "https://drive.google.com/thumbnail?id=1WdgAnchR0dImg&sz=w1000"
    );
    let bolt = catalog.products.iter().find(|p| p.name == "Hex Bolt").unwrap();
    assert_eq!(resolve_image_url(&bolt.image), bolt.image);
}
