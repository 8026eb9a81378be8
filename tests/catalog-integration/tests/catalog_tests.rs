//! Catalog assembly against the bundled document, a file-backed custom store
//! and the spreadsheet fixture.

use apex_catalog_integration::fixture::FixtureServer;
use apex_catalog_integration::{
    bundled_catalog, category, dead_endpoint, gviz_body, init_tracing, product,
};
use apex_common::catalog::{
    aggregate_categories, aggregate_products, resolve_primary_products, Catalog, CatalogSource,
    SourceError,
};
use apex_common::custom::{CustomCatalogStore, NewCategory, NewProduct};
use apex_common::sheets::SheetConfig;
use apex_common::storage::{FileStore, MemoryStore};
use apex_sheets::SheetsClient;
use chrono::Utc;

// ─── Pure aggregation ────────────────────────────────────────────────────────

#[test]
fn custom_product_precedes_static_product() {
    let s = vec![product("s1", "bolts", "Hex Bolt")];
    let c = vec![product("c1", "bolts", "Custom Washer")];
    let ids: Vec<String> = aggregate_products(&s, &c)
        .into_iter()
        .map(|p| p.id.to_string())
        .collect();
    assert_eq!(ids, vec!["c1", "s1"]);
}

#[test]
fn shared_category_merges_subcategories_custom_first() {
    let s = vec![category("bolts", "Bolts", &["Hex", "Carriage"])];
    let c = vec![category("bolts", "Bolts", &["Hex", "Socket"])];
    let merged = aggregate_categories(&s, &c);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].subcategories, vec!["Hex", "Socket", "Carriage"]);
}

#[test]
fn one_entry_per_distinct_category_id() {
    let s = vec![
        category("bolts", "Bolts", &["Hex"]),
        category("nuts", "Nuts", &["Hex Nuts"]),
    ];
    let c = vec![
        category("anchors", "Anchors", &[]),
        category("bolts", "Bolts", &["Hex", "Hex"]),
    ];
    let merged = aggregate_categories(&s, &c);
    let ids: Vec<&str> = merged.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["anchors", "bolts", "nuts"]);
    for cat in &merged {
        let mut labels = cat.subcategories.clone();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), cat.subcategories.len(), "duplicates in {}", cat.id.as_str());
    }
}

// ─── Remote source ───────────────────────────────────────────────────────────

#[tokio::test]
async fn disabled_remote_uses_bundled_products() {
    init_tracing();
    let bundled = bundled_catalog();
    let custom = CustomCatalogStore::new(MemoryStore::new());
    let catalog = Catalog::load::<SheetsClient, _>(&bundled, None, &custom).await;

    assert_eq!(catalog.products, bundled.products);
    assert_eq!(catalog.categories.len(), bundled.categories.len());
    assert_eq!(catalog.source, CatalogSource::Bundled);
    assert!(catalog.error.is_none());
}

#[tokio::test]
async fn remote_sheet_replaces_bundled_products() {
    init_tracing();
    let server = FixtureServer::start().await;
    server.reply_with_gviz(gviz_body(&[
        ("Hex Bolt M10", "Bolts", "Hex Bolts"),
        ("", "nuts", ""),
        ("Dome Nut", "nuts", "Dome Nuts"),
    ]));
    let client = SheetsClient::from_config(&server.sheet_config("sheet-123")).unwrap();

    let bundled = bundled_catalog();
    let sourcing = resolve_primary_products(Some(&client), &bundled.products).await;

    assert_eq!(sourcing.source, CatalogSource::Remote);
    assert!(!sourcing.is_fallback());
    let names: Vec<&str> = sourcing.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Hex Bolt M10", "Dome Nut"]);
    assert_eq!(sourcing.products[0].category, "bolts");
    assert_eq!(server.sheet_requests(), vec!["sheet-123"]);
}

#[tokio::test]
async fn network_failure_falls_back_to_bundled() {
    init_tracing();
    let config = SheetConfig {
        base_url: dead_endpoint(),
        ..SheetConfig::new("sheet-123")
    };
    let client = SheetsClient::from_config(&config).unwrap();
    let bundled = bundled_catalog();
    let custom = CustomCatalogStore::new(MemoryStore::new());
    let catalog = Catalog::load(&bundled, Some(&client), &custom).await;

    assert!(!catalog.products.is_empty());
    assert_eq!(catalog.products, bundled.products);
    assert_eq!(catalog.source, CatalogSource::Bundled);
    assert!(matches!(catalog.error, Some(SourceError::Network(_))));
}

#[tokio::test]
async fn http_error_falls_back_with_status() {
    init_tracing();
    let server = FixtureServer::start().await;
    server.reply_with_status(503);
    let client = SheetsClient::from_config(&server.sheet_config("sheet-123")).unwrap();

    let bundled = bundled_catalog();
    let sourcing = resolve_primary_products(Some(&client), &bundled.products).await;
    assert_eq!(sourcing.products, bundled.products);
    assert_eq!(sourcing.error, Some(SourceError::Status(503)));
}

#[tokio::test]
async fn empty_sheet_falls_back() {
    init_tracing();
    let server = FixtureServer::start().await;
    server.reply_with_gviz(gviz_body(&[("", "bolts", "")]));
    let client = SheetsClient::from_config(&server.sheet_config("sheet-123")).unwrap();

    let bundled = bundled_catalog();
    let sourcing = resolve_primary_products(Some(&client), &bundled.products).await;
    assert_eq!(sourcing.error, Some(SourceError::Empty));
    assert_eq!(sourcing.products, bundled.products);
}

#[tokio::test]
async fn sign_in_page_is_malformed() {
    init_tracing();
    let server = FixtureServer::start().await;
    server.reply_with_gviz("<html><body>Sign in</body></html>");
    let client = SheetsClient::from_config(&server.sheet_config("private")).unwrap();

    let bundled = bundled_catalog();
    let sourcing = resolve_primary_products(Some(&client), &bundled.products).await;
    assert!(matches!(sourcing.error, Some(SourceError::Malformed(_))));
}

// ─── Custom entries on disk ──────────────────────────────────────────────────

#[tokio::test]
async fn custom_entries_survive_reopen_and_lead_the_catalog() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-store.json");

    {
        let mut custom = CustomCatalogStore::new(FileStore::open(&path).unwrap());
        custom
            .add_product(
                NewProduct {
                    name: "Chemical Anchor".into(),
                    category: "fixings".into(),
                    subcategory: "Resin".into(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        custom
            .add_category(
                NewCategory {
                    name: "Bolts".into(),
                    subcategories: vec!["Eye Bolts".into(), "Hex Bolts".into()],
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
    }

    let bundled = bundled_catalog();
    let custom = CustomCatalogStore::new(FileStore::open(&path).unwrap());
    let catalog = Catalog::load::<SheetsClient, _>(&bundled, None, &custom).await;

    assert_eq!(catalog.products.len(), bundled.products.len() + 1);
    assert_eq!(catalog.products[0].name, "Chemical Anchor");
    assert_eq!(&catalog.products[1..], bundled.products.as_slice());

    // Custom categories come first: the synthesized "fixings", then "bolts".
    assert_eq!(catalog.categories[0].id.as_str(), "fixings");
    assert_eq!(catalog.categories[0].name, "Fixings");
    assert_eq!(catalog.subcategories_of("fixings"), ["Resin".to_string()]);

    let bolts = catalog.category("bolts").unwrap();
    assert_eq!(bolts.subcategories[..2], ["Eye Bolts".to_string(), "Hex Bolts".to_string()]);
    assert_eq!(
        bolts.subcategories.iter().filter(|s| *s == "Hex Bolts").count(),
        1
    );
    assert!(bolts.subcategories.iter().any(|s| s == "Foundation Bolts"));
    assert_eq!(
        catalog.categories.len(),
        bundled.categories.len() + 1,
        "only 'fixings' is new"
    );
}

#[tokio::test]
async fn corrupt_custom_data_reads_as_empty() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-store.json");
    std::fs::write(
        &path,
        r#"{"apex_custom_products": "{oops", "apex_custom_categories": "42"}"#,
    )
    .unwrap();

    let bundled = bundled_catalog();
    let custom = CustomCatalogStore::new(FileStore::open(&path).unwrap());
    let catalog = Catalog::load::<SheetsClient, _>(&bundled, None, &custom).await;
    assert_eq!(catalog.products, bundled.products);
    assert_eq!(catalog.categories.len(), bundled.categories.len());
}

#[tokio::test]
async fn unreadable_store_file_still_renders_catalog() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-store.json");
    std::fs::write(&path, r#"{"apex_custom_products": [1,"#).unwrap();

    let bundled = bundled_catalog();
    let mut store = FileStore::open_or_empty(&path).unwrap();
    let catalog = {
        let custom = CustomCatalogStore::new(&mut store);
        Catalog::load::<SheetsClient, _>(&bundled, None, &custom).await
    };
    assert_eq!(catalog.products, bundled.products);
    assert_eq!(catalog.categories.len(), bundled.categories.len());

    // The next write replaces the unreadable file with a valid one.
    let mut custom = CustomCatalogStore::new(&mut store);
    custom
        .add_product(
            NewProduct {
                name: "Stud Bolt".into(),
                category: "bolts".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
    let reopened = CustomCatalogStore::new(FileStore::open(&path).unwrap());
    assert_eq!(reopened.custom_products()[0].name, "Stud Bolt");
}
