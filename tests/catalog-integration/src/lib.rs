use apex_common::catalog::BundledCatalog;
use apex_common::category::Category;
use apex_common::product::Product;
use serde_json::json;

pub mod fixture;

/// The catalog document shipped with the site.
const BUNDLED_JSON: &str = include_str!("../../../data/catalog.json");

pub fn init_tracing() {
    tracing_subscriber::fmt::try_init().ok();
}

pub fn bundled_catalog() -> BundledCatalog {
    BundledCatalog::from_json_str(BUNDLED_JSON).expect("bundled catalog parses")
}

pub fn product(id: &str, category: &str, name: &str) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        category: category.into(),
        ..Default::default()
    }
}

pub fn category(id: &str, name: &str, subcategories: &[&str]) -> Category {
    Category {
        id: id.into(),
        name: name.into(),
        subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// A local URL with nothing listening behind it.
pub fn dead_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let port = listener.local_addr().expect("probe address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// A gviz response body with Name / Category / Sub Category columns.
pub fn gviz_body(rows: &[(&str, &str, &str)]) -> String {
    let rows: Vec<_> = rows
        .iter()
        .map(|(name, category, sub)| json!({"c": [{"v": name}, {"v": category}, {"v": sub}]}))
        .collect();
    let table = json!({
        "version": "0.6",
        "status": "ok",
        "table": {
            "cols": [
                {"id": "A", "label": "Name", "type": "string"},
                {"id": "B", "label": "Category", "type": "string"},
                {"id": "C", "label": "Sub Category", "type": "string"}
            ],
            "rows": rows
        }
    });
    format!("/*O_o*/\ngoogle.visualization.Query.setResponse({table});")
}
