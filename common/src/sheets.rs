//! Published-spreadsheet product source: configuration and the gviz wire
//! format. The HTTP client lives in `apex-sheets`; everything here is pure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::catalog::SourceError;
use crate::product::{Product, ProductId};

/// Sheet id left in freshly generated configs.
pub const PLACEHOLDER_SHEET_ID: &str = "YOUR_GOOGLE_SHEET_ID";
pub const DEFAULT_BASE_URL: &str = "https://docs.google.com";
pub const DEFAULT_SHEET_NAME: &str = "Products";

const RESPONSE_PREFIX: &str = "google.visualization.Query.setResponse(";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetConfig {
    pub enabled: bool,
    pub sheet_id: String,
    pub sheet_name: String,
    pub base_url: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sheet_id: PLACEHOLDER_SHEET_ID.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl SheetConfig {
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            sheet_id: sheet_id.into(),
            ..Self::default()
        }
    }

    /// Enabled and pointing at a real sheet.
    pub fn is_configured(&self) -> bool {
        let id = self.sheet_id.trim();
        self.enabled && !id.is_empty() && id != PLACEHOLDER_SHEET_ID
    }

    pub fn gviz_url(&self) -> String {
        let name: String = url::form_urlencoded::byte_serialize(self.sheet_name.as_bytes()).collect();
        format!(
            "{}/spreadsheets/d/{}/gviz/tq?tqx=out:json&sheet={}",
            self.base_url.trim_end_matches('/'),
            self.sheet_id.trim(),
            name
        )
    }
}

#[derive(Debug, Deserialize)]
struct GvizResponse {
    table: Option<GvizTable>,
}

#[derive(Debug, Deserialize)]
struct GvizTable {
    #[serde(default)]
    cols: Vec<GvizColumn>,
    rows: Option<Vec<GvizRow>>,
}

#[derive(Debug, Deserialize)]
struct GvizColumn {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl GvizColumn {
    fn header(&self) -> Option<String> {
        let raw = self
            .label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.id.as_deref())?;
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        (!key.is_empty()).then_some(key)
    }
}

#[derive(Debug, Deserialize)]
struct GvizRow {
    #[serde(default)]
    c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Deserialize)]
struct GvizCell {
    #[serde(default)]
    v: Option<Value>,
    #[serde(default)]
    f: Option<String>,
}

impl GvizCell {
    /// Raw value if truthy, else the formatted value, else empty.
    fn text(&self) -> String {
        let raw = match &self.v {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => number_text(n),
            Some(Value::Bool(true)) => "true".to_string(),
            _ => String::new(),
        };
        if raw.is_empty() {
            self.f.clone().unwrap_or_default()
        } else {
            raw
        }
    }
}

/// Whole numbers print without a fractional part (`42.0` reads as `42`).
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Strip the JS callback wrapper around a gviz body.
fn unwrap_response(text: &str) -> &str {
    let body = match text.find(RESPONSE_PREFIX) {
        Some(pos) => &text[pos + RESPONSE_PREFIX.len()..],
        None => text,
    };
    let body = body.trim_end();
    body.strip_suffix(");").unwrap_or(body)
}

/// Parse a gviz response into products.
///
/// Column headers are matched after lower-casing and removing whitespace.
/// Rows without a name are dropped. A response without a table yields an
/// empty list rather than an error.
pub fn parse_gviz_response(text: &str) -> Result<Vec<Product>, SourceError> {
    let response: GvizResponse = serde_json::from_str(unwrap_response(text))
        .map_err(|e| SourceError::Malformed(e.to_string()))?;

    let Some(GvizTable {
        cols,
        rows: Some(rows),
    }) = response.table
    else {
        debug!("gviz response has no table rows");
        return Ok(Vec::new());
    };

    let headers: Vec<Option<String>> = cols.iter().map(GvizColumn::header).collect();

    let products = rows
        .iter()
        .enumerate()
        .map(|(index, row)| row_to_product(index, row, &headers))
        .filter(Product::has_name)
        .collect();
    Ok(products)
}

fn row_to_product(index: usize, row: &GvizRow, headers: &[Option<String>]) -> Product {
    let mut fields = std::collections::HashMap::new();
    for (cell, header) in row.c.iter().zip(headers) {
        if let (Some(cell), Some(header)) = (cell, header) {
            fields.insert(header.as_str(), cell.text());
        }
    }
    let mut take = |keys: &[&str]| -> String {
        keys.iter()
            .filter_map(|k| fields.remove(*k))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    };

    let id = take(&["id"]);
    Product {
        id: if id.is_empty() {
            ProductId((index + 1).to_string())
        } else {
            ProductId(id)
        },
        name: take(&["name", "productname"]),
        category: take(&["category"]).to_lowercase(),
        subcategory: take(&["subcategory"]),
        material: take(&["material"]),
        size_range: take(&["sizerange", "size"]),
        description: take(&["description"]),
        image: take(&["imageurl", "image"]),
        ..Default::default()
    }
}
