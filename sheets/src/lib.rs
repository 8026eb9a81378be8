//! HTTP adapters for the published product spreadsheet and the Apps Script
//! lead endpoint.

use apex_common::catalog::{RemoteProductSource, SourceError};
use apex_common::lead::{LeadPayload, LeadSink, SinkError};
use apex_common::product::Product;
use apex_common::sheets::{parse_gviz_response, SheetConfig};
use tracing::{debug, info};
use url::Url;

/// Reads products from a published sheet through the gviz query endpoint.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    config: SheetConfig,
}

impl SheetsClient {
    /// `None` when the sheet is disabled or still carries the placeholder id.
    pub fn from_config(config: &SheetConfig) -> Option<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &SheetConfig) -> Option<Self> {
        if !config.is_configured() {
            debug!("Spreadsheet source not configured; using bundled products");
            return None;
        }
        Some(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }
}

impl RemoteProductSource for SheetsClient {
    async fn fetch_products(&self) -> Result<Vec<Product>, SourceError> {
        let url = self.config.gviz_url();
        debug!("Fetching products from {url}");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let products = parse_gviz_response(&body)?;
        info!(
            "Sheet '{}' returned {} products",
            self.config.sheet_name,
            products.len()
        );
        Ok(products)
    }

    fn source_name(&self) -> &str {
        "sheets"
    }
}

/// Posts leads to an Apps Script web app bound to the lead sheet.
#[derive(Debug, Clone)]
pub struct AppsScriptSink {
    http: reqwest::Client,
    endpoint: Url,
}

impl AppsScriptSink {
    pub fn new(endpoint: &str) -> Result<Self, url::ParseError> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint.trim())?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl LeadSink for AppsScriptSink {
    async fn deliver(&self, payload: &LeadPayload) -> Result<(), SinkError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        debug!("Apps Script accepted {} lead", payload.form_type);
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "apps-script"
    }
}
