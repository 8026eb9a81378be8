use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enquiry::ENQUIRY_CAP;
use crate::session::{DEFAULT_SESSION_MINUTES, MAX_SESSION_MINUTES};
use crate::sheets::SheetConfig;
use crate::visit::VISIT_CAP;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Site-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub sheet: SheetConfig,
    /// Apps Script web-app URL that receives leads.
    pub lead_sink_url: Option<String>,
    pub enquiry_cap: usize,
    pub visit_cap: usize,
    pub session_minutes: i64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            sheet: SheetConfig::default(),
            lead_sink_url: None,
            enquiry_cap: ENQUIRY_CAP,
            visit_cap: VISIT_CAP,
            session_minutes: DEFAULT_SESSION_MINUTES,
        }
    }
}

impl SiteConfig {
    /// Parse a config document. The top level must be a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ConfigError::Invalid("config must be a JSON object".into()));
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Admin session lifetime, kept within `1..=MAX_SESSION_MINUTES`.
    pub fn session_lifetime(&self) -> Duration {
        Duration::minutes(self.session_minutes.clamp(1, MAX_SESSION_MINUTES))
    }

    /// The lead sink URL, if one is set and non-blank.
    pub fn lead_sink(&self) -> Option<&str> {
        self.lead_sink_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enquiry_cap == 0 {
            return Err(ConfigError::Invalid("enquiryCap must be positive".into()));
        }
        if self.visit_cap == 0 {
            return Err(ConfigError::Invalid("visitCap must be positive".into()));
        }
        if !(1..=MAX_SESSION_MINUTES).contains(&self.session_minutes) {
            return Err(ConfigError::Invalid(format!(
                "sessionMinutes must be between 1 and {MAX_SESSION_MINUTES}"
            )));
        }
        Ok(())
    }
}
