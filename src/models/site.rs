use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One `[[sites]]` entry of the watch file.
///
/// Only the fields every source shares are typed here. The rest stays as a
/// JSON map that the selected collector deserializes into its own params.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    /// The backend query already narrows results, so skip the keyword filter.
    #[serde(default)]
    pub pre_filtered: bool,

    /// Overrides the collector's default source tag.
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_name() -> String {
    "(site)".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl SiteConfig {
    /// Deserialize the type-specific parameters.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| AppError::config(format!("site '{}': {e}", self.name)))
    }

    pub fn source_tag(&self, default: &str) -> String {
        self.source
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
