use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::collectors::{Collector, get_nested, query_pairs, resolve_url, scalar_text};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

#[derive(Debug, Deserialize)]
struct Params {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// Where the item list lives, e.g. `$.data.jobs`.
    #[serde(default)]
    json_path_items: Option<String>,
    #[serde(default)]
    mapping: FieldMapping,
    /// Base for relative posting links.
    #[serde(default)]
    base: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Dotted paths from an item to each posting field.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FieldMapping {
    pub id: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
}

/// Any JSON endpoint, with request shape and field extraction driven by config.
pub struct JsonApi;

#[async_trait]
impl Collector for JsonApi {
    fn name(&self) -> &str {
        "json_api"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
            .map_err(|e| AppError::config(format!("site '{}': bad method: {e}", site.name)))?;

        let client = http::client(site.timeout())?;
        let mut req = client.request(method.clone(), &params.url);
        for (name, value) in &params.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !params.params.is_empty() {
            req = req.query(&query_pairs(&params.params));
        }
        if method != Method::GET
            && let Some(body) = params.body.as_ref().filter(|b| !is_empty_body(b))
        {
            req = req.json(body);
        }

        let data = http::json_body(req.send().await?).await?;
        let base = params.base.as_deref().unwrap_or(&params.url);

        Ok(map_items(
            &data,
            params.json_path_items.as_deref(),
            &params.mapping,
            base,
            &site.source_tag(self.name()),
        ))
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}

/// Locate the item container and map every item. Items that fail to map are
/// dropped one by one.
pub fn map_items(
    data: &Value,
    items_path: Option<&str>,
    mapping: &FieldMapping,
    base: &str,
    source: &str,
) -> Vec<Posting> {
    let items = match items_path.map(|p| p.trim_matches(|c| c == '$' || c == '.')) {
        Some(path) if !path.is_empty() => get_nested(data, path),
        _ => Some(data),
    };

    let iter: Box<dyn Iterator<Item = &Value>> = match items {
        Some(Value::Array(list)) => Box::new(list.iter()),
        Some(Value::Object(map)) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    };

    let mut postings = Vec::new();
    for (idx, item) in iter.enumerate() {
        match map_item(item, mapping, base) {
            Ok(new) => postings.push(new.finish(source)),
            Err(reason) => tracing::warn!("[{source}] skipping item {idx}: {reason}"),
        }
    }
    postings
}

fn map_item(item: &Value, mapping: &FieldMapping, base: &str) -> Result<NewPosting, String> {
    if !item.is_object() {
        return Err("item is not an object".to_string());
    }

    let new = NewPosting {
        id: field(item, mapping.id.as_deref())?,
        title: field(item, mapping.title.as_deref())?,
        location: field(item, mapping.location.as_deref())?,
        url: resolve_url(base, &field(item, mapping.url.as_deref())?),
    };

    if new.id.is_empty() && new.title.is_empty() && new.url.is_empty() {
        return Err("no id, title or url".to_string());
    }
    Ok(new)
}

fn field(item: &Value, path: Option<&str>) -> Result<String, String> {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return Ok(String::new());
    };
    match get_nested(item, path) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(v) => scalar_text(v)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| format!("'{path}' is not a scalar")),
    }
}
