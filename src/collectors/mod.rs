// Collector module.
// Defines the trait, the closed set of source types, and the helpers the
// individual backend collectors share for mapping loosely-shaped payloads.

pub mod greenhouse;
pub mod html_results;
pub mod json_api;
pub mod lever;
pub mod oracle;
pub mod rendered;
pub mod search_index;
pub mod talentsoft;
pub mod workday;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::browser::Browser;
use crate::error::AppError;
use crate::models::{Posting, SiteConfig};

/// Trait that all job collectors must implement.
/// Each collector fetches postings from one kind of backend and returns them
/// normalized. Any error means the whole source produced nothing.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Default source tag for postings this collector emits.
    fn name(&self) -> &str;

    /// Fetch postings using the site's parameters.
    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError>;
}

/// Hands out the collector for a source type.
pub trait CollectorSet: Send + Sync {
    fn collector(&self, kind: SourceKind) -> Arc<dyn Collector>;
}

/// Every backend protocol the watcher knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Greenhouse,
    Lever,
    Workday,
    WorkdayRaw,
    JsonApi,
    OracleOrc,
    SearchIndex,
    HtmlResults,
    Talentsoft,
    Rendered,
}

impl SourceKind {
    pub const ALL: [SourceKind; 10] = [
        SourceKind::Greenhouse,
        SourceKind::Lever,
        SourceKind::Workday,
        SourceKind::WorkdayRaw,
        SourceKind::JsonApi,
        SourceKind::OracleOrc,
        SourceKind::SearchIndex,
        SourceKind::HtmlResults,
        SourceKind::Talentsoft,
        SourceKind::Rendered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Greenhouse => "greenhouse",
            SourceKind::Lever => "lever",
            SourceKind::Workday => "workday",
            SourceKind::WorkdayRaw => "workday_raw",
            SourceKind::JsonApi => "json_api",
            SourceKind::OracleOrc => "oracle_orc",
            SourceKind::SearchIndex => "algolia",
            SourceKind::HtmlResults => "html_results",
            SourceKind::Talentsoft => "talentsoft",
            SourceKind::Rendered => "rendered",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let kind = match tag.trim() {
            "greenhouse" => SourceKind::Greenhouse,
            "lever" => SourceKind::Lever,
            "workday" => SourceKind::Workday,
            "workday_raw" => SourceKind::WorkdayRaw,
            "json_api" => SourceKind::JsonApi,
            "oracle_orc" => SourceKind::OracleOrc,
            "algolia" | "lvmh" => SourceKind::SearchIndex,
            "html_results" | "sanofi_vie" => SourceKind::HtmlResults,
            "talentsoft" | "airfrance_talentsoft" => SourceKind::Talentsoft,
            "rendered" | "saint_gobain_playwright" => SourceKind::Rendered,
            other => return Err(AppError::UnsupportedSource(other.to_string())),
        };
        Ok(kind)
    }
}

/// The production collector set: HTTP collectors plus a browser for
/// JavaScript-rendered pages.
pub struct Collectors {
    browser: Arc<dyn Browser>,
}

impl Collectors {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

impl CollectorSet for Collectors {
    fn collector(&self, kind: SourceKind) -> Arc<dyn Collector> {
        match kind {
            SourceKind::Greenhouse => Arc::new(greenhouse::Greenhouse),
            SourceKind::Lever => Arc::new(lever::Lever),
            SourceKind::Workday => Arc::new(workday::Workday),
            SourceKind::WorkdayRaw => Arc::new(workday::WorkdayRaw),
            SourceKind::JsonApi => Arc::new(json_api::JsonApi),
            SourceKind::OracleOrc => Arc::new(oracle::OracleOrc),
            SourceKind::SearchIndex => Arc::new(search_index::SearchIndex),
            SourceKind::HtmlResults => Arc::new(html_results::HtmlResults),
            SourceKind::Talentsoft => Arc::new(talentsoft::Talentsoft),
            SourceKind::Rendered => Arc::new(rendered::Rendered::new(self.browser.clone())),
        }
    }
}

/// Dotted-path lookup into nested objects and arrays. Numeric segments index
/// arrays. A missing step yields `None`, never an error.
pub fn get_nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = value;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        cur = match cur {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Render a scalar as text. Null and containers yield `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty scalar among `keys` of an object.
pub fn first_text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(scalar_text)
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Make a link absolute against the source's base URL.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), href),
    }
}

/// Flatten a parameter table into query pairs. Containers are JSON-encoded.
pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = scalar_text(v).unwrap_or_else(|| v.to_string());
            (k.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_tags_and_aliases_parse() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!("lvmh".parse::<SourceKind>().unwrap(), SourceKind::SearchIndex);
        assert_eq!(
            "saint_gobain_playwright".parse::<SourceKind>().unwrap(),
            SourceKind::Rendered
        );
    }

    #[test]
    fn unknown_tag_is_unsupported_source() {
        let err = "smartrecruiters".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedSource(tag) if tag == "smartrecruiters"));
    }

    #[test]
    fn get_nested_walks_objects_and_arrays() {
        let v = json!({ "a": { "b": [ { "c": "x" } ] } });
        assert_eq!(get_nested(&v, "a.b.0.c"), Some(&json!("x")));
        assert_eq!(get_nested(&v, "a.missing.c"), None);
        assert_eq!(get_nested(&v, "a.b.7"), None);
        assert_eq!(get_nested(&v, "a.b.c"), None);
        assert_eq!(get_nested(&json!("leaf"), "a"), None);
    }

    #[test]
    fn first_text_skips_empty_and_null() {
        let v = json!({ "Id": null, "JobRequisitionId": "", "RequisitionNumber": 1234 });
        assert_eq!(
            first_text(&v, &["Id", "JobRequisitionId", "RequisitionNumber"]),
            Some("1234".into())
        );
        assert_eq!(first_text(&v, &["Nope"]), None);
    }

    #[test]
    fn resolve_url_handles_relative_links() {
        assert_eq!(
            resolve_url("https://jobs.example.com", "/fr/job/1"),
            "https://jobs.example.com/fr/job/1"
        );
        assert_eq!(
            resolve_url("https://jobs.example.com/list/", "job/2"),
            "https://jobs.example.com/list/job/2"
        );
        assert_eq!(resolve_url("https://a", "https://b/c"), "https://b/c");
    }

    #[test]
    fn query_pairs_stringify_scalars() {
        let params = json!({ "limit": 50, "onlyData": true, "finder": "findReqs;x=1" });
        let mut pairs = query_pairs(params.as_object().unwrap());
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("finder".to_string(), "findReqs;x=1".to_string()),
                ("limit".to_string(), "50".to_string()),
                ("onlyData".to_string(), "true".to_string()),
            ]
        );
    }
}
