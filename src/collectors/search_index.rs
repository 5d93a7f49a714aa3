use std::future::Future;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::collectors::{Collector, first_text, resolve_url};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

/// Endpoint values used by `type = "lvmh"` sites when they leave them out.
const LVMH_URL: &str = "https://www.lvmh.com/api/search";
const LVMH_INDEX: &str = "PRD-fr-fr-timestamp-desc";
const LVMH_ORIGIN: &str = "https://www.lvmh.com";
const LVMH_REFERER: &str = "https://www.lvmh.com/fr/nous-rejoindre/nos-offres";

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    index: Option<String>,
    #[serde(default = "default_filters")]
    filters: String,
    #[serde(default = "default_facet_filters")]
    facet_filters: Value,
    #[serde(default = "default_hits_per_page")]
    hits_per_page: u32,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    referer: Option<String>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
}

fn default_filters() -> String {
    "category:job".to_string()
}

fn default_facet_filters() -> Value {
    json!([["contractFilter:VIE"]])
}

fn default_hits_per_page() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    50
}

/// Endpoint and index after presets, with the origin headers to send.
#[derive(Debug)]
struct Endpoint {
    url: String,
    index: String,
    origin: Option<String>,
    referer: Option<String>,
    base: Option<String>,
}

impl Params {
    fn endpoint(&self, kind: &str, site: &str) -> Result<Endpoint, AppError> {
        let lvmh = kind.eq_ignore_ascii_case("lvmh");
        let preset = |value: &Option<String>, fallback: &str| {
            value.clone().or_else(|| lvmh.then(|| fallback.to_string()))
        };

        let url = preset(&self.url, LVMH_URL)
            .ok_or_else(|| AppError::config(format!("site '{site}': missing field `url`")))?;
        let index = preset(&self.index, LVMH_INDEX)
            .ok_or_else(|| AppError::config(format!("site '{site}': missing field `index`")))?;
        Ok(Endpoint {
            url,
            index,
            origin: preset(&self.origin, LVMH_ORIGIN),
            referer: preset(&self.referer, LVMH_REFERER),
            base: preset(&self.base, LVMH_ORIGIN),
        })
    }
}

/// Algolia-style multi-query search proxy, paged by page number.
pub struct SearchIndex;

#[async_trait]
impl Collector for SearchIndex {
    fn name(&self) -> &str {
        "algolia"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let endpoint = params.endpoint(&site.kind, &site.name)?;
        let client = http::client(site.timeout())?;

        let hits = paginate(params.max_pages, &site.name, |page| {
            let mut req = client
                .post(&endpoint.url)
                .header("Accept", "application/json")
                .json(&query_body(&params, &endpoint.index, page));
            if let Some(origin) = &endpoint.origin {
                req = req.header("Origin", origin);
            }
            if let Some(referer) = &endpoint.referer {
                req = req.header("Referer", referer);
            }
            async move { http::json_body(req.send().await?).await }
        })
        .await?;

        let base = endpoint.base.as_deref().unwrap_or(&endpoint.url);
        let source = site.source_tag(self.name());
        Ok(hits.iter().map(|h| map_hit(h, base, &source)).collect())
    }
}

fn query_body(params: &Params, index: &str, page: u32) -> Value {
    json!({
        "queries": [{
            "indexName": index,
            "params": {
                "filters": params.filters,
                "facetFilters": params.facet_filters,
                "hitsPerPage": params.hits_per_page,
                "page": page,
                "maxValuesPerFacet": 100
            }
        }]
    })
}

/// Fetch page 0, read the page count from it, then fetch the remaining pages.
/// A failed later page is logged and skipped.
async fn paginate<F, Fut>(max_pages: u32, site: &str, mut fetch: F) -> Result<Vec<Value>, AppError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    let first = fetch(0).await?;
    let Some(result) = first_result(&first) else {
        return Ok(Vec::new());
    };
    let mut hits = result_hits(result);
    if hits.is_empty() {
        return Ok(hits);
    }

    let total_pages = result
        .get("nbPages")
        .and_then(|v| v.as_u64())
        .unwrap_or(1)
        .min(u64::from(max_pages.max(1))) as u32;

    for page in 1..total_pages {
        match fetch(page).await {
            Ok(data) => hits.extend(first_result(&data).map(result_hits).unwrap_or_default()),
            Err(e) => tracing::warn!("[{site}] page {page} failed: {e}"),
        }
    }
    Ok(hits)
}

fn first_result(data: &Value) -> Option<&Value> {
    data.get("results")?.as_array()?.first()
}

fn result_hits(result: &Value) -> Vec<Value> {
    result
        .get("hits")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn map_hit(hit: &Value, base: &str, source: &str) -> Posting {
    let link = first_text(hit, &["link", "url"]).unwrap_or_default();
    let location = [
        first_text(hit, &["city", "cityFilter"]),
        first_text(hit, &["countryRegionFilter", "country"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");

    NewPosting {
        id: first_text(hit, &["objectID", "atsId"]).unwrap_or_else(|| link.clone()),
        title: first_text(hit, &["name", "title"]).unwrap_or_default(),
        location,
        url: resolve_url(base, &link),
    }
    .finish(source)
}
