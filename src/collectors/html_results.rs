//! Career sites whose search endpoint answers with JSON wrapping a rendered
//! HTML fragment (`{"results": "<section id=\"search-results\" ...>"}`).
//!
//! The fragment's results container carries `data-current-page` and
//! `data-total-pages`; the remaining pages are requested with `?p=N`, which
//! these sites honour more reliably than `CurrentPage=N`.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::collectors::{Collector, query_pairs, resolve_url};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

#[derive(Debug, Deserialize)]
struct Params {
    url: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    referer: Option<String>,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
}

fn default_max_pages() -> u32 {
    50
}

pub struct HtmlResults;

#[async_trait]
impl Collector for HtmlResults {
    fn name(&self) -> &str {
        "html_results"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let base = match &params.base {
            Some(base) => base.clone(),
            None => origin(&params.url)?,
        };
        let referer = params.referer.clone().unwrap_or_else(|| format!("{base}/"));
        let client = http::client(site.timeout())?;
        let query = query_pairs(&params.params);

        let mut first_query = query.clone();
        first_query.push(("CurrentPage".to_string(), "1".to_string()));
        let html = fetch_fragment(&client, &params.url, &referer, &first_query).await?;
        let first = parse_fragment(&html, 1, &base)?;

        let pages = first.remaining(params.max_pages);
        let mut collected = first.postings;
        for page in pages {
            let mut page_query = query.clone();
            page_query.push(("p".to_string(), page.to_string()));

            let result = match fetch_fragment(&client, &params.url, &referer, &page_query).await {
                Ok(html) => parse_fragment(&html, page, &base),
                Err(e) => Err(e),
            };
            match result {
                Ok(parsed) => collected.extend(parsed.postings),
                Err(e) => tracing::warn!("[{}] page {page} failed: {e}", site.name),
            }
        }

        let source = site.source_tag(self.name());
        Ok(collected.into_iter().map(|p| p.finish(&source)).collect())
    }
}

fn origin(url: &str) -> Result<String, AppError> {
    let parsed = url::Url::parse(url)?;
    Ok(parsed.origin().ascii_serialization())
}

async fn fetch_fragment(
    client: &Client,
    url: &str,
    referer: &str,
    query: &[(String, String)],
) -> Result<String, AppError> {
    let resp = client
        .get(url)
        .header("Accept", "application/json, text/javascript, */*; q=0.01")
        .header("Referer", referer)
        .query(query)
        .send()
        .await?;
    let data = http::json_body(resp).await?;
    Ok(data
        .get("results")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

#[derive(Debug)]
struct ResultsPage {
    postings: Vec<NewPosting>,
    current: u32,
    total: u32,
}

impl ResultsPage {
    /// Pages still to request after this one, capped at `max_pages` more.
    fn remaining(&self, max_pages: u32) -> std::ops::RangeInclusive<u32> {
        let last = self.total.min(self.current.saturating_add(max_pages));
        self.current.saturating_add(1)..=last
    }
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::selector(css, e))
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse one results fragment. Missing or non-numeric page counters mean a
/// single page.
fn parse_fragment(html: &str, requested: u32, base: &str) -> Result<ResultsPage, AppError> {
    let doc = Html::parse_fragment(html);
    let section_sel = selector("section#search-results")?;
    let item_sel = selector("#search-results-list ul > li")?;
    let link_sel = selector("a[data-job-id]")?;
    let title_sel = selector("h2")?;
    let location_sel = selector(".job-location")?;

    let section = doc.select(&section_sel).next();
    let counter = |attr: &str| {
        section
            .and_then(|s| s.value().attr(attr))
            .and_then(|v| v.trim().parse::<u32>().ok())
    };
    let total = counter("data-total-pages").unwrap_or(1).max(1);
    let current = counter("data-current-page").unwrap_or(requested).min(total);

    let mut postings = Vec::new();
    for item in doc.select(&item_sel) {
        let Some(link) = item.select(&link_sel).next() else {
            continue;
        };
        let title = link
            .select(&title_sel)
            .next()
            .map(collapsed_text)
            .unwrap_or_default();
        let location = item
            .select(&location_sel)
            .next()
            .map(|el| collapsed_text(el).replace("Site: ", "").trim().to_string())
            .unwrap_or_default();

        postings.push(NewPosting {
            id: link.value().attr("data-job-id").unwrap_or_default().to_string(),
            title,
            location,
            url: resolve_url(base, link.value().attr("href").unwrap_or_default()),
        });
    }

    Ok(ResultsPage {
        postings,
        current,
        total,
    })
}
