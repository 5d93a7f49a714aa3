//! Career pages that only render their offers client-side.
//!
//! Drives a [`Browser`]: dismiss the cookie banner if there is one, scroll so
//! lazy lists load, collect offer anchors with the first selector that finds
//! any, then move on with the page's "next" control or a `page=N+1` query.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::browser::{Browser, BrowserSession, Locator};
use crate::collectors::{Collector, query_pairs, resolve_url};
use crate::error::AppError;
use crate::models::{NewPosting, Posting, SiteConfig, href_id};

#[derive(Debug, Clone, Deserialize)]
struct Params {
    url: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
    #[serde(default = "default_link_selectors")]
    link_selectors: Vec<String>,
    #[serde(default = "default_next_selectors")]
    next_selectors: Vec<String>,
    #[serde(default = "default_consent_selectors")]
    consent_selectors: Vec<String>,
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default = "default_navigation_secs")]
    navigation_timeout_secs: u64,
    #[serde(default = "default_idle_secs")]
    idle_timeout_secs: u64,
    #[serde(default = "default_consent_ms")]
    consent_timeout_ms: u64,
    #[serde(default = "default_settle_ms")]
    settle_ms: u64,
}

fn default_max_pages() -> u32 {
    8
}

fn default_link_selectors() -> Vec<String> {
    [
        "article a[href*='/v/']",
        "a.teaser__link[href*='/v/']",
        "a[href*='/v/'][data-drupal-link-system-path]",
        "a[href*='/offre-'][href*='/v/']",
    ]
    .map(String::from)
    .to_vec()
}

fn default_next_selectors() -> Vec<String> {
    [
        "a[rel='next']",
        "li.pager__item--next a",
        "a[aria-label*='Suivant']",
        "xpath=//a[contains(normalize-space(.), 'Suivant')]",
    ]
    .map(String::from)
    .to_vec()
}

fn default_consent_selectors() -> Vec<String> {
    [
        "#onetrust-accept-btn-handler",
        "xpath=//button[contains(normalize-space(.), 'Tout accepter')]",
        "xpath=//button[contains(normalize-space(.), 'Accepter')]",
    ]
    .map(String::from)
    .to_vec()
}

fn default_locale() -> String {
    "fr-FR".to_string()
}

fn default_navigation_secs() -> u64 {
    60
}

fn default_idle_secs() -> u64 {
    45
}

fn default_consent_ms() -> u64 {
    1500
}

fn default_settle_ms() -> u64 {
    800
}

pub struct Rendered {
    browser: Arc<dyn Browser>,
}

impl Rendered {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Collector for Rendered {
    fn name(&self) -> &str {
        "rendered"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let start_url = start_url(&params.url, &params.params)?;
        let base = match &params.base {
            Some(base) => base.clone(),
            None => url::Url::parse(&params.url)?.origin().ascii_serialization(),
        };

        let mut session = self.browser.open(&params.locale).await?;
        let result = crawl(session.as_mut(), &params, &start_url, &base, &site.name).await;
        if let Err(e) = session.close().await {
            tracing::debug!("[{}] closing browser session failed: {e}", site.name);
        }

        let source = site.source_tag(self.name());
        Ok(result?.into_iter().map(|p| p.finish(&source)).collect())
    }
}

fn start_url(url: &str, params: &Map<String, Value>) -> Result<String, AppError> {
    let mut parsed = url::Url::parse(url)?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(query_pairs(params));
    }
    Ok(parsed.to_string())
}

/// `?page=N` -> `?page=N+1`, other query pairs kept in order. A missing or
/// non-numeric page counts as 0. Unparseable URLs come back unchanged.
fn next_page_url(current: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(current) else {
        return current.to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let page = pairs
        .iter()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse::<u64>().ok())
        .unwrap_or(0);

    match pairs.iter_mut().find(|(k, _)| k == "page") {
        Some(pair) => pair.1 = (page + 1).to_string(),
        None => pairs.push(("page".to_string(), (page + 1).to_string())),
    }

    parsed.set_fragment(None);
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

async fn crawl(
    session: &mut dyn BrowserSession,
    params: &Params,
    start_url: &str,
    base: &str,
    site: &str,
) -> Result<Vec<NewPosting>, AppError> {
    let navigation = Duration::from_secs(params.navigation_timeout_secs);
    session.goto(start_url, navigation).await?;

    let consent_timeout = Duration::from_millis(params.consent_timeout_ms);
    for sel in &params.consent_selectors {
        if let Ok(true) = session.click(&Locator::parse(sel), consent_timeout).await {
            break;
        }
    }

    let mut seen_urls = HashSet::new();
    let mut visited = HashSet::from([start_url.to_string()]);
    let mut postings = Vec::new();

    for page in 0..params.max_pages {
        session
            .wait_for_idle(Duration::from_secs(params.idle_timeout_secs))
            .await?;
        session.scroll_to_bottom().await?;
        if params.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(params.settle_ms)).await;
        }

        let mut found = 0;
        for sel in &params.link_selectors {
            let links = session.links(sel).await.unwrap_or_default();
            for link in links {
                if link.href.is_empty() || !seen_urls.insert(link.href.clone()) {
                    continue;
                }
                let url = resolve_url(base, &link.href);
                postings.push(NewPosting {
                    id: href_id(&link.href),
                    title: link.text,
                    location: String::new(),
                    url,
                });
                found += 1;
            }
            if found > 0 {
                break;
            }
        }

        let current = session.current_url().await?;
        tracing::info!("[{site}] {found} link(s) on {current}");
        if page + 1 == params.max_pages {
            break;
        }

        let mut advanced = false;
        for sel in &params.next_selectors {
            let locator = Locator::parse(sel);
            if session.exists(&locator).await.unwrap_or(false) {
                advanced = session.click(&locator, Duration::ZERO).await?;
                break;
            }
        }
        if advanced {
            continue;
        }

        let next = next_page_url(&current);
        if next == current || !visited.insert(next.clone()) {
            break;
        }
        session.goto(&next, navigation).await?;
    }

    Ok(postings)
}
