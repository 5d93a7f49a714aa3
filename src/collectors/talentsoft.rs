use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::collectors::{Collector, resolve_url};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig, url_id};

/// Reference formats seen in Talentsoft offer URLs: `2024-1234`, `R0123456`, `ABC12345`.
static OFFER_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d+|R\d{6,}|[A-Z]{1,4}\d{5,})").expect("offer reference pattern")
});

#[derive(Debug, Deserialize)]
struct Params {
    url: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default = "default_link_selector")]
    link_selector: String,
    #[serde(default)]
    referer: Option<String>,
}

fn default_link_selector() -> String {
    r#"a[href*="/job/"]"#.to_string()
}

/// Server-rendered Talentsoft offer list, already filtered by the URL's facets.
pub struct Talentsoft;

#[async_trait]
impl Collector for Talentsoft {
    fn name(&self) -> &str {
        "talentsoft"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let base = match &params.base {
            Some(base) => base.clone(),
            None => url::Url::parse(&params.url)?.origin().ascii_serialization(),
        };

        let client = http::client(site.timeout())?;
        let mut req = client
            .get(&params.url)
            .header("Accept", "text/html,application/xhtml+xml");
        if let Some(referer) = &params.referer {
            req = req.header("Referer", referer);
        }
        let resp = http::ensure_success(req.send().await?).await?;
        let html = resp.text().await?;

        let source = site.source_tag(self.name());
        Ok(parse_listing(&html, &params.link_selector, &base)?
            .into_iter()
            .map(|p| p.finish(&source))
            .collect())
    }
}

fn offer_id(url: &str) -> String {
    OFFER_REF
        .captures(url)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| url_id(url))
}

/// Every anchor matching `link_selector` with a text and an href is an offer.
/// Offers repeated on the page (teaser + title link) are kept once.
fn parse_listing(html: &str, link_selector: &str, base: &str) -> Result<Vec<NewPosting>, AppError> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(link_selector).map_err(|e| AppError::selector(link_selector, e))?;

    let mut seen = HashSet::new();
    let mut offers = Vec::new();
    for a in doc.select(&sel) {
        let title = a.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
        let href = a.value().attr("href").unwrap_or_default();
        if title.is_empty() || href.is_empty() {
            continue;
        }

        let url = resolve_url(base, href);
        let id = offer_id(&url);
        if !seen.insert(id.clone()) {
            continue;
        }
        offers.push(NewPosting {
            id,
            title,
            location: String::new(),
            url,
        });
    }
    Ok(offers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
  <ul class="ts-offer-list">
    <li><a href="/offre-de-emploi/job/emploi-vie-controleur-de-gestion_2024-1234.aspx">VIE Contrôleur de gestion</a></li>
    <li><a href="/offre-de-emploi/job/emploi-vie-controleur-de-gestion_2024-1234.aspx">VIE Contrôleur de gestion</a></li>
    <li><a href="https://recrutement.example.com/job/R0012345">VIE Ingénieur</a></li>
    <li><a href="/job/sans-reference"> VIE Acheteur </a></li>
    <li><a href="/job/empty"></a></li>
    <li><a href="/about">About</a></li>
  </ul>
</body></html>"#;

    #[test]
    fn scrapes_offer_links_with_ids() {
        let offers = parse_listing(LISTING, &default_link_selector(), "https://recrutement.example.com").unwrap();
        assert_eq!(offers.len(), 3);

        assert_eq!(offers[0].id, "2024-1234");
        assert_eq!(offers[0].title, "VIE Contrôleur de gestion");
        assert!(offers[0].url.starts_with("https://recrutement.example.com/offre-de-emploi/"));

        assert_eq!(offers[1].id, "R0012345");
        assert_eq!(offers[2].title, "VIE Acheteur");
        assert_eq!(offers[2].id, url_id("https://recrutement.example.com/job/sans-reference"));
        assert_eq!(offers[2].location, "");
    }

    #[test]
    fn invalid_selector_is_reported() {
        let err = parse_listing(LISTING, "a[[", "https://x").unwrap_err();
        assert!(matches!(err, AppError::Selector { .. }));
    }
}
