use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::collectors::{Collector, first_text};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

const API_BASE: &str = "https://api.lever.co";

#[derive(Debug, Deserialize)]
struct Params {
    company: String,
    #[serde(default = "default_api_base")]
    api_base: String,
}

fn default_api_base() -> String {
    API_BASE.to_string()
}

/// Lever postings API. The response body is a bare array.
pub struct Lever;

#[async_trait]
impl Collector for Lever {
    fn name(&self) -> &str {
        "lever"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let url = format!(
            "{}/v0/postings/{}?mode=json",
            params.api_base.trim_end_matches('/'),
            params.company
        );

        let client = http::client(site.timeout())?;
        let resp = client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let data = http::json_body(resp).await?;

        parse_postings(&data, &site.source_tag(self.name()))
    }
}

fn parse_postings(data: &Value, source: &str) -> Result<Vec<Posting>, AppError> {
    let postings = data
        .as_array()
        .ok_or_else(|| AppError::shape("Lever response is not an array"))?;

    Ok(postings
        .iter()
        .map(|p| {
            NewPosting {
                id: first_text(p, &["id"]).unwrap_or_default(),
                title: first_text(p, &["text"]).unwrap_or_default(),
                location: p
                    .get("categories")
                    .and_then(|c| first_text(c, &["location"]))
                    .map(|loc| normalize_location(&loc))
                    .unwrap_or_default(),
                url: first_text(p, &["hostedUrl", "applyUrl"]).unwrap_or_default(),
            }
            .finish(source)
        })
        .collect())
}

/// "Paris,Lyon" -> "Paris, Lyon"
fn normalize_location(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_postings_array() {
        let data = json!([
            {
                "id": "a1b2",
                "text": "VIE Sales",
                "categories": { "location": "Paris,Lyon" },
                "hostedUrl": "https://jobs.lever.co/acme/a1b2"
            },
            {
                "id": "c3",
                "text": "Ops",
                "applyUrl": "https://jobs.lever.co/acme/c3/apply"
            }
        ]);

        let postings = parse_postings(&data, "lever").unwrap();
        assert_eq!(postings[0].location(), "Paris, Lyon");
        assert_eq!(postings[0].url(), "https://jobs.lever.co/acme/a1b2");
        assert_eq!(postings[1].location(), "");
        assert_eq!(postings[1].url(), "https://jobs.lever.co/acme/c3/apply");
    }

    #[test]
    fn object_body_is_rejected() {
        assert!(parse_postings(&json!({ "ok": false }), "lever").is_err());
    }
}
