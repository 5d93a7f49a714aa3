use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::collectors::{Collector, first_text};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

const API_BASE: &str = "https://boards-api.greenhouse.io";

#[derive(Debug, Deserialize)]
struct Params {
    company: String,
    #[serde(default = "default_api_base")]
    api_base: String,
}

fn default_api_base() -> String {
    API_BASE.to_string()
}

/// Greenhouse job board API: one GET per company board.
pub struct Greenhouse;

#[async_trait]
impl Collector for Greenhouse {
    fn name(&self) -> &str {
        "greenhouse"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let url = format!(
            "{}/v1/boards/{}/jobs?content=true",
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

        parse_jobs(&data, &site.source_tag(self.name()))
    }
}

fn parse_jobs(data: &Value, source: &str) -> Result<Vec<Posting>, AppError> {
    let jobs = data
        .get("jobs")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AppError::shape("missing 'jobs' in Greenhouse response"))?;

    Ok(jobs
        .iter()
        .map(|job| {
            NewPosting {
                id: first_text(job, &["id"]).unwrap_or_default(),
                title: first_text(job, &["title"]).unwrap_or_default(),
                location: job
                    .get("location")
                    .and_then(|l| first_text(l, &["name"]))
                    .unwrap_or_default(),
                url: first_text(job, &["absolute_url"]).unwrap_or_default(),
            }
            .finish(source)
        })
        .collect())
}
