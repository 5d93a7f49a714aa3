//! Workday CxS job search.
//!
//! The `/wday/cxs/<tenant>/<site>/jobs` endpoint refuses requests that do not
//! carry the cookies and referer of the public career site, so every fetch
//! primes a cookie session with a GET on the site page first. Some tenants
//! also reject particular body shapes, so the request walks a fixed list of
//! fallback payloads before giving up.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::collectors::{Collector, first_text};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

/// `workerSubType` facet value for VIE contracts.
const VIE_FACET_ID: &str = "1bc7ee912dc9100bd4a826d6e65d0000";

static REQUISITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(REQ\d+)").expect("requisition pattern"));

#[derive(Debug, Deserialize)]
struct HeuristicParams {
    base_url: String,
    #[serde(default = "default_search_text")]
    search_text: String,
    #[serde(default = "default_facet_id")]
    facet_id: String,
    #[serde(default = "default_limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    base_url: String,
    #[serde(default)]
    body: Value,
    #[serde(default = "default_facet_id")]
    facet_id: String,
}

fn default_search_text() -> String {
    "VIE".to_string()
}

fn default_facet_id() -> String {
    VIE_FACET_ID.to_string()
}

fn default_limit() -> u32 {
    100
}

/// Workday tenant queried with a search text, then facet, then unfiltered.
pub struct Workday;

/// Workday tenant queried with exactly the body given in config.
pub struct WorkdayRaw;

#[async_trait]
impl Collector for Workday {
    fn name(&self) -> &str {
        "workday"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: HeuristicParams = site.params()?;
        let attempts = heuristic_attempts(&params);
        let session = Session::open(&params.base_url, site).await?;
        let data = session.first_accepted(&attempts, &site.name).await?;
        Ok(parse_postings(&data, &session.root, &site.source_tag(self.name())))
    }
}

#[async_trait]
impl Collector for WorkdayRaw {
    fn name(&self) -> &str {
        "workday"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: RawParams = site.params()?;
        let attempts = raw_attempts(&params);
        let session = Session::open(&params.base_url, site).await?;
        let data = session.first_accepted(&attempts, &site.name).await?;
        Ok(parse_postings(&data, &session.root, &site.source_tag(self.name())))
    }
}

/// One request shape to try against the jobs endpoint.
#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    Post(Value),
    Get(Vec<(String, String)>),
}

fn facet_query(limit: u64, facet_id: &str) -> Attempt {
    Attempt::Get(vec![
        ("limit".to_string(), limit.to_string()),
        ("offset".to_string(), "0".to_string()),
        ("appliedFacets".to_string(), format!("workerSubType:{facet_id}")),
    ])
}

fn heuristic_attempts(params: &HeuristicParams) -> Vec<Attempt> {
    let limit = params.limit;
    vec![
        Attempt::Post(json!({ "limit": limit, "offset": 0, "searchText": params.search_text })),
        Attempt::Post(json!({
            "limit": limit,
            "offset": 0,
            "appliedFacets": { "workerSubType": [params.facet_id] }
        })),
        Attempt::Post(json!({ "limit": limit, "offset": 0 })),
        facet_query(u64::from(limit), &params.facet_id),
    ]
}

fn raw_attempts(params: &RawParams) -> Vec<Attempt> {
    let body = if params.body.is_object() {
        params.body.clone()
    } else {
        json!({})
    };
    let limit = body.get("limit").and_then(|v| v.as_u64()).unwrap_or(20);
    let offset = body.get("offset").and_then(|v| v.as_u64()).unwrap_or(0);
    vec![
        Attempt::Post(body),
        Attempt::Post(json!({
            "limit": limit,
            "offset": offset,
            "appliedFacets": { "workerSubType": [params.facet_id] }
        })),
        Attempt::Post(json!({ "limit": limit, "offset": offset })),
        facet_query(limit, &params.facet_id),
    ]
}

/// Split the API URL into the site root and the career page used as referer:
/// `https://t.wd3.myworkdayjobs.com/wday/cxs/t/Careers/jobs` gives
/// `https://t.wd3.myworkdayjobs.com` and `https://t.wd3.myworkdayjobs.com/Careers`.
fn endpoint_parts(base_url: &str) -> Result<(String, String), AppError> {
    let parsed = url::Url::parse(base_url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::config(format!("no host in '{base_url}'")))?;
    let root = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };

    let segs: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
    let referer = if segs.len() >= 2 {
        format!("{root}/{}", segs[segs.len() - 2])
    } else {
        root.clone()
    };
    Ok((root, referer))
}

struct Session {
    client: Client,
    base_url: String,
    root: String,
    referer: String,
}

impl Session {
    /// Build a cookie-keeping client and prime it from the career page.
    /// A failed priming GET is logged; the API call may still succeed.
    async fn open(base_url: &str, site: &SiteConfig) -> Result<Self, AppError> {
        let (root, referer) = endpoint_parts(base_url)?;
        let client = http::session_client(site.timeout())?;

        let primed = client
            .get(&referer)
            .header("Accept", http::ACCEPT_HTML)
            .header("Accept-Language", http::ACCEPT_LANGUAGE)
            .send()
            .await;
        if let Err(e) = primed {
            tracing::warn!("[{}] priming GET {referer} failed: {e}", site.name);
        }

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            root,
            referer,
        })
    }

    async fn send(&self, attempt: &Attempt) -> Result<Value, AppError> {
        let req = match attempt {
            Attempt::Post(body) => self
                .client
                .post(&self.base_url)
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .header("Accept-Language", http::ACCEPT_LANGUAGE)
                .header("Origin", &self.root)
                .header("Referer", &self.referer)
                .header("X-Requested-With", "XMLHttpRequest")
                .json(body),
            Attempt::Get(query) => self
                .client
                .get(&self.base_url)
                .header("Accept", "application/json")
                .header("Referer", &self.referer)
                .query(query),
        };
        http::json_body(req.send().await?).await
    }

    /// Try each attempt in order, returning the first decoded response.
    async fn first_accepted(&self, attempts: &[Attempt], site: &str) -> Result<Value, AppError> {
        let mut last_err = None;
        for (idx, attempt) in attempts.iter().enumerate() {
            match self.send(attempt).await {
                Ok(data) => {
                    if idx > 0 {
                        tracing::info!("[{site}] accepted fallback payload #{idx}");
                    }
                    return Ok(data);
                }
                Err(e) => {
                    tracing::debug!("[{site}] payload #{idx} rejected: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(AppError::Payload(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

type IdRule = fn(&Value) -> Option<String>;

/// Identifier sources, most trusted first.
const ID_CHAIN: [IdRule; 5] = [
    explicit_id,
    first_bullet_field,
    requisition_code,
    external_path,
    title,
];

fn explicit_id(p: &Value) -> Option<String> {
    first_text(p, &["id"])
}

fn first_bullet_field(p: &Value) -> Option<String> {
    p.get("bulletFields")?
        .as_array()?
        .first()
        .and_then(crate::collectors::scalar_text)
        .filter(|s| !s.trim().is_empty())
}

fn requisition_code(p: &Value) -> Option<String> {
    let path = first_text(p, &["externalPath"])?;
    REQUISITION.captures(&path).map(|c| c[1].to_string())
}

fn external_path(p: &Value) -> Option<String> {
    first_text(p, &["externalPath"])
}

fn title(p: &Value) -> Option<String> {
    first_text(p, &["title"])
}

fn resolve_id(posting: &Value) -> String {
    ID_CHAIN
        .iter()
        .find_map(|rule| rule(posting))
        .unwrap_or_default()
}

fn location(p: &Value) -> String {
    if let Some(text) = first_text(p, &["locationsText"]) {
        return text;
    }
    match p.get("locations") {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn parse_postings(data: &Value, root: &str, source: &str) -> Vec<Posting> {
    let Some(postings) = data.get("jobPostings").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    postings
        .iter()
        .map(|p| {
            let url = first_text(p, &["externalUrl"]).unwrap_or_else(|| {
                format!("{root}{}", first_text(p, &["externalPath"]).unwrap_or_default())
            });
            NewPosting {
                id: resolve_id(p),
                title: first_text(p, &["title"]).unwrap_or_default(),
                location: location(p),
                url,
            }
            .finish(source)
        })
        .collect()
}
