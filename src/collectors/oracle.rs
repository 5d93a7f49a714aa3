use std::future::Future;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::collectors::{Collector, first_text, query_pairs};
use crate::error::AppError;
use crate::http;
use crate::models::{NewPosting, Posting, SiteConfig};

const DEFAULT_LIMIT: u64 = 50;
const DEFAULT_MAX_PAGES: u32 = 50;

#[derive(Debug, Deserialize)]
struct Params {
    base_url: String,
    /// Query parameters, e.g. `finder`, `expand`, `onlyData`, `limit`, `offset`.
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

/// Oracle Recruiting Cloud `recruitingCEJobRequisitions`, paged by offset.
pub struct OracleOrc;

#[async_trait]
impl Collector for OracleOrc {
    fn name(&self) -> &str {
        "oracle_orc"
    }

    async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        let params: Params = site.params()?;
        let limit = number_param(&params.params, "limit").unwrap_or(DEFAULT_LIMIT).max(1);
        let start = number_param(&params.params, "offset").unwrap_or(0);

        let client = http::client(site.timeout())?;
        let mut base_query = params.params.clone();
        base_query.remove("limit");
        base_query.remove("offset");
        let base_query = query_pairs(&base_query);

        let records = paginate(limit, start, params.max_pages, &site.name, |offset| {
            let req = client
                .get(&params.base_url)
                .header("Accept", "application/json")
                .query(&base_query)
                .query(&[("offset", offset), ("limit", limit)]);
            async move { http::json_body(req.send().await?).await }
        })
        .await?;

        let source = site.source_tag(self.name());
        Ok(records.iter().map(|r| map_requisition(r, &source)).collect())
    }
}

fn number_param(params: &Map<String, Value>, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Request pages at `start`, `start + limit`, ... until the backend says
/// there is nothing more or a page comes back short. A failed first page fails
/// the source; a failed later page is skipped and the next offset is tried.
async fn paginate<F, Fut>(
    limit: u64,
    start: u64,
    max_pages: u32,
    site: &str,
    mut fetch: F,
) -> Result<Vec<Value>, AppError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    let mut records = Vec::new();
    let mut offset = start;

    for page in 0..max_pages.max(1) {
        match fetch(offset).await {
            Ok(data) => {
                let batch = flatten_items(&data);
                let count = batch.len() as u64;
                records.extend(batch);

                let has_more = data.get("hasMore").and_then(|v| v.as_bool()).unwrap_or(false);
                if !has_more || count < limit {
                    break;
                }
            }
            Err(e) if page == 0 => return Err(e),
            Err(e) => tracing::warn!("[{site}] page at offset {offset} failed: {e}"),
        }
        offset += limit;
    }

    Ok(records)
}

/// Items sometimes wrap their requisitions in a `requisitionList`.
fn flatten_items(data: &Value) -> Vec<Value> {
    let Some(items) = data.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.get("requisitionList").and_then(|v| v.as_array()) {
            Some(list) => out.extend(list.iter().cloned()),
            None => out.push(item.clone()),
        }
    }
    out
}

fn map_requisition(rec: &Value, source: &str) -> Posting {
    let title = first_text(rec, &["PostingTitle", "Title", "Name"]);
    let id = first_text(rec, &["Id", "JobRequisitionId", "RequisitionNumber", "Number"])
        .or_else(|| title.clone())
        .unwrap_or_default();

    let location = first_text(
        rec,
        &["PrimaryLocationFullName", "PrimaryLocationName", "Location"],
    )
    .unwrap_or_else(|| {
        ["PrimaryLocationCity", "PrimaryLocationState", "PrimaryLocationCountry"]
            .iter()
            .filter_map(|k| first_text(rec, &[*k]))
            .collect::<Vec<_>>()
            .join(", ")
    });

    let url = first_text(rec, &["ExternalURL", "ExternalUrl", "jobPostingUrl"])
        .or_else(|| {
            rec.get("links")?
                .as_array()?
                .iter()
                .find_map(|l| first_text(l, &["href"]))
        })
        .unwrap_or_default();

    NewPosting {
        id,
        title: title.unwrap_or_else(|| "(untitled)".to_string()),
        location,
        url,
    }
    .finish(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use serde_json::json;

    fn page(n: usize, has_more: bool) -> Value {
        let items: Vec<Value> = (0..n).map(|i| json!({ "Id": i, "Title": "VIE" })).collect();
        json!({ "items": items, "hasMore": has_more })
    }

    #[tokio::test]
    async fn stops_at_first_short_page() {
        let pages = [page(50, true), page(50, true), page(30, true), page(50, true)];
        let calls = RefCell::new(Vec::new());

        let records = paginate(50, 0, 10, "test", |offset| {
            calls.borrow_mut().push(offset);
            let data = pages[calls.borrow().len() - 1].clone();
            async move { Ok(data) }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 130);
        assert_eq!(*calls.borrow(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn stops_when_backend_reports_no_more() {
        let calls = RefCell::new(0);
        let records = paginate(10, 0, 10, "test", |_| {
            *calls.borrow_mut() += 1;
            async { Ok(page(10, false)) }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn nested_requisition_lists_count_toward_page_size() {
        let wrapped = json!({
            "items": [{ "requisitionList": [ { "Id": 1 }, { "Id": 2 } ] }],
            "hasMore": true
        });
        let calls = RefCell::new(0);
        let records = paginate(2, 0, 10, "test", |_| {
            *calls.borrow_mut() += 1;
            let data = if *calls.borrow() == 1 { wrapped.clone() } else { page(1, true) };
            async move { Ok(data) }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn later_page_failure_keeps_earlier_records() {
        let calls = RefCell::new(0);
        let records = paginate(5, 0, 10, "test", |_| {
            *calls.borrow_mut() += 1;
            let n = *calls.borrow();
            async move {
                match n {
                    1 => Ok(page(5, true)),
                    2 => Err(AppError::shape("boom")),
                    _ => Ok(page(2, true)),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 7);
        assert_eq!(*calls.borrow(), 3);
    }

    #[tokio::test]
    async fn first_page_failure_fails_the_source() {
        let result = paginate(5, 0, 10, "test", |_| async { Err(AppError::shape("down")) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn max_pages_caps_the_walk() {
        let calls = RefCell::new(0);
        let records = paginate(1, 0, 3, "test", |_| {
            *calls.borrow_mut() += 1;
            async { Ok(page(1, true)) }
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn requisition_field_chains() {
        let rec = json!({
            "RequisitionNumber": "R-1",
            "Name": "VIE Controller",
            "PrimaryLocationCity": "Lyon",
            "PrimaryLocationCountry": "FR",
            "links": [ { "rel": "self" }, { "href": "https://orc/job/R-1" } ]
        });
        let p = map_requisition(&rec, "oracle_orc");
        assert_eq!(p.id(), "R-1");
        assert_eq!(p.title(), "VIE Controller");
        assert_eq!(p.location(), "Lyon, FR");
        assert_eq!(p.url(), "https://orc/job/R-1");

        let bare = map_requisition(&json!({ "PostingTitle": "Only title" }), "oracle_orc");
        assert_eq!(bare.id(), "Only title");

        let untitled = map_requisition(&json!({ "Id": 9 }), "oracle_orc");
        assert_eq!(untitled.title(), "(untitled)");
    }
}
