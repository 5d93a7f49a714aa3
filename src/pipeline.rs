//! The orchestrator: fetch every configured source, filter, partition into
//! seen and new, and report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::collectors::{CollectorSet, SourceKind};
use crate::error::AppError;
use crate::filter::Keywords;
use crate::models::{Posting, SiteConfig};
use crate::store::SeenSet;

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    pub name: String,
    pub kind: String,
    pub fetched: usize,
    pub matched: usize,
    pub new: usize,
    pub error: Option<String>,
}

/// Result of one pass over all sources.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// New postings in discovery order.
    pub new_postings: Vec<Posting>,
    /// The identity set seeded from the store, plus every new fingerprint.
    pub seen: SeenSet,
    pub sources: Vec<SourceOutcome>,
    /// Set when the seen set could not be written back after the pass.
    pub persist_error: Option<String>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        match self.new_postings.len() {
            0 => "no new postings".to_string(),
            n => format!("{n} new postings"),
        }
    }

    /// Aggregated notification body, or `None` when nothing is new.
    pub fn message(&self) -> Option<String> {
        if self.new_postings.is_empty() {
            return None;
        }
        let mut lines = Vec::with_capacity(self.new_postings.len() + 1);
        lines.push(format!("{}:", self.summary()));
        lines.extend(self.new_postings.iter().map(Posting::digest_line));
        Some(lines.join("\n"))
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

pub struct Orchestrator {
    collectors: Arc<dyn CollectorSet>,
    keywords: Keywords,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(collectors: Arc<dyn CollectorSet>, keywords: Keywords) -> Self {
        Self {
            collectors,
            keywords,
            concurrency: 1,
        }
    }

    /// Number of sources fetched at once. Results are still merged in
    /// configuration order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run every source once against `seen`. Source failures are recorded in
    /// the report and never abort the run.
    pub async fn run(&self, sites: &[SiteConfig], mut seen: SeenSet) -> RunReport {
        let started_at = Utc::now();
        let fetched: Vec<_> = futures::stream::iter(sites.iter().map(|site| self.fetch(site)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut new_postings = Vec::new();
        let mut sources = Vec::with_capacity(sites.len());

        for (site, result) in sites.iter().zip(fetched) {
            let mut outcome = SourceOutcome {
                name: site.name.clone(),
                kind: site.kind.clone(),
                fetched: 0,
                matched: 0,
                new: 0,
                error: None,
            };

            let postings = match result {
                Ok(postings) => postings,
                Err(e) => {
                    outcome.error = Some(e.to_string());
                    sources.push(outcome);
                    continue;
                }
            };
            outcome.fetched = postings.len();

            for posting in postings {
                if !self.keywords.admits(&posting, site.pre_filtered) {
                    continue;
                }
                outcome.matched += 1;
                // Inserted right away so a repeat later in the run is not new again.
                if seen.insert(posting.fingerprint()) {
                    outcome.new += 1;
                    new_postings.push(posting);
                }
            }

            tracing::info!(
                "[{}] {} fetched, {} matched, {} new",
                site.name,
                outcome.fetched,
                outcome.matched,
                outcome.new
            );
            sources.push(outcome);
        }

        RunReport {
            started_at,
            new_postings,
            seen,
            sources,
            persist_error: None,
        }
    }

    async fn fetch(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
        tracing::info!("Checking {} [{}]", site.name, site.kind);

        let kind = match site.kind.parse::<SourceKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!("[{}] {e}", site.name);
                return Err(e);
            }
        };

        let collector = self.collectors.collector(kind);
        match collector.collect(site).await {
            Ok(postings) => Ok(postings),
            Err(e) => {
                tracing::warn!("[{}] {} failed: {e}", site.name, collector.name());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Collector;
    use crate::models::NewPosting;
    use async_trait::async_trait;
    use serde_json::json;

    /// Serves canned postings keyed by the site's `company` parameter.
    /// `company = "down"` fails like an upstream 500.
    struct Canned;

    #[async_trait]
    impl Collector for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn collect(&self, site: &SiteConfig) -> Result<Vec<Posting>, AppError> {
            let company = site.params.get("company").and_then(|v| v.as_str()).unwrap_or_default();
            if company == "down" {
                return Err(AppError::Status {
                    url: "http://upstream/down".into(),
                    status: 500,
                    body: String::new(),
                });
            }
            let titles = site
                .params
                .get("titles")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            Ok(titles
                .iter()
                .filter_map(|t| t.as_str())
                .map(|title| {
                    NewPosting {
                        id: format!("{company}-{title}"),
                        title: title.to_string(),
                        location: "Paris".into(),
                        url: format!("https://{company}.example/{}", title.replace(' ', "-")),
                    }
                    .finish(&site.source_tag(company))
                })
                .collect())
        }
    }

    struct CannedSet;

    impl CollectorSet for CannedSet {
        fn collector(&self, _kind: SourceKind) -> Arc<dyn Collector> {
            Arc::new(Canned)
        }
    }

    fn site(name: &str, kind: &str, extra: serde_json::Value) -> SiteConfig {
        let mut v = json!({ "name": name, "type": kind });
        if let (Some(obj), Some(extra)) = (v.as_object_mut(), extra.as_object()) {
            obj.extend(extra.clone());
        }
        serde_json::from_value(v).unwrap()
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(CannedSet), Keywords::new(["VIE"]))
    }

    #[tokio::test]
    async fn failed_source_does_not_stop_the_others() {
        let sites = vec![
            site("A", "greenhouse", json!({ "company": "a", "titles": ["VIE One", "VIE Two"] })),
            site("B", "greenhouse", json!({ "company": "down" })),
            site("C", "lever", json!({ "company": "c", "titles": ["VIE Three"] })),
        ];

        let report = orchestrator().run(&sites, SeenSet::new()).await;
        let titles: Vec<_> = report.new_postings.iter().map(|p| p.title()).collect();
        assert_eq!(titles, ["VIE One", "VIE Two", "VIE Three"]);
        assert_eq!(report.seen.len(), 3);
        assert_eq!(report.summary(), "3 new postings");

        let failed: Vec<_> = report.failed_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(failed, ["B"]);
    }

    #[tokio::test]
    async fn unknown_type_is_a_recorded_soft_error() {
        let sites = vec![
            site("odd", "smartrecruiters", json!({ "company": "x", "titles": ["VIE"] })),
            site("ok", "greenhouse", json!({ "company": "a", "titles": ["VIE One"] })),
        ];

        let report = orchestrator().run(&sites, SeenSet::new()).await;
        assert_eq!(report.new_postings.len(), 1);
        let error = report.sources[0].error.as_deref().unwrap();
        assert!(error.contains("smartrecruiters"));
        assert_eq!(report.sources[1].error, None);
    }

    #[tokio::test]
    async fn keywords_filter_unless_pre_filtered() {
        let sites = vec![
            site("plain", "greenhouse", json!({ "company": "a", "titles": ["Graduate", "VIE Buyer"] })),
            site(
                "trusted",
                "greenhouse",
                json!({ "company": "b", "pre_filtered": true, "titles": ["Graduate", "Intern"] }),
            ),
        ];

        let report = orchestrator().run(&sites, SeenSet::new()).await;
        assert_eq!(report.sources[0].fetched, 2);
        assert_eq!(report.sources[0].matched, 1);
        assert_eq!(report.sources[1].matched, 2);
        assert_eq!(report.new_postings.len(), 3);
    }

    #[tokio::test]
    async fn repeats_within_a_run_are_new_once() {
        let sites = vec![
            site("first", "greenhouse", json!({ "company": "a", "titles": ["VIE One", "VIE One"] })),
            site("again", "greenhouse", json!({ "company": "a", "titles": ["VIE One"] })),
        ];

        let report = orchestrator().run(&sites, SeenSet::new()).await;
        assert_eq!(report.new_postings.len(), 1);
        assert_eq!(report.sources[0].matched, 2);
        assert_eq!(report.sources[0].new, 1);
        assert_eq!(report.sources[1].new, 0);
    }

    #[tokio::test]
    async fn second_run_with_same_seen_set_finds_nothing() {
        let sites = vec![site("A", "greenhouse", json!({ "company": "a", "titles": ["VIE One"] }))];
        let orch = orchestrator();

        let first = orch.run(&sites, SeenSet::new()).await;
        let before = first.seen.clone();
        let second = orch.run(&sites, first.seen).await;

        assert!(second.new_postings.is_empty());
        assert_eq!(second.summary(), "no new postings");
        assert_eq!(second.message(), None);
        assert!(second.seen.is_superset(&before));
    }

    #[tokio::test]
    async fn concurrent_fetch_keeps_configuration_order() {
        let sites: Vec<_> = (0..6)
            .map(|i| {
                site(
                    &format!("s{i}"),
                    "greenhouse",
                    json!({ "company": format!("c{i}"), "titles": [format!("VIE {i}")] }),
                )
            })
            .collect();

        let report = orchestrator().with_concurrency(4).run(&sites, SeenSet::new()).await;
        let titles: Vec<_> = report.new_postings.iter().map(|p| p.title().to_string()).collect();
        assert_eq!(titles, (0..6).map(|i| format!("VIE {i}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn message_lists_every_new_posting() {
        let sites = vec![site(
            "A",
            "greenhouse",
            json!({ "company": "acme", "source": "acme-board", "titles": ["VIE Analyst"] }),
        )];

        let report = orchestrator().run(&sites, SeenSet::new()).await;
        assert_eq!(
            report.message().unwrap(),
            "1 new postings:\n- VIE Analyst | Paris [acme-board]\nhttps://acme.example/VIE-Analyst"
        );
    }
}
