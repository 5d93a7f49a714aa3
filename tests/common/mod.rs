#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use jobwatch::browser::{Browser, BrowserSession};
use jobwatch::collectors::{CollectorSet, Collectors};
use jobwatch::error::AppError;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Browser for runs that have no rendered sources.
pub struct NoBrowser;

#[async_trait]
impl Browser for NoBrowser {
    async fn open(&self, _locale: &str) -> Result<Box<dyn BrowserSession>, AppError> {
        Err(AppError::browser("no browser in tests"))
    }
}

pub fn collectors() -> Arc<dyn CollectorSet> {
    Arc::new(Collectors::new(Arc::new(NoBrowser)))
}
