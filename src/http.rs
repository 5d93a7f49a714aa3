//! Shared HTTP plumbing for collectors and notifiers.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::AppError;

pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125 Safari/537.36";

pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "fr-FR,fr;q=0.9,en;q=0.8";

/// Plain client with a browser user agent and a hard request timeout.
pub fn client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(BROWSER_UA)
        .timeout(timeout)
        .build()
        .map_err(AppError::Http)
}

/// Client that keeps cookies between requests, for backends that want a
/// session primed from their human-facing pages first.
pub fn session_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(BROWSER_UA)
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(AppError::Http)
}

/// Turn a non-2xx response into [`AppError::Status`], keeping a body excerpt
/// for the logs.
pub async fn ensure_success(resp: Response) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::Status {
        url,
        status: status.as_u16(),
        body: body.chars().take(400).collect(),
    })
}

/// Check the status, then decode the body as JSON.
pub async fn json_body(resp: Response) -> Result<Value, AppError> {
    let resp = ensure_success(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
