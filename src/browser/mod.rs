//! Browser automation behind a small trait, so the rendered-page collector can
//! run against a real WebDriver or a stub.

pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;

pub use webdriver::WebDriver;

/// How to find an element. Config strings prefixed with `xpath=` (or starting
/// with `/` or `(`) are XPath, anything else is CSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(xpath) = raw.strip_prefix("xpath=") {
            Locator::XPath(xpath.to_string())
        } else if raw.starts_with('/') || raw.starts_with('(') {
            Locator::XPath(raw.to_string())
        } else {
            Locator::Css(raw.to_string())
        }
    }
}

/// An anchor as the page rendered it: absolute href and visible text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
}

#[async_trait]
pub trait Browser: Send + Sync {
    /// Start a fresh session (new profile, no cookies).
    async fn open(&self, locale: &str) -> Result<Box<dyn BrowserSession>, AppError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AppError>;

    async fn current_url(&mut self) -> Result<String, AppError>;

    /// Click the first element matching `locator`, waiting up to `timeout` for
    /// it to appear. `Ok(false)` when nothing matched in time.
    async fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, AppError>;

    async fn exists(&mut self, locator: &Locator) -> Result<bool, AppError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), AppError>;

    /// Wait until the document is loaded and no new resources arrived for a
    /// short quiet period.
    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), AppError>;

    /// Anchors matching a CSS selector.
    async fn links(&mut self, css: &str) -> Result<Vec<Link>, AppError>;

    async fn close(self: Box<Self>) -> Result<(), AppError>;
}
