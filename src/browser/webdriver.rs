//! W3C WebDriver client over `reqwest`, enough to drive chromedriver or
//! geckodriver for listing pages.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};

use crate::browser::{Browser, BrowserSession, Link, Locator};
use crate::error::AppError;

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL: Duration = Duration::from_millis(250);
const QUIET_POLLS: u32 = 2;

const LINKS_SCRIPT: &str = "return Array.from(document.querySelectorAll(arguments[0])).map(e => ({ href: e.href || '', text: (e.innerText || e.textContent || '').trim() }));";
const LOAD_STATE_SCRIPT: &str = "return [document.readyState, performance.getEntriesByType('resource').length];";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

pub struct WebDriver {
    endpoint: String,
    client: Client,
    headless: bool,
}

impl WebDriver {
    pub fn new(endpoint: &str, headless: bool) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            headless,
        })
    }

    fn capabilities(&self, locale: &str) -> Value {
        let mut args = vec![
            format!("--lang={locale}"),
            "--window-size=1366,900".to_string(),
            "--disable-gpu".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": { "intl.accept_languages": locale }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Browser for WebDriver {
    async fn open(&self, locale: &str) -> Result<Box<dyn BrowserSession>, AppError> {
        let url = format!("{}/session", self.endpoint);
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities(locale))).await?;
        let id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::browser("new session response has no sessionId"))?;

        tracing::debug!("WebDriver session {id} opened");
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{id}", self.endpoint),
        }))
    }
}

/// Issue one command and unwrap the `value` envelope. Driver-side errors come
/// back as `{"value": {"error": ..., "message": ...}}`.
async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, AppError> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let data: Value = resp.json().await.unwrap_or(Value::Null);
    let value = data.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error");
        let message = value.get("message").and_then(|v| v.as_str()).unwrap_or_default();
        return Err(AppError::browser(format!("{status} {error}: {message}")));
    }
    Ok(value)
}

struct WebDriverSession {
    client: Client,
    base: String,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, AppError> {
        send(&self.client, method, &format!("{}{path}", self.base), body).await
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, AppError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<String>, AppError> {
        let (using, value) = match locator {
            Locator::Css(css) => ("css selector", css),
            Locator::XPath(xpath) => ("xpath", xpath),
        };
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;

        Ok(found
            .as_array()
            .map(|els| {
                els.iter()
                    .filter_map(|e| e.get(ELEMENT_KEY).and_then(|id| id.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AppError> {
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({ "pageLoad": timeout.as_millis() as u64 })),
        )
        .await?;
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, AppError> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::browser("current url is not a string"))
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, AppError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(id) = self.find_all(locator).await?.into_iter().next() {
                self.command(Method::POST, &format!("/element/{id}/click"), Some(json!({})))
                    .await?;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn exists(&mut self, locator: &Locator) -> Result<bool, AppError> {
        Ok(!self.find_all(locator).await?.is_empty())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), AppError> {
        self.execute(SCROLL_SCRIPT, json!([])).await?;
        Ok(())
    }

    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), AppError> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet = 0;

        loop {
            let state = self.execute(LOAD_STATE_SCRIPT, json!([])).await?;
            let ready = state.get(0).and_then(|v| v.as_str()) == Some("complete");
            let count = state.get(1).and_then(|v| v.as_u64());

            if ready && count.is_some() && count == last_count {
                quiet += 1;
                if quiet >= QUIET_POLLS {
                    return Ok(());
                }
            } else {
                quiet = 0;
            }
            last_count = count;

            if Instant::now() >= deadline {
                return Err(AppError::browser(format!(
                    "page not idle after {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn links(&mut self, css: &str) -> Result<Vec<Link>, AppError> {
        let value = self.execute(LINKS_SCRIPT, json!([css])).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}
