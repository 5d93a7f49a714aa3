use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::SiteConfig;
use crate::notify::NotifyConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobwatch", about = "Watch job boards for new relevant postings")]
pub struct Cli {
    /// Watch file (TOML)
    #[arg(long, env = "JOBWATCH_CONFIG", default_value = "watcher.toml")]
    pub config: PathBuf,

    /// Seen-postings store, overriding the watch file's `store_path`
    #[arg(long, env = "JOBWATCH_STORE")]
    pub store: Option<PathBuf>,

    /// WebDriver endpoint for browser-rendered sources, overriding `[webdriver] url`
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Check every source once (default when no subcommand given)
    Run,
    /// Check every source repeatedly until interrupted
    Watch {
        /// Seconds between passes
        #[arg(long, env = "POLL_INTERVAL", default_value = "60")]
        interval: u64,
    },
}

impl Cli {
    /// Resolve the command, defaulting to Run if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            config: self.config.clone(),
            store: self.store.clone(),
            webdriver_url: self.webdriver_url.clone(),
        }
    }
}

/// Where a pass reads its inputs from. The watch file is re-read every pass.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub store: Option<PathBuf>,
    pub webdriver_url: Option<String>,
}

/// The watch file.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Sources fetched at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub webdriver: WebDriverConfig,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebDriverConfig {
    #[serde(default = "default_webdriver_url")]
    pub url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            headless: default_headless(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    vec!["VIE".to_string()]
}

fn default_store_path() -> PathBuf {
    PathBuf::from("seen.json")
}

fn default_concurrency() -> usize {
    1
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

impl WatchConfig {
    /// Read and parse the watch file. Any failure here is fatal for the run.
    pub async fn load(path: &Path) -> Result<Self, AppError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| AppError::config(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }
}
