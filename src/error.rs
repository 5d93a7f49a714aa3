use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported source type '{0}'")]
    UnsupportedSource(String),

    #[error("Every payload variant was rejected: {0}")]
    Payload(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl AppError {
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}
