// Notification module.
// Two independent channels: an instant chat message and a transactional mail.
// A channel that is disabled or lacks credentials is a logged no-op.

pub mod email;
pub mod telegram;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;

pub use email::{EmailConfig, SmtpMail};
pub use telegram::{Telegram, TelegramConfig};

/// Short message channel (chat bot).
#[async_trait]
pub trait InstantChannel: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), AppError>;
}

/// Subject-and-body channel (mail).
#[async_trait]
pub trait MailChannel: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AppError>;
}

/// `[notify]` section of the watch file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// The channels a run reports to.
#[derive(Default)]
pub struct Notifiers {
    instant: Option<Box<dyn InstantChannel>>,
    mail: Option<(Box<dyn MailChannel>, String)>,
}

impl Notifiers {
    /// Enabled channels, with credentials resolved from the environment.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, AppError> {
        let mut notifiers = Self::default();
        if config.telegram.enabled {
            notifiers.instant = Some(Box::new(Telegram::from_env(&config.telegram)?));
        }
        if config.email.enabled {
            notifiers.mail = Some((
                Box::new(SmtpMail::from_env(&config.email)),
                config.email.subject.clone(),
            ));
        }
        Ok(notifiers)
    }

    pub fn with_instant(mut self, channel: impl InstantChannel + 'static) -> Self {
        self.instant = Some(Box::new(channel));
        self
    }

    pub fn with_mail(mut self, channel: impl MailChannel + 'static, subject: impl Into<String>) -> Self {
        self.mail = Some((Box::new(channel), subject.into()));
        self
    }

    /// Deliver `message` on every enabled channel. Each channel is tried even
    /// when another fails; the failures are returned for the caller to log.
    pub async fn dispatch(&self, message: &str) -> Vec<AppError> {
        let mut failures = Vec::new();

        match &self.instant {
            Some(channel) => {
                if let Err(e) = channel.send(message).await {
                    failures.push(e);
                }
            }
            None => tracing::info!("Instant channel disabled"),
        }

        match &self.mail {
            Some((channel, subject)) => {
                if let Err(e) = channel.send(subject, message).await {
                    failures.push(e);
                }
            }
            None => tracing::info!("Mail channel disabled"),
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl InstantChannel for Recorder {
        async fn send(&self, message: &str) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Notify("chat down".into()));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl MailChannel for Recorder {
        async fn send(&self, subject: &str, body: &str) -> Result<(), AppError> {
            self.sent.lock().unwrap().push(format!("{subject}|{body}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn disabled_channels_are_no_ops() {
        let notifiers = Notifiers::from_config(&NotifyConfig::default()).unwrap();
        assert!(notifiers.dispatch("hello").await.is_empty());
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_other() {
        let chat = Recorder {
            fail: true,
            ..Default::default()
        };
        let mail = Recorder::default();
        let notifiers = Notifiers::default()
            .with_instant(chat)
            .with_mail(mail.clone(), "New postings");

        let failures = notifiers.dispatch("2 new postings").await;
        assert_eq!(failures.len(), 1);
        assert_eq!(*mail.sent.lock().unwrap(), ["New postings|2 new postings"]);
    }

    #[test]
    fn notify_section_parses_with_defaults() {
        let config: NotifyConfig = toml::from_str(
            r#"
            [telegram]
            enabled = true

            [email]
            enabled = true
            smtp_host = "smtp.example.com"
            "#,
        )
        .unwrap();
        assert!(config.telegram.enabled);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.email.user_env, "SMTP_USER");
    }
}
