use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::{AsyncSmtpTransport, authentication::Credentials};
use lettre::{AsyncTransport, Tokio1Executor};
use serde::Deserialize;

use crate::error::AppError;
use crate::notify::MailChannel;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// `[notify.email]`. The `*_env` fields name the environment variables that
/// hold the credentials and addresses, never the values themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_user_env")]
    pub user_env: String,
    #[serde(default = "default_pass_env")]
    pub pass_env: String,
    #[serde(default = "default_from_env")]
    pub from_env: String,
    #[serde(default = "default_to_env")]
    pub to_env: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            user_env: default_user_env(),
            pass_env: default_pass_env(),
            from_env: default_from_env(),
            to_env: default_to_env(),
            subject: default_subject(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_user_env() -> String {
    "SMTP_USER".to_string()
}

fn default_pass_env() -> String {
    "SMTP_PASS".to_string()
}

fn default_from_env() -> String {
    "SMTP_FROM".to_string()
}

fn default_to_env() -> String {
    "SMTP_TO".to_string()
}

fn default_subject() -> String {
    "New VIE postings detected".to_string()
}

/// Resolved SMTP account. Any missing piece leaves the channel unconfigured.
#[derive(Debug, Clone)]
struct Account {
    user: String,
    pass: String,
    from: String,
    to: String,
}

/// SMTP with STARTTLS.
pub struct SmtpMail {
    host: String,
    port: u16,
    account: Option<Account>,
}

impl SmtpMail {
    pub fn from_env(config: &EmailConfig) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let account = match (
            var(&config.user_env),
            var(&config.pass_env),
            var(&config.from_env),
            var(&config.to_env),
        ) {
            (Some(user), Some(pass), Some(from), Some(to)) => Some(Account { user, pass, from, to }),
            _ => None,
        };

        tracing::debug!(
            "SMTP {}:{} configured={}",
            config.smtp_host,
            config.smtp_port,
            account.is_some()
        );
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            account,
        }
    }

    fn build(&self, account: &Account, subject: &str, body: &str) -> Result<Message, AppError> {
        let from: Mailbox = account
            .from
            .parse()
            .map_err(|e| AppError::Notify(format!("invalid sender '{}': {e}", account.from)))?;
        let to: Mailbox = account
            .to
            .parse()
            .map_err(|e| AppError::Notify(format!("invalid recipient '{}': {e}", account.to)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Notify(format!("build email: {e}")))
    }
}

#[async_trait]
impl MailChannel for SmtpMail {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AppError> {
        let Some(account) = &self.account else {
            tracing::warn!("Missing SMTP environment variables, skipping email");
            return Ok(());
        };
        if self.host.is_empty() {
            tracing::warn!("No smtp_host configured, skipping email");
            return Ok(());
        }

        let message = self.build(account, subject, body)?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| AppError::Notify(format!("smtp relay {}: {e}", self.host)))?
            .port(self.port)
            .credentials(Credentials::new(account.user.clone(), account.pass.clone()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| AppError::Notify(format!("send email: {e}")))?;
        tracing::info!("Email sent to {}", account.to);
        Ok(())
    }
}
