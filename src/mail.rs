//! Outbound account email: verification links and password reset links.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &str, token: &str) -> anyhow::Result<()>;
    async fn send_reset(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
}

/// Sends mail through a transactional email HTTP API (Brevo-style JSON body).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
    public_base_url: String,
}

impl HttpMailer {
    /// `None` unless both the API URL and key are configured.
    pub fn from_config(cfg: &MailConfig) -> Option<Self> {
        let (api_url, api_key) = (cfg.api_url.clone()?, cfg.api_key.clone()?);
        Some(Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            sender_email: cfg.sender_email.clone(),
            sender_name: cfg.sender_name.clone(),
            public_base_url: cfg.public_base_url.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, text: String) -> anyhow::Result<()> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.sender_email.clone(),
                name: self.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: to.to_string(),
                name: None,
            }],
            subject: subject.to_string(),
            text_content: text,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .context("mail api request")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = resp.text().await.unwrap_or_default();
        anyhow::bail!("mail api responded {status}: {detail}")
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, token))]
    async fn send_verification(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let link = verification_link(&self.public_base_url, token);
        self.send(
            email,
            "Email Verification",
            format!("Please verify your email by clicking the following link:\r\n{link}"),
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn send_reset(&self, email: &str, token: &str) -> anyhow::Result<()> {
        self.send(
            email,
            "Password Reset",
            format!(
                "Use the following token to reset your password. It expires in one hour.\r\n{token}"
            ),
        )
        .await
    }
}

/// Fallback used when no mail API is configured: the link goes to the log.
pub struct LogMailer {
    public_base_url: String,
}

impl LogMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            public_base_url: cfg.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let link = verification_link(&self.public_base_url, token);
        info!(%email, %link, "verification email (not sent, no mail api configured)");
        Ok(())
    }

    async fn send_reset(&self, email: &str, token: &str) -> anyhow::Result<()> {
        info!(%email, "password reset email (not sent, no mail api configured)");
        debug!(%email, %token, "password reset token");
        Ok(())
    }
}

fn verification_link(base: &str, token: &str) -> String {
    format!("{}/api/auth/verify-email/{}", base.trim_end_matches('/'), token)
}
