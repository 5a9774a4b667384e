use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Outbound mail. Sends are fire-and-forget: callers log failures and move on.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(
            to = ?email.to,
            from = %email.from,
            subject = %email.subject,
            body = %email.body,
            "email sent to console"
        );
        Ok(())
    }
}
