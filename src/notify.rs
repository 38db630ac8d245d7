use std::path::Path;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

/// Delivers one rendered chart plus caption to a destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, artifact: &Path, caption: &str) -> anyhow::Result<()>;
}

/// Telegram bot photo upload (`sendPhoto`).
pub struct TelegramNotifier {
    client: Client,
    token: String,
}

impl TelegramNotifier {
    /// Reads the bot token from `TELEGRAM_BOT_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN is not set")?;
        Ok(Self {
            client: Client::new(),
            token,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, artifact: &Path, caption: &str) -> anyhow::Result<()> {
        let photo = tokio::fs::read(artifact)
            .await
            .with_context(|| format!("reading chart {}", artifact.display()))?;
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("chart.png")
            .to_string();

        let form = Form::new()
            .text("chat_id", destination.to_string())
            .text("caption", caption.to_string())
            .part("photo", Part::bytes(photo).file_name(file_name));

        let url = format!("https://api.telegram.org/bot{}/sendPhoto", self.token);
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("telegram sendPhoto failed: HTTP {status}: {body}");
        }
        Ok(())
    }
}
