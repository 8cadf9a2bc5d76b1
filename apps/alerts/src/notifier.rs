use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use stock::Credentials;
use tracing::{debug, info};

/// Delivers a text message to the user. Best effort, callers log failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, credentials: &Credentials) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_api: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramNotifier {
    pub fn new(client: Client, base_api: String) -> Self {
        Self { client, base_api }
    }

    fn send_url(&self, bot_token: &str) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_api.trim_end_matches('/'),
            bot_token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str, credentials: &Credentials) -> Result<()> {
        debug!(%message, "sending telegram message");

        let res = self
            .client
            .post(self.send_url(&credentials.bot_token))
            .json(&SendMessage {
                chat_id: &credentials.chat_id,
                text: message,
                parse_mode: "HTML",
            })
            .send()
            .await
            // the request url carries the bot token
            .map_err(reqwest::Error::without_url)?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            bail!("Telegram API error: {status} - {body}");
        }

        info!("telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_url_embeds_token() {
        let notifier = TelegramNotifier::new(Client::new(), "https://api.telegram.org/".into());
        assert_eq!(
            notifier.send_url("123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn body_uses_telegram_field_names() {
        let body = serde_json::to_value(SendMessage {
            chat_id: "42",
            text: "hi",
            parse_mode: "HTML",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"chat_id": "42", "text": "hi", "parse_mode": "HTML"})
        );
    }

    #[tokio::test]
    async fn send_error_does_not_leak_token() {
        // rejected by reqwest before any connection is made
        let notifier = TelegramNotifier::new(Client::new(), "ftp://127.0.0.1".into());
        let creds = Credentials {
            bot_token: "123456789:SUPERSECRETTOKEN".into(),
            chat_id: "42".into(),
        };

        let err = notifier.notify("hi", &creds).await.unwrap_err();
        assert!(!format!("{err:?}").contains("SUPERSECRETTOKEN"));
        assert!(!format!("{err:#}").contains("SUPERSECRETTOKEN"));
    }
}
