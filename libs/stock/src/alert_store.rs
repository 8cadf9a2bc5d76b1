use std::sync::Arc;

use anyhow::{Context, Error};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::alert::{Alert, AlertKind, Credentials};
use crate::kv_store::KeyValueStore;

const ALERTS_KEY: &str = "alerts";
const BOT_TOKEN_KEY: &str = "telegram_bot_token";
const CHAT_ID_KEY: &str = "telegram_chat_id";

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Please enter a valid stock symbol")]
    InvalidSymbol,

    #[error("Please enter a valid price, got {0}")]
    InvalidPrice(f64),

    #[error("Alert for {symbol} ({kind}) already exists")]
    Duplicate { symbol: String, kind: AlertKind },

    #[error("alert store error: {0:#}")]
    Store(#[from] Error),
}

/// Persisted list of alerts. Every call reads the store fresh.
#[derive(Clone)]
pub struct AlertStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AlertStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    pub async fn load(&self) -> Result<Vec<Alert>, Error> {
        match self.kv.get(ALERTS_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).context("decode stored alerts"),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save(&self, alerts: &[Alert]) -> Result<(), Error> {
        let raw = serde_json::to_string(alerts)?;
        self.kv.set(ALERTS_KEY, raw).await
    }

    /// Validate and append a new alert.
    /// At most one alert may exist per (symbol, kind).
    pub async fn add(&self, symbol: &str, price: f64, kind: AlertKind) -> Result<Alert, AlertError> {
        let symbol = Self::normalize(symbol);
        if symbol.is_empty() {
            return Err(AlertError::InvalidSymbol);
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(AlertError::InvalidPrice(price));
        }

        let mut alerts = self.load().await?;

        if alerts.iter().any(|a| a.symbol == symbol && a.kind == kind) {
            debug!(%symbol, %kind, "duplicate alert rejected");
            return Err(AlertError::Duplicate { symbol, kind });
        }

        let created = Utc::now();
        // millisecond timestamps collide when two alerts land in the same tick
        let id = match alerts.iter().map(|a| a.id).max() {
            Some(max) if max >= created.timestamp_millis() => max + 1,
            _ => created.timestamp_millis(),
        };

        let alert = Alert {
            id,
            symbol,
            price,
            kind,
            created,
        };
        alerts.push(alert.clone());
        self.save(&alerts).await?;

        info!(id, symbol = %alert.symbol, price, %kind, "alert added");
        Ok(alert)
    }

    /// Remove the alert with `id`. Missing ids are a no-op.
    /// Returns true if it existed.
    pub async fn remove(&self, id: i64) -> Result<bool, Error> {
        let alerts = self.load().await?;
        let before = alerts.len();

        let remaining: Vec<Alert> = alerts.into_iter().filter(|a| a.id != id).collect();
        let removed = remaining.len() != before;

        self.save(&remaining).await?;

        debug!(id, removed, "remove alert");
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Returns `None` when either value is missing.
    pub async fn load(&self) -> Result<Option<Credentials>, Error> {
        let bot_token = self.get_string(BOT_TOKEN_KEY).await?;
        let chat_id = self.get_string(CHAT_ID_KEY).await?;
        Ok(Credentials::from_parts(bot_token, chat_id))
    }

    pub async fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        self.kv
            .set(BOT_TOKEN_KEY, serde_json::to_string(&credentials.bot_token)?)
            .await?;
        self.kv
            .set(CHAT_ID_KEY, serde_json::to_string(&credentials.chat_id)?)
            .await?;

        info!(credentials = ?credentials, "telegram credentials saved");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).with_context(|| format!("decode {key}")),
            None => Ok(None),
        }
    }
}
