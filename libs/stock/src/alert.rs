use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction a price has to cross for an alert to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Above,
    Below,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Above => "above",
            AlertKind::Below => "below",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub symbol: String,
    pub price: f64,

    #[serde(rename = "type")]
    pub kind: AlertKind,

    pub created: DateTime<Utc>,
}

impl Alert {
    /// Inclusive on the boundary: reaching the target counts as a trigger.
    pub fn should_trigger(&self, current_price: f64) -> bool {
        match self.kind {
            AlertKind::Above => current_price >= self.price,
            AlertKind::Below => current_price <= self.price,
        }
    }

    pub fn message(&self, current_price: f64) -> String {
        format!(
            "🚨 Stock Alert: {} is now ${:.2} (Target: {} ${})",
            self.symbol, current_price, self.kind, self.price
        )
    }
}

/// Telegram bot credentials. Both fields are required to send anything.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl Credentials {
    /// Returns `None` unless both values are present and non-blank.
    pub fn from_parts(bot_token: Option<String>, chat_id: Option<String>) -> Option<Self> {
        let bot_token = bot_token.filter(|s| !s.trim().is_empty())?;
        let chat_id = chat_id.filter(|s| !s.trim().is_empty())?;
        Some(Self { bot_token, chat_id })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &mask(&self.bot_token))
            .field("chat_id", &mask(&self.chat_id))
            .finish()
    }
}

fn mask(value: &str) -> String {
    if value.chars().count() < 8 {
        return value.to_string();
    }

    // bot tokens look like "<bot id>:<secret>"
    match value.split_once(':') {
        Some((id, secret)) => format!("{}***:***{}", head(id), tail(secret)),
        None => format!("{}***{}", head(value), tail(value)),
    }
}

fn head(s: &str) -> String {
    s.chars().take(3).collect()
}

fn tail(s: &str) -> String {
    let skip = s.chars().count().saturating_sub(3);
    s.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(kind: AlertKind, price: f64) -> Alert {
        Alert {
            id: 1,
            symbol: "TSLA".to_string(),
            price,
            kind,
            created: Utc::now(),
        }
    }

    #[test]
    fn above_triggers_at_or_over_target() {
        let a = alert(AlertKind::Above, 400.0);
        assert!(a.should_trigger(400.0));
        assert!(a.should_trigger(426.5));
        assert!(!a.should_trigger(399.99));
    }

    #[test]
    fn below_triggers_at_or_under_target() {
        let a = alert(AlertKind::Below, 100.0);
        assert!(a.should_trigger(100.0));
        assert!(a.should_trigger(12.0));
        assert!(!a.should_trigger(175.2));
    }

    #[test]
    fn message_formats_price_with_two_decimals() {
        let a = alert(AlertKind::Above, 400.0);
        assert_eq!(
            a.message(426.5),
            "🚨 Stock Alert: TSLA is now $426.50 (Target: above $400)"
        );
    }

    #[test]
    fn serializes_kind_as_type_field() {
        let a = alert(AlertKind::Below, 12.5);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "below");
        assert_eq!(json["symbol"], "TSLA");

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn credentials_require_both_fields() {
        assert!(Credentials::from_parts(Some("123:abc".into()), None).is_none());
        assert!(Credentials::from_parts(None, Some("42".into())).is_none());
        assert!(Credentials::from_parts(Some("  ".into()), Some("42".into())).is_none());
        assert!(Credentials::from_parts(Some("123:abc".into()), Some("42".into())).is_some());
    }

    #[test]
    fn debug_masks_secrets() {
        let creds = Credentials {
            bot_token: "123456789:AAHsecretsecretXYZ".to_string(),
            chat_id: "987654321".to_string(),
        };
        let out = format!("{creds:?}");
        assert!(out.contains("123***:***XYZ"));
        assert!(out.contains("987***321"));
        assert!(!out.contains("secret"));
    }
}
