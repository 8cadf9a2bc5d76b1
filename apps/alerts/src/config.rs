use std::{env::var, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use stock::Credentials;

#[derive(Clone, Debug)]
pub struct Config {
    pub redis_url: Option<String>,
    pub key_prefix: String,

    pub fmp_base_url: String,
    pub fmp_api_key: String,
    pub twelve_data_base_url: String,
    pub twelve_data_api_key: String,
    pub telegram_base_url: String,

    /// Seeded into the credential store at startup when both are set.
    pub credentials: Option<Credentials>,

    pub check_interval: Duration,
    pub initial_delay: Duration,
    pub http_timeout: Duration,
    pub keep_alert_on_notify_failure: bool,

    pub version: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            redis_url: var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            key_prefix: or_default("REDIS_KEY_PREFIX", "stock-alerts"),

            fmp_base_url: or_default("FMP_BASE_URL", "https://financialmodelingprep.com/api/v3"),
            fmp_api_key: or_default("FMP_API_KEY", "demo"),
            twelve_data_base_url: or_default("TWELVE_DATA_BASE_URL", "https://api.twelvedata.com"),
            twelve_data_api_key: or_default("TWELVE_DATA_API_KEY", "demo"),
            telegram_base_url: or_default("TELEGRAM_API_BASE_URL", "https://api.telegram.org"),

            credentials: Credentials::from_parts(
                var("TELEGRAM_BOT_TOKEN").ok(),
                var("TELEGRAM_CHAT_ID").ok(),
            ),

            check_interval: Duration::from_secs(parse_or("CHECK_INTERVAL_SECS", 300)?),
            initial_delay: Duration::from_secs(parse_or("INITIAL_DELAY_SECS", 60)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 10)?),
            keep_alert_on_notify_failure: parse_or("KEEP_ALERT_ON_NOTIFY_FAILURE", false)?,

            version: or_default("APP_VERSION", "Unknown"),
        })
    }
}

fn or_default(key: &str, default: &str) -> String {
    var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_value(key, var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_fall_back_to_defaults() {
        assert_eq!(parse_or("ALERTS_TEST_UNSET_SECS", 300u64).unwrap(), 300);
        assert_eq!(or_default("ALERTS_TEST_UNSET_URL", "x"), "x");
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(parse_value("CHECK_INTERVAL_SECS", Some("five".into()), 300u64).is_err());
        assert!(parse_value("KEEP_ALERT_ON_NOTIFY_FAILURE", Some("yes".into()), false).is_err());
    }

    #[test]
    fn values_are_trimmed_and_blank_means_default() {
        assert_eq!(parse_value("HTTP_TIMEOUT_SECS", Some(" 15 ".into()), 10u64).unwrap(), 15);
        assert_eq!(parse_value("HTTP_TIMEOUT_SECS", Some("  ".into()), 10u64).unwrap(), 10);
        assert!(parse_value("KEEP_ALERT_ON_NOTIFY_FAILURE", Some("true".into()), false).unwrap());
    }
}
