use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// One market data provider. `None` means "no usable price from here".
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    async fn price(&self, symbol: &str) -> Option<f64>;
}

pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::from)
}

fn usable(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

//
// Financial Modeling Prep
// https://site.financialmodelingprep.com/developer/docs#quote
//
#[derive(Clone)]
pub struct FmpSource {
    client: Client,
    base_api: String,
    api_key: String,
}

impl FmpSource {
    pub fn new(client: Client, base_api: String, api_key: String) -> Self {
        Self {
            client,
            base_api,
            api_key,
        }
    }

    async fn fetch(&self, symbol: &str) -> reqwest::Result<Vec<FmpQuote>> {
        let url = format!("{}/quote/{}", self.base_api.trim_end_matches('/'), symbol);

        let res = self
            .client
            .get(url)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res)
    }
}

#[async_trait]
impl PriceSource for FmpSource {
    fn name(&self) -> &str {
        "fmp"
    }

    async fn price(&self, symbol: &str) -> Option<f64> {
        // urls carry the api key
        match self.fetch(symbol).await.map_err(reqwest::Error::without_url) {
            Ok(quotes) => quotes.first().and_then(|q| q.price).and_then(usable),
            Err(e) => {
                debug!(%symbol, error = ?e, "fmp quote failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FmpQuote {
    pub price: Option<f64>,
}

//
// Twelve Data
// https://twelvedata.com/docs#real-time-price
//
#[derive(Clone)]
pub struct TwelveDataSource {
    client: Client,
    base_api: String,
    api_key: String,
}

impl TwelveDataSource {
    pub fn new(client: Client, base_api: String, api_key: String) -> Self {
        Self {
            client,
            base_api,
            api_key,
        }
    }

    async fn fetch(&self, symbol: &str) -> reqwest::Result<TwelveDataPrice> {
        let url = format!("{}/price", self.base_api.trim_end_matches('/'));

        let res = self
            .client
            .get(url)
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res)
    }
}

#[async_trait]
impl PriceSource for TwelveDataSource {
    fn name(&self) -> &str {
        "twelve_data"
    }

    async fn price(&self, symbol: &str) -> Option<f64> {
        // urls carry the api key
        match self.fetch(symbol).await.map_err(reqwest::Error::without_url) {
            Ok(res) => res.parsed(),
            Err(e) => {
                debug!(%symbol, error = ?e, "twelve data price failed");
                None
            }
        }
    }
}

// Errors (bad key, rate limit) come back as 200 with {"code": 429, "message": ..}
// and no price field.
#[derive(Debug, Deserialize, Clone)]
pub struct TwelveDataPrice {
    pub price: Option<String>,
}

impl TwelveDataPrice {
    pub fn parsed(&self) -> Option<f64> {
        self.price
            .as_deref()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .and_then(usable)
    }
}
