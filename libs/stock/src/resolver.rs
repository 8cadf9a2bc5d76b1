use std::collections::HashMap;

use tracing::{debug, info};

use crate::price_client::PriceSource;

pub const DEFAULT_PRICE: f64 = 100.00;

const FALLBACK_PRICES: &[(&str, f64)] = &[
    ("TSLA", 426.50),
    ("AAPL", 175.20),
    ("GOOGL", 140.30),
    ("MSFT", 415.80),
    ("AMZN", 145.60),
];

/// Resolves a current price by asking each source in order and falling back
/// to a static table. Never fails.
pub struct PriceResolver {
    sources: Vec<Box<dyn PriceSource>>,
    fallback: HashMap<String, f64>,
}

impl PriceResolver {
    pub fn new(sources: Vec<Box<dyn PriceSource>>) -> Self {
        Self {
            sources,
            fallback: FALLBACK_PRICES
                .iter()
                .map(|(s, p)| (s.to_string(), *p))
                .collect(),
        }
    }

    pub async fn resolve(&self, symbol: &str) -> f64 {
        for source in &self.sources {
            if let Some(price) = source.price(symbol).await {
                debug!(%symbol, source = source.name(), price, "resolved price");
                return price;
            }
            debug!(%symbol, source = source.name(), "no price, trying next source");
        }

        let price = self.fallback_price(symbol);
        info!(%symbol, price, "all sources failed, using fallback price");
        price
    }

    fn fallback_price(&self, symbol: &str) -> f64 {
        self.fallback
            .get(symbol)
            .copied()
            .unwrap_or(DEFAULT_PRICE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;

    struct Fixed {
        price: Option<f64>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PriceSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn price(&self, _symbol: &str) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price
        }
    }

    fn fixed(price: Option<f64>) -> (Box<dyn PriceSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Fixed {
            price,
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }

    #[tokio::test]
    async fn first_source_short_circuits() {
        let (primary, primary_calls) = fixed(Some(430.0));
        let (secondary, secondary_calls) = fixed(Some(1.0));
        let resolver = PriceResolver::new(vec![primary, secondary]);

        assert_eq!(resolver.resolve("TSLA").await, 430.0);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_to_secondary() {
        let (primary, _) = fixed(None);
        let (secondary, secondary_calls) = fixed(Some(176.0));
        let resolver = PriceResolver::new(vec![primary, secondary]);

        assert_eq!(resolver.resolve("AAPL").await, 176.0);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_sources_failing_uses_table_then_default() {
        let (primary, _) = fixed(None);
        let (secondary, _) = fixed(None);
        let resolver = PriceResolver::new(vec![primary, secondary]);

        assert_eq!(resolver.resolve("TSLA").await, 426.50);
        assert_eq!(resolver.resolve("MSFT").await, 415.80);
        assert_eq!(resolver.resolve("NOPE").await, DEFAULT_PRICE);
    }
}
