pub mod strategy;

pub use strategy::{FetchStrategy, StrategyError};

use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use strategy::{CustomTlsContext, DefaultTls, DisabledVerification, SystemTrustBundle};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("all fetch strategies failed. Last error: {last_error}")]
    Exhausted { last_error: String },
}

/// Outcome of a successful fetch: the parsed payload plus the name of the
/// strategy that produced it, for observability.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub payload: Value,
    pub method: &'static str,
}

/// Drives the strategy list for a single logical request: strategies run
/// strictly sequentially, in order, stopping at the first success.
pub struct FallbackFetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FallbackFetcher {
    /// Build the standard strategy chain, most secure first. The two
    /// strategies that disable certificate verification are only included
    /// when `allow_insecure` is set; enabling them logs a loud warning.
    pub fn new(allow_insecure: bool) -> Self {
        let strategies: Vec<Box<dyn FetchStrategy>> = if allow_insecure {
            warn!(
                "insecure TLS fallback ENABLED: certificate verification may be skipped, \
                 responses can come from an unauthenticated peer"
            );
            vec![
                Box::new(DefaultTls),
                Box::new(DisabledVerification),
                Box::new(CustomTlsContext),
                Box::new(SystemTrustBundle),
            ]
        } else {
            vec![Box::new(DefaultTls), Box::new(SystemTrustBundle)]
        };
        Self { strategies }
    }

    /// Build a fetcher over an explicit strategy list.
    #[cfg(test)]
    pub fn with_strategies(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in attempt order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order against `url` until one succeeds. Every
    /// strategy failure is absorbed and the next strategy is tried; only
    /// exhaustion of the whole list surfaces as an error, carrying the
    /// last strategy's error text.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<FetchSuccess, FetchError> {
        let mut last_error = String::from("no fetch strategies configured");

        for (i, strategy) in self.strategies.iter().enumerate() {
            debug!(attempt = i + 1, strategy = strategy.name(), "attempting fetch");
            match strategy.attempt(url, headers).await {
                Ok(payload) => {
                    info!(strategy = strategy.name(), "fetch succeeded");
                    return Ok(FetchSuccess {
                        payload,
                        method: strategy.name(),
                    });
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "fetch strategy failed");
                    last_error = format!("{} failed: {err}", strategy.name());
                }
            }
        }

        Err(FetchError::Exhausted { last_error })
    }
}
