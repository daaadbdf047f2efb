//! Price Oracle Cache - Rate Caching with Staleness Fallback
//!
//! Serves the token/native exchange rate to gas accounting:
//! - Fresh window: a cached quote younger than this is returned with no
//!   network access, so a manipulated pool (e.g. a flash-loan skewed
//!   reserve) can be read at most once per window.
//! - Stale window: if the live fetch fails, a cached quote younger than
//!   this is still served.
//! - Refresh is single-flight: the read-or-refresh decision runs under
//!   one async mutex, so a burst of callers hitting an expired cache
//!   produces one live fetch and the rest reuse its result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::OracleConfig;
use crate::domain::amount::format_units18;
use crate::domain::{PriceQuote, SettlementError};
use crate::ports::price_source::PriceSource;

/// Counters exposed for metrics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OracleStats {
    /// Live fetch attempts (successful or not).
    pub live_fetches: u64,
    /// Requests answered from a stale quote after a failed fetch.
    pub stale_fallbacks: u64,
}

/// Injectable exchange rate cache in front of a [`PriceSource`].
pub struct PriceOracle<P: PriceSource> {
    source: Arc<P>,
    cache: Mutex<Option<PriceQuote>>,
    fresh_window: TimeDelta,
    stale_window: TimeDelta,
    live_fetches: AtomicU64,
    stale_fallbacks: AtomicU64,
}

impl<P: PriceSource> PriceOracle<P> {
    /// Create an oracle with explicit windows.
    pub fn new(source: Arc<P>, fresh_window: TimeDelta, stale_window: TimeDelta) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
            fresh_window,
            stale_window,
            live_fetches: AtomicU64::new(0),
            stale_fallbacks: AtomicU64::new(0),
        }
    }

    /// Create an oracle with windows from config.
    pub fn from_config(source: Arc<P>, config: &OracleConfig) -> Self {
        Self::new(source, config.fresh_window(), config.stale_window())
    }

    /// Current rate, using the cache per the freshness policy.
    pub async fn get_rate(&self) -> Result<PriceQuote, SettlementError> {
        self.get_rate_at(Utc::now()).await
    }

    /// [`Self::get_rate`] evaluated at an explicit instant.
    #[instrument(skip(self))]
    pub async fn get_rate_at(&self, now: DateTime<Utc>) -> Result<PriceQuote, SettlementError> {
        let mut cache = self.cache.lock().await;

        if let Some(quote) = *cache {
            if quote.is_within(now, self.fresh_window) {
                return Ok(quote);
            }
        }

        match self.fetch_into(&mut cache, now).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                if let Some(quote) = *cache {
                    if quote.is_within(now, self.stale_window) {
                        self.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            age_secs = quote.age(now).num_seconds(),
                            "Using stale price cache"
                        );
                        return Ok(quote);
                    }
                }

                Err(SettlementError::OracleUnavailable {
                    source: Box::new(e),
                })
            }
        }
    }

    /// Live fetch with the cache lock held. The cache is only replaced on success.
    async fn fetch_into(
        &self,
        cache: &mut Option<PriceQuote>,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, SettlementError> {
        self.live_fetches.fetch_add(1, Ordering::Relaxed);
        match self.source.fetch_rate().await {
            Ok(rate) => {
                let quote = PriceQuote::new(rate, now);
                *cache = Some(quote);
                info!(rate = %format_units18(&rate), "Price oracle refreshed");
                Ok(quote)
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "Price oracle fetch failed");
                Err(e)
            }
        }
    }

    /// Cached quote and its age, for display. Never fetches.
    pub async fn cached_quote(&self) -> Option<(PriceQuote, TimeDelta)> {
        let cache = self.cache.lock().await;
        cache.map(|q| (q, q.age(Utc::now())))
    }

    /// Force a live fetch, even inside the fresh window.
    ///
    /// A failed fetch leaves the cached quote in place for later stale
    /// fallback and is reported as `OracleUnavailable`.
    pub async fn refresh(&self) -> Result<PriceQuote, SettlementError> {
        let mut cache = self.cache.lock().await;
        debug!("Forcing price refresh");
        self.fetch_into(&mut cache, Utc::now())
            .await
            .map_err(|e| SettlementError::OracleUnavailable {
                source: Box::new(e),
            })
    }

    pub fn stats(&self) -> OracleStats {
        OracleStats {
            live_fetches: self.live_fetches.load(Ordering::Relaxed),
            stale_fallbacks: self.stale_fallbacks.load(Ordering::Relaxed),
        }
    }
}
