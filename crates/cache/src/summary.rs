//! AI-summary cache policy.
//!
//! TTL is tiered by expected traffic: configured high-traffic slugs refresh
//! fastest, locations tagged with an active category (farming, mining,
//! education, border) sit in the middle, everything else keeps the longest
//! TTL. Independently of TTL, a summary is semantically stale once live
//! conditions have drifted from the reading it was written against.

use crate::store::KvStore;
use common::config::CacheConfig;
use common::{AiSummary, CatalogLocation, WeatherSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTier {
    Popular,
    Active,
    Default,
}

pub struct SummaryCache {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl SummaryCache {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    fn key(slug: &str) -> String {
        format!("summary:{slug}")
    }

    pub fn tier_for(&self, location: &CatalogLocation) -> SummaryTier {
        if self.config.popular_slugs.iter().any(|s| s == &location.slug) {
            SummaryTier::Popular
        } else if location.has_active_tag() {
            SummaryTier::Active
        } else {
            SummaryTier::Default
        }
    }

    pub fn ttl_for(&self, location: &CatalogLocation) -> Duration {
        let secs = match self.tier_for(location) {
            SummaryTier::Popular => self.config.summary_ttl_popular_secs,
            SummaryTier::Active => self.config.summary_ttl_active_secs,
            SummaryTier::Default => self.config.summary_ttl_default_secs,
        };
        Duration::from_secs(secs)
    }

    /// Semantic staleness, independent of TTL: the live temperature drifted
    /// past the threshold, or the discrete condition code changed.
    pub fn is_stale(&self, entry: &AiSummary, live: &WeatherSnapshot) -> bool {
        let drift = (live.current.temperature_c - entry.temperature_c).abs();
        drift > self.config.summary_stale_drift_c
            || live.current.weather_code != entry.weather_code
    }

    /// Cached summary for a slug. When a live snapshot is supplied, a
    /// semantically stale hit is deleted and reported as a miss.
    pub async fn get(&self, slug: &str, live: Option<&WeatherSnapshot>) -> Option<AiSummary> {
        let key = Self::key(slug);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(%key, error = %err, "summary cache read failed, treating as miss");
                return None;
            }
        };
        let entry = match serde_json::from_str::<AiSummary>(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%key, error = %err, "summary entry undecodable, dropping");
                let _ = self.store.delete(&key).await;
                return None;
            }
        };
        if let Some(live) = live {
            if self.is_stale(&entry, live) {
                debug!(
                    slug,
                    entry_temp = entry.temperature_c,
                    live_temp = live.current.temperature_c,
                    entry_code = entry.weather_code,
                    live_code = live.current.weather_code,
                    "summary semantically stale, invalidating"
                );
                let _ = self.store.delete(&key).await;
                return None;
            }
        }
        Some(entry)
    }

    /// Write a summary with the location's tier TTL.
    pub async fn put(&self, location: &CatalogLocation, summary: &AiSummary) {
        let key = Self::key(&location.slug);
        let ttl = self.ttl_for(location);
        let raw = match serde_json::to_string(summary) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "summary serialization failed, not caching");
                return;
            }
        };
        if let Err(err) = self.store.put(&key, raw, ttl).await {
            warn!(%key, error = %err, "summary cache write failed");
        }
    }
}
