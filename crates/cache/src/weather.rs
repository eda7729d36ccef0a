//! Weather snapshot cache policy.
//!
//! Fixed TTL chosen by the snapshot's source at write time: provider data
//! lives the full TTL, synthetic fallbacks are kept short so the provider
//! chain is retried soon. Read-through wiring lives in the service layer;
//! concurrent misses for the same key are deliberately unsynchronized.

use crate::store::KvStore;
use common::config::CacheConfig;
use common::{Source, WeatherSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct WeatherCache {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    fn key(location_key: &str) -> String {
        format!("weather:{location_key}")
    }

    /// TTL is a function of who produced the snapshot.
    pub fn ttl_for_source(&self, source: Source) -> Duration {
        match source {
            Source::Fallback => Duration::from_secs(self.config.fallback_ttl_secs),
            _ => Duration::from_secs(self.config.weather_ttl_secs),
        }
    }

    /// Cached snapshot for a location key, or a miss. Undecodable entries
    /// count as misses rather than errors.
    pub async fn get(&self, location_key: &str) -> Option<WeatherSnapshot> {
        let key = Self::key(location_key);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(%key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str::<WeatherSnapshot>(&raw) {
            Ok(snapshot) => {
                debug!(%key, source = %snapshot.source, "weather cache hit");
                Some(snapshot)
            }
            Err(err) => {
                warn!(%key, error = %err, "cache entry undecodable, dropping");
                let _ = self.store.delete(&key).await;
                None
            }
        }
    }

    /// Write a snapshot with its source-selected TTL.
    pub async fn put(&self, location_key: &str, snapshot: &WeatherSnapshot) {
        let key = Self::key(location_key);
        let ttl = self.ttl_for_source(snapshot.source);
        let raw = match serde_json::to_string(snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "snapshot serialization failed, not caching");
                return;
            }
        };
        if let Err(err) = self.store.put(&key, raw, ttl).await {
            warn!(%key, error = %err, "cache write failed");
        }
    }
}
