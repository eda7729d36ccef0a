//! Fallback orchestrator.
//!
//! Walks the provider chain in priority order, each call wrapped by that
//! provider's breaker and timeout. Breaker-open, timeout, HTTP failure, or
//! a malformed payload all mean "try the next provider"; the chain ends at
//! the synthetic seasonal estimate, so a request never surfaces a hard
//! failure.

use crate::synthetic::synthesize;
use crate::WeatherProvider;
use breaker::CircuitBreaker;
use chrono::Utc;
use common::{Error, Source, WeatherSnapshot};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct FallbackOrchestrator {
    chain: Vec<(Arc<dyn WeatherProvider>, Arc<CircuitBreaker>)>,
}

impl FallbackOrchestrator {
    pub fn new(chain: Vec<(Arc<dyn WeatherProvider>, Arc<CircuitBreaker>)>) -> Self {
        Self { chain }
    }

    /// Fetch weather for a point. Infallible: the worst case is a
    /// fallback-tagged synthetic snapshot.
    pub async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        elevation_hint: Option<f64>,
    ) -> WeatherSnapshot {
        for (index, (provider, circuit)) in self.chain.iter().enumerate() {
            let result = circuit
                .execute(|| async {
                    let snapshot = provider.fetch(lat, lon).await?;
                    if !snapshot.is_structurally_valid() {
                        return Err(Error::MalformedPayload {
                            provider: provider.name().into(),
                            message: "structurally invalid snapshot".into(),
                        });
                    }
                    Ok(snapshot)
                })
                .await;

            match result {
                Ok(mut snapshot) => {
                    snapshot.source = if index == 0 {
                        Source::ProviderPrimary
                    } else {
                        Source::ProviderSecondary
                    };
                    info!(
                        provider = provider.name(),
                        source = %snapshot.source,
                        lat,
                        lon,
                        "provider served snapshot"
                    );
                    return snapshot;
                }
                Err(Error::CircuitOpen { provider }) => {
                    // Expected while the breaker protects the upstream.
                    debug!(provider = %provider, lat, lon, "skipping provider, breaker open");
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        lat,
                        lon,
                        error = %err,
                        "provider failed, trying next in chain"
                    );
                }
            }
        }

        error!(lat, lon, "all providers exhausted, serving synthetic estimate");
        synthesize(lat, lon, elevation_hint, Utc::now())
    }
}
