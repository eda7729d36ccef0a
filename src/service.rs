//! Composition root: GeoResolver → CacheTier → FallbackOrchestrator.
//!
//! Thin wiring only; all behaviour lives in the component crates. Both
//! exposed operations are total from the caller's point of view: the worst
//! case for a weather request is a fallback-tagged synthetic snapshot, and
//! out-of-region coordinates come back as an explicit error value, never a
//! panic. Cancellation is the caller dropping the future; inside the core
//! the per-call breaker timeout is the only cancellation boundary.

use breaker::BreakerRegistry;
use cache::{KvStore, SummaryCache, WeatherCache};
use common::{
    AiSummary, Error, GatewayConfig, ResolvedLocation, ResolvedWeather, Result, Source,
};
use georesolve::{ElevationSource, GeoResolver, Geocoder, LocationStore};
use providers::{FallbackOrchestrator, OpenMeteoProvider, WeatherApiProvider, WeatherProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Breaker names; also the names used in transition log events.
pub const PRIMARY_BREAKER: &str = "open-meteo";
pub const SECONDARY_BREAKER: &str = "weatherapi";
pub const LLM_BREAKER: &str = "summary-llm";

/// Build the provider chain behind per-provider breakers. The secondary
/// joins only when a key is configured; the `summary-llm` breaker is
/// registered here so the summary collaborator shares the process registry.
pub fn build_chain(config: &GatewayConfig, registry: &BreakerRegistry) -> FallbackOrchestrator {
    let mut chain: Vec<(Arc<dyn WeatherProvider>, _)> = Vec::new();

    chain.push((
        Arc::new(OpenMeteoProvider::new()) as Arc<dyn WeatherProvider>,
        registry.get_or_create(PRIMARY_BREAKER, &config.breakers.primary),
    ));

    if config.weatherapi_key.is_empty() {
        info!("no WeatherAPI key configured; provider chain is primary-only");
    } else {
        chain.push((
            Arc::new(WeatherApiProvider::new(config.weatherapi_key.clone()))
                as Arc<dyn WeatherProvider>,
            registry.get_or_create(SECONDARY_BREAKER, &config.breakers.secondary),
        ));
    }

    registry.get_or_create(LLM_BREAKER, &config.breakers.llm);

    FallbackOrchestrator::new(chain)
}

pub struct WeatherService {
    resolver: GeoResolver,
    weather_cache: WeatherCache,
    summary_cache: SummaryCache,
    orchestrator: FallbackOrchestrator,
}

impl WeatherService {
    pub fn new(
        config: GatewayConfig,
        kv: Arc<dyn KvStore>,
        locations: Arc<dyn LocationStore>,
        geocoder: Arc<dyn Geocoder>,
        elevation: Arc<dyn ElevationSource>,
        registry: &BreakerRegistry,
    ) -> Self {
        let orchestrator = build_chain(&config, registry);
        Self::with_orchestrator(config, kv, locations, geocoder, elevation, orchestrator)
    }

    pub fn with_orchestrator(
        config: GatewayConfig,
        kv: Arc<dyn KvStore>,
        locations: Arc<dyn LocationStore>,
        geocoder: Arc<dyn Geocoder>,
        elevation: Arc<dyn ElevationSource>,
        orchestrator: FallbackOrchestrator,
    ) -> Self {
        let resolver = GeoResolver::new(
            locations,
            geocoder,
            elevation,
            config.geo.clone(),
            config.home_country.clone(),
        );
        Self {
            resolver,
            weather_cache: WeatherCache::new(kv.clone(), config.cache.clone()),
            summary_cache: SummaryCache::new(kv, config.cache.clone()),
            orchestrator,
        }
    }

    fn coordinate_key(lat: f64, lon: f64) -> String {
        format!("geo:{lat:.3},{lon:.3}")
    }

    /// Weather for a coordinate pair. Total: resolution failures degrade
    /// to a coordinate-derived cache key, provider failures end at the
    /// synthetic estimate.
    pub async fn weather_for_coords(
        &self,
        lat: f64,
        lon: f64,
        user_country: Option<&str>,
    ) -> ResolvedWeather {
        let (key, fetch_lat, fetch_lon, elevation_hint) =
            match self.resolver.resolve_or_create(lat, lon, user_country).await {
                Ok(ResolvedLocation {
                    nearest: Some(location),
                    ..
                }) => (
                    location.slug.clone(),
                    location.latitude,
                    location.longitude,
                    location.elevation_m,
                ),
                Ok(ResolvedLocation { nearest: None, .. }) => {
                    (Self::coordinate_key(lat, lon), lat, lon, None)
                }
                Err(err) => {
                    debug!(lat, lon, error = %err, "resolution failed, using coordinate key");
                    (Self::coordinate_key(lat, lon), lat, lon, None)
                }
            };

        if let Some(hit) = self.weather_cache.get(&key).await {
            return ResolvedWeather {
                data: hit,
                source: Source::Cache,
            };
        }

        let snapshot = self
            .orchestrator
            .fetch(fetch_lat, fetch_lon, elevation_hint)
            .await;
        self.weather_cache.put(&key, &snapshot).await;
        ResolvedWeather {
            source: snapshot.source,
            data: snapshot,
        }
    }

    /// Weather for a known catalog slug.
    pub async fn weather_for_slug(&self, slug: &str) -> Result<ResolvedWeather> {
        let location = self
            .resolver
            .by_slug(slug)
            .await?
            .ok_or_else(|| Error::Other(format!("unknown location '{slug}'")))?;

        if let Some(hit) = self.weather_cache.get(slug).await {
            return Ok(ResolvedWeather {
                data: hit,
                source: Source::Cache,
            });
        }

        let snapshot = self
            .orchestrator
            .fetch(location.latitude, location.longitude, location.elevation_m)
            .await;
        self.weather_cache.put(slug, &snapshot).await;
        Ok(ResolvedWeather {
            source: snapshot.source,
            data: snapshot,
        })
    }

    /// Nearest catalog location for a coordinate pair, creating one when
    /// the point is unknown but supported.
    pub async fn locate(
        &self,
        lat: f64,
        lon: f64,
        user_country: Option<&str>,
    ) -> Result<ResolvedLocation> {
        self.resolver.resolve_or_create(lat, lon, user_country).await
    }

    /// Cached narrative summary for a slug, invalidated against live
    /// conditions. `None` means the collaborator should regenerate.
    pub async fn summary_for(&self, slug: &str) -> Result<Option<AiSummary>> {
        let live = self.weather_for_slug(slug).await?;
        Ok(self.summary_cache.get(slug, Some(&live.data)).await)
    }

    /// Store a freshly generated summary with its tier TTL.
    pub async fn store_summary(&self, summary: &AiSummary) -> Result<()> {
        let location = self
            .resolver
            .by_slug(&summary.slug)
            .await?
            .ok_or_else(|| Error::Other(format!("unknown location '{}'", summary.slug)))?;
        self.summary_cache.put(&location, summary).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use breaker::CircuitBreaker;
    use cache::MemoryStore;
    use chrono::Utc;
    use common::WeatherSnapshot;
    use georesolve::{GeocodedPlace, MemoryLocationStore};
    use providers::synthesize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl WeatherProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::ProviderHttp {
                    provider: "counting".into(),
                    status: 500,
                    message: "down".into(),
                })
            } else {
                Ok(synthesize(lat, lon, None, Utc::now()))
            }
        }
    }

    struct NoGeocoder;

    #[async_trait]
    impl Geocoder for NoGeocoder {
        async fn reverse(&self, _lat: f64, _lon: f64) -> Result<Option<GeocodedPlace>> {
            Err(Error::GeocodingUnavailable("offline".into()))
        }

        async fn forward(&self, _query: &str) -> Result<Vec<GeocodedPlace>> {
            Ok(Vec::new())
        }
    }

    struct NoElevation;

    #[async_trait]
    impl ElevationSource for NoElevation {
        async fn elevation(&self, _lat: f64, _lon: f64) -> Result<f64> {
            Err(Error::ElevationUnavailable("offline".into()))
        }
    }

    fn make_service(fail_provider: bool) -> (WeatherService, Arc<AtomicUsize>) {
        let config = GatewayConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            calls: calls.clone(),
            fail: fail_provider,
        });
        let breaker = Arc::new(CircuitBreaker::new("counting", config.breakers.primary.clone()));
        let orchestrator = FallbackOrchestrator::new(vec![(
            provider as Arc<dyn WeatherProvider>,
            breaker,
        )]);

        let service = WeatherService::with_orchestrator(
            config.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryLocationStore::with_seed(&config.locations)),
            Arc::new(NoGeocoder),
            Arc::new(NoElevation),
            orchestrator,
        );
        (service, calls)
    }

    #[tokio::test]
    async fn test_read_through_then_cache_hit() {
        let (service, calls) = make_service(false);

        let first = service.weather_for_slug("kuala-lumpur").await.unwrap();
        assert_eq!(first.source, Source::ProviderPrimary);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = service.weather_for_slug("kuala-lumpur").await.unwrap();
        assert_eq!(second.source, Source::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "served from cache");
        assert_eq!(
            second.data.current.temperature_c,
            first.data.current.temperature_c
        );
    }

    #[tokio::test]
    async fn test_coords_resolve_to_catalog_key() {
        let (service, _calls) = make_service(false);

        // Near KL: attaches to the seed location.
        let result = service.weather_for_coords(3.15, 101.70, None).await;
        assert_eq!(result.source, Source::ProviderPrimary);

        // Same point again: served from the slug-keyed entry.
        let again = service.weather_for_coords(3.15, 101.70, None).await;
        assert_eq!(again.source, Source::Cache);
    }

    #[tokio::test]
    async fn test_total_even_with_everything_failing() {
        let (service, _calls) = make_service(true);

        // Point far from any catalog entry, geocoder offline, provider
        // failing: still a structurally valid answer.
        let result = service.weather_for_coords(6.9, 116.8, None).await;
        assert_eq!(result.source, Source::Fallback);
        assert!(result.data.is_structurally_valid());
    }

    #[tokio::test]
    async fn test_unknown_slug_is_an_error_value() {
        let (service, _calls) = make_service(false);
        assert!(service.weather_for_slug("atlantis").await.is_err());
    }

    #[tokio::test]
    async fn test_locate_surfaces_step_errors() {
        let (service, _calls) = make_service(false);

        // Inside the region but unknown and the geocoder is down.
        let err = service.locate(6.9, 116.8, None).await.unwrap_err();
        assert!(matches!(err, Error::GeocodingUnavailable(_)));

        // Outside the region: explicit negative, not a fault.
        let err = service.locate(51.5, -0.13, None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedRegion { .. }));
    }

    #[tokio::test]
    async fn test_summary_round_trip_and_staleness() {
        let (service, _calls) = make_service(false);

        let live = service.weather_for_slug("kuala-lumpur").await.unwrap();
        let summary = AiSummary {
            slug: "kuala-lumpur".into(),
            text: "Warm afternoon with passing clouds.".into(),
            temperature_c: live.data.current.temperature_c,
            weather_code: live.data.current.weather_code,
            generated_at: Utc::now(),
        };
        service.store_summary(&summary).await.unwrap();

        // Conditions unchanged: still served.
        assert!(service.summary_for("kuala-lumpur").await.unwrap().is_some());

        // A summary written against very different conditions is refused.
        let drifted = AiSummary {
            temperature_c: live.data.current.temperature_c + 9.0,
            ..summary
        };
        service.store_summary(&drifted).await.unwrap();
        assert!(service.summary_for("kuala-lumpur").await.unwrap().is_none());
    }
}
