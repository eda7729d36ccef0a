//! Gateway configuration types.

use crate::types::{CatalogLocation, LocationTag, Provenance};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// ISO country code the catalog is anchored to.
    #[serde(default = "default_home_country")]
    pub home_country: String,

    /// WeatherAPI key for the secondary provider (empty disables it).
    #[serde(default)]
    pub weatherapi_key: String,

    /// Seed catalog locations.
    #[serde(default = "default_locations")]
    pub locations: Vec<CatalogLocation>,

    /// Per-provider breaker settings.
    #[serde(default)]
    pub breakers: BreakerSettings,

    /// Cache TTLs and popularity tiers.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Geospatial resolution parameters.
    #[serde(default)]
    pub geo: GeoConfig,

    /// Timing parameters (seconds).
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Settings for one provider's circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures within the rolling window before the circuit opens.
    pub failure_threshold: usize,
    /// Rolling failure window (seconds).
    pub window_secs: u64,
    /// Time to hold the circuit open before a half-open probe (seconds).
    pub cooldown_secs: u64,
    /// Hard per-call timeout (milliseconds).
    pub call_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Breaker settings per named provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Primary weather provider: fast but rate-limit-prone, so trip early
    /// and retry soon.
    #[serde(default = "default_primary_breaker")]
    pub primary: BreakerConfig,

    /// Secondary provider: generous free tier, higher threshold, longer
    /// cooldown.
    #[serde(default = "default_secondary_breaker")]
    pub secondary: BreakerConfig,

    /// LLM summary collaborator: generation latency needs a long per-call
    /// timeout.
    #[serde(default = "default_llm_breaker")]
    pub llm: BreakerConfig,
}

/// Cache TTLs. All values in seconds; TTL is assigned at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Weather snapshots fetched from a real provider.
    #[serde(default = "default_weather_ttl")]
    pub weather_ttl_secs: u64,

    /// Synthetic fallback snapshots; kept short so the chain is retried.
    #[serde(default = "default_fallback_ttl")]
    pub fallback_ttl_secs: u64,

    /// Summary TTL for high-traffic locations.
    #[serde(default = "default_summary_ttl_popular")]
    pub summary_ttl_popular_secs: u64,

    /// Summary TTL for locations tagged with an active category.
    #[serde(default = "default_summary_ttl_active")]
    pub summary_ttl_active_secs: u64,

    /// Summary TTL for everything else.
    #[serde(default = "default_summary_ttl_default")]
    pub summary_ttl_default_secs: u64,

    /// Slugs classified as high-traffic.
    #[serde(default = "default_popular_slugs")]
    pub popular_slugs: Vec<String>,

    /// Temperature drift (°C) beyond which a summary is semantically stale.
    #[serde(default = "default_stale_drift")]
    pub summary_stale_drift_c: f64,
}

/// Geospatial resolution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Radius for the capped nearest query (km).
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,

    /// Candidates fetched per nearest query.
    #[serde(default = "default_nearest_limit")]
    pub nearest_limit: usize,

    /// Two locations within this radius are duplicates (km).
    #[serde(default = "default_duplicate_radius_km")]
    pub duplicate_radius_km: f64,

    /// Supported region bounding box: [lat_min, lat_max, lon_min, lon_max].
    #[serde(default = "default_region_bounds")]
    pub region_bounds: [f64; 4],
}

impl GeoConfig {
    pub fn in_supported_region(&self, lat: f64, lon: f64) -> bool {
        let [lat_min, lat_max, lon_min, lon_max] = self.region_bounds;
        lat >= lat_min && lat <= lat_max && lon >= lon_min && lon <= lon_max
    }
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Catalog weather refresh interval.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Heartbeat log interval.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_home_country() -> String {
    "MY".into()
}

fn default_primary_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        window_secs: 300,
        cooldown_secs: 120,
        call_timeout_ms: 8_000,
    }
}

fn default_secondary_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 5,
        window_secs: 300,
        cooldown_secs: 300,
        call_timeout_ms: 10_000,
    }
}

fn default_llm_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 4,
        window_secs: 300,
        cooldown_secs: 180,
        call_timeout_ms: 15_000,
    }
}

fn default_weather_ttl() -> u64 {
    900
}
fn default_fallback_ttl() -> u64 {
    120
}
fn default_summary_ttl_popular() -> u64 {
    1_800
}
fn default_summary_ttl_active() -> u64 {
    3_600
}
fn default_summary_ttl_default() -> u64 {
    10_800
}
fn default_stale_drift() -> f64 {
    5.0
}

fn default_popular_slugs() -> Vec<String> {
    vec!["kuala-lumpur".into(), "johor-bahru".into()]
}

fn default_max_distance_km() -> f64 {
    100.0
}
fn default_nearest_limit() -> usize {
    5
}
fn default_duplicate_radius_km() -> f64 {
    20.0
}

// Peninsular + East Malaysia, with margin.
fn default_region_bounds() -> [f64; 4] {
    [0.8, 7.5, 99.5, 119.5]
}

fn default_refresh_interval() -> u64 {
    600
}
fn default_heartbeat_interval() -> u64 {
    60
}

fn seed(
    slug: &str,
    name: &str,
    admin1: &str,
    lat: f64,
    lon: f64,
    elevation_m: f64,
    tags: &[LocationTag],
) -> CatalogLocation {
    CatalogLocation {
        slug: slug.into(),
        name: name.into(),
        admin1: Some(admin1.into()),
        country_code: "MY".into(),
        latitude: lat,
        longitude: lon,
        elevation_m: Some(elevation_m),
        tags: tags.to_vec(),
        provenance: Provenance::Seed,
    }
}

fn default_locations() -> Vec<CatalogLocation> {
    use LocationTag::*;
    vec![
        seed("kuala-lumpur", "Kuala Lumpur", "Kuala Lumpur", 3.1390, 101.6869, 66.0, &[Education]),
        seed("johor-bahru", "Johor Bahru", "Johor", 1.4927, 103.7414, 32.0, &[Border]),
        seed("cameron-highlands", "Cameron Highlands", "Pahang", 4.4710, 101.3768, 1_440.0, &[Farming, Highland, Tourism]),
        seed("ipoh", "Ipoh", "Perak", 4.5975, 101.0901, 22.0, &[Mining]),
        seed("langkawi", "Langkawi", "Kedah", 6.3500, 99.8000, 9.0, &[Tourism, Coastal]),
        seed("kundasang", "Kundasang", "Sabah", 5.9837, 116.5823, 1_900.0, &[Farming, Highland]),
        seed("kuching", "Kuching", "Sarawak", 1.5533, 110.3592, 27.0, &[Tourism]),
    ]
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            primary: default_primary_breaker(),
            secondary: default_secondary_breaker(),
            llm: default_llm_breaker(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            weather_ttl_secs: default_weather_ttl(),
            fallback_ttl_secs: default_fallback_ttl(),
            summary_ttl_popular_secs: default_summary_ttl_popular(),
            summary_ttl_active_secs: default_summary_ttl_active(),
            summary_ttl_default_secs: default_summary_ttl_default(),
            popular_slugs: default_popular_slugs(),
            summary_stale_drift_c: default_stale_drift(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            max_distance_km: default_max_distance_km(),
            nearest_limit: default_nearest_limit(),
            duplicate_radius_km: default_duplicate_radius_km(),
            region_bounds: default_region_bounds(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            home_country: default_home_country(),
            weatherapi_key: String::new(),
            locations: default_locations(),
            breakers: BreakerSettings::default(),
            cache: CacheConfig::default(),
            geo: GeoConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}
