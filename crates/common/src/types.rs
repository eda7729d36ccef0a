//! Domain types shared across the gateway.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Weather Types ─────────────────────────────────────────────────────

/// Where a served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "provider-primary")]
    ProviderPrimary,
    #[serde(rename = "provider-secondary")]
    ProviderSecondary,
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "fallback")]
    Fallback,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::ProviderPrimary => "provider-primary",
            Source::ProviderSecondary => "provider-secondary",
            Source::Cache => "cache",
            Source::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current conditions at a point. Units: °C, km/h, hPa, mm, %.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub apparent_temperature_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: u16,
    pub pressure_hpa: f64,
    pub precipitation_mm: f64,
    /// WMO weather interpretation code (0 = clear .. 99 = thunderstorm).
    pub weather_code: u8,
    pub is_day: bool,
    pub observed_at: DateTime<Utc>,
}

/// Hourly forecast as parallel vectors indexed by time step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<DateTime<Utc>>,
    pub temperature_c: Vec<f64>,
    pub weather_code: Vec<u8>,
    pub precipitation_probability_pct: Vec<u8>,
    pub wind_speed_kmh: Vec<f64>,
}

impl HourlySeries {
    /// All parallel vectors share the length of `time`.
    pub fn is_consistent(&self) -> bool {
        let n = self.time.len();
        self.temperature_c.len() == n
            && self.weather_code.len() == n
            && self.precipitation_probability_pct.len() == n
            && self.wind_speed_kmh.len() == n
    }
}

/// Daily forecast as parallel vectors indexed by day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailySeries {
    pub date: Vec<NaiveDate>,
    pub temperature_max_c: Vec<f64>,
    pub temperature_min_c: Vec<f64>,
    pub weather_code: Vec<u8>,
    pub precipitation_sum_mm: Vec<f64>,
    pub precipitation_probability_pct: Vec<u8>,
}

impl DailySeries {
    pub fn is_consistent(&self) -> bool {
        let n = self.date.len();
        self.temperature_max_c.len() == n
            && self.temperature_min_c.len() == n
            && self.weather_code.len() == n
            && self.precipitation_sum_mm.len() == n
            && self.precipitation_probability_pct.len() == n
    }
}

/// The resolved weather payload for one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
    pub current: CurrentConditions,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
    pub source: Source,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Structural validity: non-empty, internally consistent series.
    /// Downstream consumers never need a null case for "no weather".
    pub fn is_structurally_valid(&self) -> bool {
        !self.hourly.time.is_empty()
            && !self.daily.date.is_empty()
            && self.hourly.is_consistent()
            && self.daily.is_consistent()
    }
}

/// An AI-generated narrative summary plus the live reading it was written
/// against. Narrative construction happens outside this layer; only the
/// cache policy uses these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSummary {
    pub slug: String,
    pub text: String,
    /// Live temperature at generation time (°C).
    pub temperature_c: f64,
    /// Live WMO weather code at generation time.
    pub weather_code: u8,
    pub generated_at: DateTime<Utc>,
}

// ── Catalog Types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationTag {
    Farming,
    Mining,
    Tourism,
    Education,
    Border,
    Highland,
    Coastal,
}

impl LocationTag {
    /// Tags whose locations get the medium summary-cache TTL.
    pub fn is_active_category(&self) -> bool {
        matches!(
            self,
            LocationTag::Farming
                | LocationTag::Mining
                | LocationTag::Education
                | LocationTag::Border
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Seed,
    Community,
    Geolocation,
}

/// A named point in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLocation {
    /// Unique, URL-safe identifier.
    pub slug: String,
    pub name: String,
    /// Admin-1 (state) name, when known.
    #[serde(default)]
    pub admin1: Option<String>,
    /// ISO 3166-1 alpha-2, uppercase. Empty means "assume home country".
    #[serde(default)]
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
    #[serde(default)]
    pub tags: Vec<LocationTag>,
    pub provenance: Provenance,
}

impl CatalogLocation {
    pub fn has_active_tag(&self) -> bool {
        self.tags.iter().any(LocationTag::is_active_category)
    }
}

/// A nearest-query result row.
#[derive(Debug, Clone)]
pub struct LocationCandidate {
    pub location: CatalogLocation,
    pub distance_km: f64,
}

// ── Exposed Surface Types ─────────────────────────────────────────────

/// Result of "resolve weather for coordinates or location identifier".
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedWeather {
    pub data: WeatherSnapshot,
    pub source: Source,
}

/// Result of "resolve nearest catalog location for coordinates".
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLocation {
    pub nearest: Option<CatalogLocation>,
    pub is_new: bool,
}
