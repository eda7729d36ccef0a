//! Open-Meteo forecast client (primary provider).
//!
//! Open-Meteo already serves parallel-array series in metric units, so the
//! mapping is mostly a reshape. Requests use unix timestamps to avoid
//! timezone-dependent time strings. A client-side limiter keeps us under
//! the per-second quota; 429s beyond it are left to the breaker.

use crate::WeatherProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CurrentConditions, DailySeries, Error, HourlySeries, Result, Source, WeatherSnapshot,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const PROVIDER_NAME: &str = "open-meteo";

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Clone)]
pub struct OpenMeteoProvider {
    client: reqwest::Client,
    limiter: Arc<DirectLimiter>,
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OmResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
    pub current: OmCurrent,
    pub hourly: OmHourly,
    pub daily: OmDaily,
}

#[derive(Debug, Deserialize)]
pub struct OmCurrent {
    pub time: i64,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub apparent_temperature: f64,
    pub precipitation: f64,
    pub weather_code: u8,
    pub surface_pressure: f64,
    pub wind_speed_10m: f64,
    pub wind_direction_10m: f64,
    pub is_day: u8,
}

#[derive(Debug, Deserialize)]
pub struct OmHourly {
    pub time: Vec<i64>,
    pub temperature_2m: Vec<f64>,
    pub weather_code: Vec<u8>,
    /// Nullable per element on some grids.
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OmDaily {
    pub time: Vec<i64>,
    pub weather_code: Vec<u8>,
    pub temperature_2m_max: Vec<f64>,
    pub temperature_2m_min: Vec<f64>,
    pub precipitation_sum: Vec<f64>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
}

// ── Implementation ────────────────────────────────────────────────────

impl OpenMeteoProvider {
    pub fn new() -> Self {
        Self::with_rate_limit(10)
    }

    pub fn with_rate_limit(requests_per_sec: u32) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("cuaca-gateway/0.1")
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build Open-Meteo HTTP client");

        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_sec.max(1)).expect("nonzero rate"),
        );

        Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot> {
        self.limiter.until_ready().await;

        debug!(lat, lon, "fetching Open-Meteo forecast");

        let resp = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,\
                     weather_code,surface_pressure,wind_speed_10m,wind_direction_10m,is_day"
                        .to_string(),
                ),
                (
                    "hourly",
                    "temperature_2m,weather_code,precipitation_probability,wind_speed_10m"
                        .to_string(),
                ),
                (
                    "daily",
                    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,\
                     precipitation_probability_max"
                        .to_string(),
                ),
                ("forecast_days", "7".to_string()),
                ("timezone", "UTC".to_string()),
                ("timeformat", "unixtime".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::ProviderTimeout {
                        provider: PROVIDER_NAME.into(),
                        timeout_ms: 0,
                    }
                } else {
                    Error::ProviderHttp {
                        provider: PROVIDER_NAME.into(),
                        status: 0,
                        message: format!("transport: {e}"),
                    }
                }
            })?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ProviderHttp {
                provider: PROVIDER_NAME.into(),
                status,
                message: body[..body.len().min(500)].to_string(),
            });
        }

        let payload: OmResponse = resp.json().await.map_err(|e| Error::MalformedPayload {
            provider: PROVIDER_NAME.into(),
            message: e.to_string(),
        })?;

        map_response(payload, Utc::now())
    }
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| Error::MalformedPayload {
        provider: PROVIDER_NAME.into(),
        message: format!("timestamp {ts} out of range"),
    })
}

/// Reshape the Open-Meteo payload into the shared snapshot.
pub fn map_response(resp: OmResponse, fetched_at: DateTime<Utc>) -> Result<WeatherSnapshot> {
    let hourly_len = resp.hourly.time.len();
    let mut hourly = HourlySeries {
        time: Vec::with_capacity(hourly_len),
        temperature_c: resp.hourly.temperature_2m,
        weather_code: resp.hourly.weather_code,
        precipitation_probability_pct: resp
            .hourly
            .precipitation_probability
            .iter()
            .map(|p| p.unwrap_or(0.0).clamp(0.0, 100.0) as u8)
            .collect(),
        wind_speed_kmh: resp.hourly.wind_speed_10m,
    };
    for ts in &resp.hourly.time {
        hourly.time.push(unix_to_utc(*ts)?);
    }
    // A missing probability array still yields parallel vectors.
    if hourly.precipitation_probability_pct.len() != hourly_len {
        hourly.precipitation_probability_pct = vec![0; hourly_len];
    }

    let daily_len = resp.daily.time.len();
    let mut daily = DailySeries {
        date: Vec::with_capacity(daily_len),
        temperature_max_c: resp.daily.temperature_2m_max,
        temperature_min_c: resp.daily.temperature_2m_min,
        weather_code: resp.daily.weather_code,
        precipitation_sum_mm: resp.daily.precipitation_sum,
        precipitation_probability_pct: resp
            .daily
            .precipitation_probability_max
            .iter()
            .map(|p| p.unwrap_or(0.0).clamp(0.0, 100.0) as u8)
            .collect(),
    };
    for ts in &resp.daily.time {
        daily.date.push(unix_to_utc(*ts)?.date_naive());
    }
    if daily.precipitation_probability_pct.len() != daily_len {
        daily.precipitation_probability_pct = vec![0; daily_len];
    }

    let snapshot = WeatherSnapshot {
        latitude: resp.latitude,
        longitude: resp.longitude,
        elevation_m: resp.elevation,
        current: CurrentConditions {
            temperature_c: resp.current.temperature_2m,
            apparent_temperature_c: resp.current.apparent_temperature,
            humidity_pct: resp.current.relative_humidity_2m.clamp(0.0, 100.0) as u8,
            wind_speed_kmh: resp.current.wind_speed_10m,
            wind_direction_deg: (resp.current.wind_direction_10m.rem_euclid(360.0)) as u16,
            pressure_hpa: resp.current.surface_pressure,
            precipitation_mm: resp.current.precipitation,
            weather_code: resp.current.weather_code,
            is_day: resp.current.is_day != 0,
            observed_at: unix_to_utc(resp.current.time)?,
        },
        hourly,
        daily,
        source: Source::ProviderPrimary,
        fetched_at,
    };

    if !snapshot.is_structurally_valid() {
        return Err(Error::MalformedPayload {
            provider: PROVIDER_NAME.into(),
            message: "ragged or empty series in response".into(),
        });
    }

    Ok(snapshot)
}
