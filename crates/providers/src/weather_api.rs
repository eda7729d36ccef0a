//! WeatherAPI.com forecast client (secondary provider).
//!
//! WeatherAPI nests hour rows under each forecast day and uses its own
//! condition-code space, so the mapping flattens the days into parallel
//! hourly vectors and translates condition codes onto WMO codes to match
//! the primary provider.

use crate::WeatherProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CurrentConditions, DailySeries, Error, HourlySeries, Result, Source, WeatherSnapshot,
};
use serde::Deserialize;
use tracing::debug;

const FORECAST_URL: &str = "https://api.weatherapi.com/v1/forecast.json";
const PROVIDER_NAME: &str = "weatherapi";

#[derive(Clone)]
pub struct WeatherApiProvider {
    client: reqwest::Client,
    api_key: String,
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WaResponse {
    pub location: WaLocation,
    pub current: WaCurrent,
    pub forecast: WaForecast,
}

#[derive(Debug, Deserialize)]
pub struct WaLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct WaCurrent {
    pub last_updated_epoch: i64,
    pub temp_c: f64,
    pub feelslike_c: f64,
    pub humidity: f64,
    pub wind_kph: f64,
    pub wind_degree: f64,
    pub pressure_mb: f64,
    pub precip_mm: f64,
    pub is_day: u8,
    pub condition: WaCondition,
}

#[derive(Debug, Deserialize)]
pub struct WaCondition {
    pub code: i32,
}

#[derive(Debug, Deserialize)]
pub struct WaForecast {
    #[serde(default)]
    pub forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
pub struct WaForecastDay {
    pub date_epoch: i64,
    pub day: WaDay,
    #[serde(default)]
    pub hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
pub struct WaDay {
    pub maxtemp_c: f64,
    pub mintemp_c: f64,
    pub totalprecip_mm: f64,
    #[serde(default)]
    pub daily_chance_of_rain: f64,
    pub condition: WaCondition,
}

#[derive(Debug, Deserialize)]
pub struct WaHour {
    pub time_epoch: i64,
    pub temp_c: f64,
    pub wind_kph: f64,
    #[serde(default)]
    pub chance_of_rain: f64,
    pub condition: WaCondition,
}

// ── Condition-code translation ────────────────────────────────────────

/// Condensed WeatherAPI → WMO weather-code mapping.
pub fn wmo_from_condition(code: i32) -> u8 {
    match code {
        1000 => 0,                    // sunny / clear
        1003 => 2,                    // partly cloudy
        1006 => 3,                    // cloudy
        1009 => 3,                    // overcast
        1030 => 45,                   // mist
        1063 | 1150 | 1153 => 51,     // patchy rain / drizzle
        1066 | 1069 | 1072 => 71,     // patchy snow / sleet
        1087 => 95,                   // thundery outbreaks
        1135 => 45,                   // fog
        1147 => 48,                   // freezing fog
        1168 | 1171 => 56,            // freezing drizzle
        1180 | 1183 => 61,            // light rain
        1186 | 1189 => 63,            // moderate rain
        1192 | 1195 => 65,            // heavy rain
        1198 | 1201 => 66,            // freezing rain
        1204 | 1207 => 73,           // sleet
        1210 | 1213 | 1216 | 1219 => 71, // snow
        1222 | 1225 => 75,            // heavy snow
        1237 => 77,                   // ice pellets
        1240 => 80,                   // light rain shower
        1243 => 81,                   // moderate shower
        1246 => 82,                   // torrential shower
        1249 | 1252 => 83,            // sleet showers
        1255 | 1258 => 85,            // snow showers
        1261 | 1264 => 77,            // ice pellet showers
        1273 | 1276 => 95,            // rain with thunder
        1279 | 1282 => 96,            // snow with thunder
        _ => 3,
    }
}

// ── Implementation ────────────────────────────────────────────────────

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("cuaca-gateway/0.1")
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build WeatherAPI HTTP client");

        Self { client, api_key }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot> {
        debug!(lat, lon, "fetching WeatherAPI forecast");

        let coords = format!("{lat},{lon}");
        let resp = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", coords.as_str()),
                ("days", "7"),
                ("aqi", "no"),
                ("alerts", "no"),
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

        let payload: WaResponse = resp.json().await.map_err(|e| Error::MalformedPayload {
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

/// Flatten the per-day hour rows into parallel series.
pub fn map_response(resp: WaResponse, fetched_at: DateTime<Utc>) -> Result<WeatherSnapshot> {
    let mut hourly = HourlySeries::default();
    let mut daily = DailySeries::default();

    for day in &resp.forecast.forecastday {
        daily.date.push(unix_to_utc(day.date_epoch)?.date_naive());
        daily.temperature_max_c.push(day.day.maxtemp_c);
        daily.temperature_min_c.push(day.day.mintemp_c);
        daily.weather_code.push(wmo_from_condition(day.day.condition.code));
        daily.precipitation_sum_mm.push(day.day.totalprecip_mm);
        daily
            .precipitation_probability_pct
            .push(day.day.daily_chance_of_rain.clamp(0.0, 100.0) as u8);

        for hour in &day.hour {
            hourly.time.push(unix_to_utc(hour.time_epoch)?);
            hourly.temperature_c.push(hour.temp_c);
            hourly.weather_code.push(wmo_from_condition(hour.condition.code));
            hourly
                .precipitation_probability_pct
                .push(hour.chance_of_rain.clamp(0.0, 100.0) as u8);
            hourly.wind_speed_kmh.push(hour.wind_kph);
        }
    }

    let snapshot = WeatherSnapshot {
        latitude: resp.location.lat,
        longitude: resp.location.lon,
        elevation_m: None,
        current: CurrentConditions {
            temperature_c: resp.current.temp_c,
            apparent_temperature_c: resp.current.feelslike_c,
            humidity_pct: resp.current.humidity.clamp(0.0, 100.0) as u8,
            wind_speed_kmh: resp.current.wind_kph,
            wind_direction_deg: (resp.current.wind_degree.rem_euclid(360.0)) as u16,
            pressure_hpa: resp.current.pressure_mb,
            precipitation_mm: resp.current.precip_mm,
            weather_code: wmo_from_condition(resp.current.condition.code),
            is_day: resp.current.is_day != 0,
            observed_at: unix_to_utc(resp.current.last_updated_epoch)?,
        },
        hourly,
        daily,
        source: Source::ProviderSecondary,
        fetched_at,
    };

    if !snapshot.is_structurally_valid() {
        return Err(Error::MalformedPayload {
            provider: PROVIDER_NAME.into(),
            message: "empty forecast in response".into(),
        });
    }

    Ok(snapshot)
}
