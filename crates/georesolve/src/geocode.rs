//! Geocoding and elevation collaborators.
//!
//! Reverse geocoding goes through Nominatim (Open-Meteo's geocoder is
//! forward-only); forward search and elevation use the Open-Meteo APIs.
//! Both sit behind traits so the resolver can be tested with fixtures.

use async_trait::async_trait;
use common::{Error, Result};
use serde::Deserialize;
use tracing::debug;

const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const GEOCODING_SEARCH_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const ELEVATION_URL: &str = "https://api.open-meteo.com/v1/elevation";

/// A geocoded point, from either direction.
#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO 3166-1 alpha-2, uppercase; empty when the geocoder omits it.
    pub country_code: String,
    pub country_name: Option<String>,
    pub admin1: Option<String>,
    pub elevation_m: Option<f64>,
    /// Geocoder feature kind ("village", "peak", ...), for tag inference.
    pub kind: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the geocoder answered but knows nothing there.
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<GeocodedPlace>>;

    async fn forward(&self, query: &str) -> Result<Vec<GeocodedPlace>>;
}

#[async_trait]
pub trait ElevationSource: Send + Sync {
    async fn elevation(&self, lat: f64, lon: f64) -> Result<f64>;
}

// ── HTTP implementations ──────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpGeocoder {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    village: Option<String>,
    #[serde(default)]
    town: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodingSearchResponse {
    #[serde(default)]
    results: Vec<GeocodingSearchRow>,
}

#[derive(Debug, Deserialize)]
struct GeocodingSearchRow {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation: Option<f64>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    feature_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    elevation: Vec<f64>,
}

impl HttpGeocoder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("cuaca-gateway/0.1 (weather catalog; ops@cuaca.example)")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build geocoder HTTP client");
        Self { client }
    }
}

impl Default for HttpGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<GeocodedPlace>> {
        debug!(lat, lon, "reverse geocoding");

        let resp = self
            .client
            .get(NOMINATIM_REVERSE_URL)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::GeocodingUnavailable(format!("reverse ({lat},{lon}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::GeocodingUnavailable(format!(
                "reverse ({lat},{lon}): status {status}"
            )));
        }

        let payload: NominatimReverse = resp
            .json()
            .await
            .map_err(|e| Error::GeocodingUnavailable(format!("reverse decode: {e}")))?;

        // Nominatim signals "nothing here" with an error field, not a 404.
        if payload.error.is_some() {
            return Ok(None);
        }

        let address = payload.address.unwrap_or_default();

        let name = address
            .village
            .or(address.town)
            .or(address.city)
            .or(payload.name.filter(|n| !n.is_empty()))
            .or_else(|| {
                payload
                    .display_name
                    .as_deref()
                    .and_then(|d| d.split(',').next())
                    .map(str::to_string)
            });

        let Some(name) = name else {
            return Ok(None);
        };

        Ok(Some(GeocodedPlace {
            name,
            latitude: lat,
            longitude: lon,
            country_code: address
                .country_code
                .map(|c| c.to_uppercase())
                .unwrap_or_default(),
            country_name: address.country,
            admin1: address.state,
            elevation_m: None,
            kind: payload.r#type,
        }))
    }

    async fn forward(&self, query: &str) -> Result<Vec<GeocodedPlace>> {
        debug!(query, "forward geocoding");

        let resp = self
            .client
            .get(GEOCODING_SEARCH_URL)
            .query(&[("name", query), ("count", "5"), ("format", "json")])
            .send()
            .await
            .map_err(|e| Error::GeocodingUnavailable(format!("forward '{query}': {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::GeocodingUnavailable(format!(
                "forward '{query}': status {status}"
            )));
        }

        let payload: GeocodingSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::GeocodingUnavailable(format!("forward decode: {e}")))?;

        Ok(payload
            .results
            .into_iter()
            .map(|row| GeocodedPlace {
                name: row.name,
                latitude: row.latitude,
                longitude: row.longitude,
                country_code: row.country_code.map(|c| c.to_uppercase()).unwrap_or_default(),
                country_name: row.country,
                admin1: row.admin1,
                elevation_m: row.elevation,
                kind: row.feature_code,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct HttpElevation {
    client: reqwest::Client,
}

impl HttpElevation {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("cuaca-gateway/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build elevation HTTP client");
        Self { client }
    }
}

impl Default for HttpElevation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ElevationSource for HttpElevation {
    async fn elevation(&self, lat: f64, lon: f64) -> Result<f64> {
        let resp = self
            .client
            .get(ELEVATION_URL)
            .query(&[("latitude", lat.to_string()), ("longitude", lon.to_string())])
            .send()
            .await
            .map_err(|e| Error::ElevationUnavailable(format!("({lat},{lon}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::ElevationUnavailable(format!(
                "({lat},{lon}): status {status}"
            )));
        }

        let payload: ElevationResponse = resp
            .json()
            .await
            .map_err(|e| Error::ElevationUnavailable(format!("decode: {e}")))?;

        payload
            .elevation
            .first()
            .copied()
            .ok_or_else(|| Error::ElevationUnavailable(format!("({lat},{lon}): empty response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_nominatim_reverse() {
        let raw = r#"{
            "name": "Gua Musang",
            "display_name": "Gua Musang, Kelantan, Malaysia",
            "type": "town",
            "address": {
                "town": "Gua Musang",
                "state": "Kelantan",
                "country": "Malaysia",
                "country_code": "my"
            }
        }"#;
        let parsed: NominatimReverse = serde_json::from_str(raw).unwrap();
        let address = parsed.address.unwrap();
        assert_eq!(address.town.as_deref(), Some("Gua Musang"));
        assert_eq!(address.country_code.as_deref(), Some("my"));
        assert_eq!(parsed.r#type.as_deref(), Some("town"));
    }

    #[test]
    fn test_deserialize_nominatim_nothing_found() {
        let raw = r#"{"error": "Unable to geocode"}"#;
        let parsed: NominatimReverse = serde_json::from_str(raw).unwrap();
        assert!(parsed.error.is_some());
    }

    #[test]
    fn test_deserialize_geocoding_search() {
        let raw = r#"{
            "results": [
                {
                    "name": "Kundasang",
                    "latitude": 5.9837,
                    "longitude": 116.5823,
                    "elevation": 1900.0,
                    "country_code": "MY",
                    "country": "Malaysia",
                    "admin1": "Sabah",
                    "feature_code": "PPL"
                }
            ]
        }"#;
        let parsed: GeocodingSearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].elevation, Some(1900.0));
    }

    #[test]
    fn test_deserialize_elevation() {
        let raw = r#"{"elevation": [1440.0]}"#;
        let parsed: ElevationResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.elevation, vec![1440.0]);
    }
}
