//! Unified error type for the cuaca gateway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The breaker is protecting a provider. Expected during outages, not an
    /// incident on its own.
    #[error("circuit open for provider '{provider}'")]
    CircuitOpen { provider: String },

    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("provider '{provider}' returned status {status}: {message}")]
    ProviderHttp {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("provider '{provider}' returned a malformed payload: {message}")]
    MalformedPayload { provider: String, message: String },

    #[error("geocoding unavailable: {0}")]
    GeocodingUnavailable(String),

    #[error("elevation lookup failed: {0}")]
    ElevationUnavailable(String),

    /// A legitimate negative result, not a fault.
    #[error("coordinates ({lat}, {lon}) are outside the supported region")]
    UnsupportedRegion { lat: f64, lon: f64 },

    /// Another location already exists within the duplicate radius.
    #[error("duplicate of existing location '{slug}' ({distance_km:.1} km away)")]
    DuplicateLocation { slug: String, distance_km: f64 },

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
