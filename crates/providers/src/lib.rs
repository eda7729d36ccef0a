//! Weather providers and the fallback chain.
//!
//! Two HTTP providers (Open-Meteo primary, WeatherAPI secondary) map their
//! payloads into the shared snapshot shape; the orchestrator walks them
//! behind per-provider breakers and ends at a synthetic seasonal estimate
//! that can never fail.

pub mod open_meteo;
pub mod orchestrator;
pub mod synthetic;
pub mod weather_api;

pub use open_meteo::OpenMeteoProvider;
pub use orchestrator::FallbackOrchestrator;
pub use synthetic::synthesize;
pub use weather_api::WeatherApiProvider;

use async_trait::async_trait;
use common::{Result, WeatherSnapshot};

/// One upstream weather source.
///
/// Implementations tag snapshots with a provisional source; the
/// orchestrator overwrites the tag according to chain position.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot>;
}
