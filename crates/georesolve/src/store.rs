//! Location store abstraction.
//!
//! The production deployment backs this with a document store's geospatial
//! index; `MemoryLocationStore` computes haversine distances over the
//! catalog and is used for seeds and tests.

use async_trait::async_trait;
use common::{CatalogLocation, LocationCandidate, Result};
use dashmap::DashMap;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6_371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Candidates sorted by distance ascending. `max_distance_km = None`
    /// means uncapped.
    async fn nearest(
        &self,
        lat: f64,
        lon: f64,
        limit: usize,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<LocationCandidate>>;

    async fn get(&self, slug: &str) -> Result<Option<CatalogLocation>>;

    async fn insert(&self, location: CatalogLocation) -> Result<()>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn count(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    locations: DashMap<String, CatalogLocation>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with seed locations.
    pub fn with_seed(locations: &[CatalogLocation]) -> Self {
        let store = Self::new();
        for location in locations {
            store
                .locations
                .insert(location.slug.clone(), location.clone());
        }
        store
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn nearest(
        &self,
        lat: f64,
        lon: f64,
        limit: usize,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<LocationCandidate>> {
        let mut candidates: Vec<LocationCandidate> = self
            .locations
            .iter()
            .map(|entry| LocationCandidate {
                distance_km: haversine_km(lat, lon, entry.latitude, entry.longitude),
                location: entry.value().clone(),
            })
            .filter(|c| max_distance_km.is_none_or(|max| c.distance_km <= max))
            .collect();
        candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn get(&self, slug: &str) -> Result<Option<CatalogLocation>> {
        Ok(self.locations.get(slug).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, location: CatalogLocation) -> Result<()> {
        self.locations.insert(location.slug.clone(), location);
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.locations.contains_key(slug))
    }

    async fn count(&self) -> usize {
        self.locations.len()
    }
}
