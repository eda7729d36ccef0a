//! Geospatial resolution: coordinates to catalog locations.
//!
//! Nearest-query with country-aware tie-breaking, plus the auto-create path
//! that geocodes an unknown point into a new catalog entry.

pub mod geocode;
pub mod resolver;
pub mod store;

pub use geocode::{ElevationSource, GeocodedPlace, Geocoder, HttpElevation, HttpGeocoder};
pub use resolver::{pick_best_match, slugify, GeoResolver};
pub use store::{haversine_km, LocationStore, MemoryLocationStore};
