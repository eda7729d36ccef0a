//! Coordinate resolution and the auto-create path.
//!
//! Pure distance sorting misassigns border points: a candidate across the
//! border can be nearer than the correct same-country one. The resolver
//! prefers a same-country candidate inside the capped radius and only then
//! falls back to raw nearest, so a far-away same-country match never beats
//! a much closer cross-border one.

use crate::geocode::{ElevationSource, GeocodedPlace, Geocoder};
use crate::store::LocationStore;
use common::config::GeoConfig;
use common::{
    CatalogLocation, Error, LocationCandidate, LocationTag, Provenance, ResolvedLocation, Result,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First candidate matching `user_country` (case-insensitive; a candidate
/// without a country code counts as `home_country`), else the nearest.
pub fn pick_best_match<'a>(
    candidates: &'a [LocationCandidate],
    user_country: Option<&str>,
    home_country: &str,
) -> Option<&'a LocationCandidate> {
    let first = candidates.first()?;
    let Some(user_country) = user_country else {
        return Some(first);
    };

    candidates
        .iter()
        .find(|candidate| {
            let code = &candidate.location.country_code;
            let effective = if code.is_empty() { home_country } else { code };
            effective.eq_ignore_ascii_case(user_country)
        })
        .or(Some(first))
}

/// Lowercase, URL-safe slug: alphanumerics kept, runs of anything else
/// collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Keyword heuristics over the geocoded metadata. Border and curated tags
/// come from seed data, not from here.
fn infer_tags(place: &GeocodedPlace, elevation_m: Option<f64>) -> Vec<LocationTag> {
    let haystack = format!(
        "{} {} {}",
        place.name,
        place.admin1.as_deref().unwrap_or(""),
        place.kind.as_deref().unwrap_or("")
    )
    .to_lowercase();

    let mut tags = Vec::new();
    if matches!(elevation_m, Some(e) if e >= 900.0) || haystack.contains("highland") {
        tags.push(LocationTag::Highland);
    }
    if ["pulau", "island", "pantai", "beach", "port", "pelabuhan"]
        .iter()
        .any(|kw| haystack.contains(kw))
    {
        tags.push(LocationTag::Coastal);
    }
    if ["resort", "island", "pulau", "taman negara"]
        .iter()
        .any(|kw| haystack.contains(kw))
    {
        tags.push(LocationTag::Tourism);
    }
    if ["estate", "plantation", "ladang", "kebun", "farm"]
        .iter()
        .any(|kw| haystack.contains(kw))
    {
        tags.push(LocationTag::Farming);
    }
    if ["universiti", "university", "college", "kolej"]
        .iter()
        .any(|kw| haystack.contains(kw))
    {
        tags.push(LocationTag::Education);
    }
    tags
}

pub struct GeoResolver {
    store: Arc<dyn LocationStore>,
    geocoder: Arc<dyn Geocoder>,
    elevation: Arc<dyn ElevationSource>,
    config: GeoConfig,
    home_country: String,
}

impl GeoResolver {
    pub fn new(
        store: Arc<dyn LocationStore>,
        geocoder: Arc<dyn Geocoder>,
        elevation: Arc<dyn ElevationSource>,
        config: GeoConfig,
        home_country: impl Into<String>,
    ) -> Self {
        Self {
            store,
            geocoder,
            elevation,
            config,
            home_country: home_country.into(),
        }
    }

    /// Direct catalog lookup by slug.
    pub async fn by_slug(&self, slug: &str) -> Result<Option<CatalogLocation>> {
        self.store.get(slug).await
    }

    /// Candidates near a point, distance-capped unless `max_distance_km`
    /// says otherwise.
    pub async fn nearest(
        &self,
        lat: f64,
        lon: f64,
        limit: usize,
        max_distance_km: Option<f64>,
    ) -> Result<Vec<LocationCandidate>> {
        self.store.nearest(lat, lon, limit, max_distance_km).await
    }

    /// Resolve a coordinate to the best existing catalog location.
    ///
    /// The capped query keeps the country tie-break honest; when it comes
    /// back empty, one uncapped nearest-only query makes sure every
    /// coordinate still resolves to something while the catalog has any
    /// entries at all.
    pub async fn resolve(
        &self,
        lat: f64,
        lon: f64,
        user_country: Option<&str>,
    ) -> Result<ResolvedLocation> {
        let capped = self
            .store
            .nearest(
                lat,
                lon,
                self.config.nearest_limit,
                Some(self.config.max_distance_km),
            )
            .await?;

        let nearest = if capped.is_empty() {
            let uncapped = self.store.nearest(lat, lon, 1, None).await?;
            uncapped.into_iter().next().map(|c| c.location)
        } else {
            pick_best_match(&capped, user_country, &self.home_country)
                .map(|c| c.location.clone())
        };

        Ok(ResolvedLocation {
            nearest,
            is_new: false,
        })
    }

    /// Resolve a coordinate, creating a catalog entry when nothing close
    /// enough exists and the point is inside the supported region.
    pub async fn resolve_or_create(
        &self,
        lat: f64,
        lon: f64,
        user_country: Option<&str>,
    ) -> Result<ResolvedLocation> {
        let capped = self
            .store
            .nearest(
                lat,
                lon,
                self.config.nearest_limit,
                Some(self.config.max_distance_km),
            )
            .await?;

        if let Some(best) = pick_best_match(&capped, user_country, &self.home_country) {
            if best.distance_km <= self.config.duplicate_radius_km {
                return Ok(ResolvedLocation {
                    nearest: Some(best.location.clone()),
                    is_new: false,
                });
            }
        }

        if !self.config.in_supported_region(lat, lon) {
            return Err(Error::UnsupportedRegion { lat, lon });
        }

        match self.create_location(lat, lon).await {
            Ok(location) => Ok(ResolvedLocation {
                nearest: Some(location),
                is_new: true,
            }),
            // A concurrent request created the location first; serve theirs.
            Err(Error::DuplicateLocation { slug, distance_km }) => {
                debug!(
                    "create raced existing location '{}' ({:.1} km away)",
                    slug, distance_km
                );
                let existing = self.store.get(&slug).await?;
                Ok(ResolvedLocation {
                    nearest: existing,
                    is_new: false,
                })
            }
            Err(err) => {
                warn!(lat, lon, error = %err, "auto-create failed");
                Err(err)
            }
        }
    }

    /// Append a numeric suffix until the slug is free.
    async fn unique_slug(&self, base: &str) -> Result<String> {
        if !self.store.slug_exists(base).await? {
            return Ok(base.to_string());
        }
        for n in 2.. {
            let candidate = format!("{base}-{n}");
            if !self.store.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        unreachable!("suffix search is unbounded");
    }

    async fn create_location(&self, lat: f64, lon: f64) -> Result<CatalogLocation> {
        let place = self
            .geocoder
            .reverse(lat, lon)
            .await?
            .ok_or(Error::UnsupportedRegion { lat, lon })?;

        // Re-check for a duplicate right before the write. This narrows the
        // window in which two concurrent requests create the same place; it
        // does not eliminate it, and a stray near-duplicate is tolerated as
        // a data-quality issue.
        let duplicates = self
            .store
            .nearest(lat, lon, 1, Some(self.config.duplicate_radius_km))
            .await?;
        if let Some(existing) = duplicates.first() {
            return Err(Error::DuplicateLocation {
                slug: existing.location.slug.clone(),
                distance_km: existing.distance_km,
            });
        }

        let base = slugify(&place.name);
        if base.is_empty() {
            return Err(Error::GeocodingUnavailable(format!(
                "unusable place name for ({lat},{lon})"
            )));
        }
        let slug = self.unique_slug(&base).await?;

        let elevation_m = match place.elevation_m {
            Some(e) => Some(e),
            None => Some(self.elevation.elevation(lat, lon).await?),
        };

        let country_code = if place.country_code.is_empty() {
            self.home_country.clone()
        } else {
            place.country_code.clone()
        };

        let location = CatalogLocation {
            slug: slug.clone(),
            name: place.name.clone(),
            admin1: place.admin1.clone(),
            country_code,
            latitude: lat,
            longitude: lon,
            elevation_m,
            tags: infer_tags(&place, elevation_m),
            provenance: Provenance::Geolocation,
        };

        self.store.insert(location.clone()).await?;
        info!(
            slug = %slug,
            name = %location.name,
            country = %location.country_code,
            "created catalog location from coordinates"
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLocationStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_candidate(slug: &str, country: &str, distance_km: f64) -> LocationCandidate {
        LocationCandidate {
            location: CatalogLocation {
                slug: slug.into(),
                name: slug.into(),
                admin1: None,
                country_code: country.into(),
                latitude: 0.0,
                longitude: 0.0,
                elevation_m: None,
                tags: Vec::new(),
                provenance: Provenance::Seed,
            },
            distance_km,
        }
    }

    #[test]
    fn test_pick_best_match_prefers_same_country() {
        // JB is nearer, but the caller is in Singapore.
        let candidates = vec![
            make_candidate("jb", "MY", 4.0),
            make_candidate("sg", "SG", 11.0),
        ];

        let best = pick_best_match(&candidates, Some("SG"), "MY").unwrap();
        assert_eq!(best.location.slug, "sg");

        // Case-insensitive match.
        let best = pick_best_match(&candidates, Some("sg"), "MY").unwrap();
        assert_eq!(best.location.slug, "sg");
    }

    #[test]
    fn test_pick_best_match_nearest_without_country() {
        let candidates = vec![
            make_candidate("jb", "MY", 4.0),
            make_candidate("sg", "SG", 11.0),
        ];
        let best = pick_best_match(&candidates, None, "MY").unwrap();
        assert_eq!(best.location.slug, "jb");
    }

    #[test]
    fn test_pick_best_match_falls_back_to_nearest() {
        let candidates = vec![
            make_candidate("jb", "MY", 4.0),
            make_candidate("sg", "SG", 11.0),
        ];
        // No Thai candidate in range: nearest wins.
        let best = pick_best_match(&candidates, Some("TH"), "MY").unwrap();
        assert_eq!(best.location.slug, "jb");
    }

    #[test]
    fn test_pick_best_match_empty_country_defaults_to_home() {
        let candidates = vec![
            make_candidate("unknown", "", 2.0),
            make_candidate("sg", "SG", 5.0),
        ];
        let best = pick_best_match(&candidates, Some("MY"), "MY").unwrap();
        assert_eq!(best.location.slug, "unknown");
    }

    #[test]
    fn test_pick_best_match_empty_slice() {
        assert!(pick_best_match(&[], Some("MY"), "MY").is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Gua Musang"), "gua-musang");
        assert_eq!(slugify("Kampung Baru, Sungai Buloh"), "kampung-baru-sungai-buloh");
        assert_eq!(slugify("  Teluk  Intan  "), "teluk-intan");
        assert_eq!(slugify("!!!"), "");
    }

    // ── Resolver fixtures ─────────────────────────────────────────────

    struct FixtureGeocoder {
        place: Option<GeocodedPlace>,
        fail: bool,
        calls: AtomicUsize,
        /// Location inserted into this store during reverse(), to model a
        /// concurrent create landing mid-flight.
        race_insert: Option<(Arc<MemoryLocationStore>, CatalogLocation)>,
    }

    impl FixtureGeocoder {
        fn returning(place: GeocodedPlace) -> Self {
            Self {
                place: Some(place),
                fail: false,
                calls: AtomicUsize::new(0),
                race_insert: None,
            }
        }

        fn failing() -> Self {
            Self {
                place: None,
                fail: true,
                calls: AtomicUsize::new(0),
                race_insert: None,
            }
        }
    }

    #[async_trait]
    impl Geocoder for FixtureGeocoder {
        async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<GeocodedPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::GeocodingUnavailable("fixture outage".into()));
            }
            if let Some((store, location)) = &self.race_insert {
                store.insert(location.clone()).await?;
            }
            let _ = (lat, lon);
            Ok(self.place.clone())
        }

        async fn forward(&self, _query: &str) -> Result<Vec<GeocodedPlace>> {
            Ok(Vec::new())
        }
    }

    struct FixtureElevation {
        value: Result<f64>,
    }

    #[async_trait]
    impl ElevationSource for FixtureElevation {
        async fn elevation(&self, _lat: f64, _lon: f64) -> Result<f64> {
            match &self.value {
                Ok(v) => Ok(*v),
                Err(_) => Err(Error::ElevationUnavailable("fixture outage".into())),
            }
        }
    }

    fn make_location(slug: &str, lat: f64, lon: f64, country: &str) -> CatalogLocation {
        CatalogLocation {
            slug: slug.into(),
            name: slug.into(),
            admin1: None,
            country_code: country.into(),
            latitude: lat,
            longitude: lon,
            elevation_m: Some(50.0),
            tags: Vec::new(),
            provenance: Provenance::Seed,
        }
    }

    fn make_place(name: &str, country: &str) -> GeocodedPlace {
        GeocodedPlace {
            name: name.into(),
            latitude: 4.88,
            longitude: 101.97,
            country_code: country.into(),
            country_name: Some("Malaysia".into()),
            admin1: Some("Kelantan".into()),
            elevation_m: None,
            kind: Some("town".into()),
        }
    }

    fn make_resolver(
        store: Arc<MemoryLocationStore>,
        geocoder: FixtureGeocoder,
        elevation: FixtureElevation,
    ) -> GeoResolver {
        GeoResolver::new(
            store,
            Arc::new(geocoder),
            Arc::new(elevation),
            GeoConfig::default(),
            "MY",
        )
    }

    #[tokio::test]
    async fn test_resolve_uses_uncapped_query_when_capped_is_empty() {
        // Only KL in the catalog; query from Kota Kinabalu, ~1600 km away.
        let store = Arc::new(MemoryLocationStore::with_seed(&[make_location(
            "kuala-lumpur",
            3.1390,
            101.6869,
            "MY",
        )]));
        let resolver = make_resolver(
            store,
            FixtureGeocoder::failing(),
            FixtureElevation { value: Ok(10.0) },
        );

        let resolved = resolver.resolve(5.97, 116.07, None).await.unwrap();
        assert_eq!(resolved.nearest.unwrap().slug, "kuala-lumpur");
        assert!(!resolved.is_new);
    }

    #[tokio::test]
    async fn test_resolve_empty_catalog_yields_none() {
        let resolver = make_resolver(
            Arc::new(MemoryLocationStore::new()),
            FixtureGeocoder::failing(),
            FixtureElevation { value: Ok(10.0) },
        );
        let resolved = resolver.resolve(3.0, 101.0, None).await.unwrap();
        assert!(resolved.nearest.is_none());
    }

    #[tokio::test]
    async fn test_resolve_or_create_attaches_to_nearby_existing() {
        let store = Arc::new(MemoryLocationStore::with_seed(&[make_location(
            "kuala-lumpur",
            3.1390,
            101.6869,
            "MY",
        )]));
        let geocoder = FixtureGeocoder::returning(make_place("Should Not Geocode", "MY"));
        let resolver = make_resolver(store.clone(), geocoder, FixtureElevation { value: Ok(10.0) });

        // ~10 km from KL: inside the 20 km duplicate radius.
        let resolved = resolver.resolve_or_create(3.05, 101.7, None).await.unwrap();
        assert_eq!(resolved.nearest.unwrap().slug, "kuala-lumpur");
        assert!(!resolved.is_new);
        assert_eq!(store.count().await, 1, "no new location created");
    }

    #[tokio::test]
    async fn test_resolve_or_create_creates_new_location() {
        let store = Arc::new(MemoryLocationStore::new());
        let geocoder = FixtureGeocoder::returning(make_place("Gua Musang", "MY"));
        let resolver = make_resolver(
            store.clone(),
            geocoder,
            FixtureElevation { value: Ok(84.0) },
        );

        let resolved = resolver.resolve_or_create(4.88, 101.97, None).await.unwrap();
        assert!(resolved.is_new);
        let created = resolved.nearest.unwrap();
        assert_eq!(created.slug, "gua-musang");
        assert_eq!(created.provenance, Provenance::Geolocation);
        assert_eq!(created.elevation_m, Some(84.0));
        assert_eq!(created.country_code, "MY");
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_or_create_outside_region() {
        let resolver = make_resolver(
            Arc::new(MemoryLocationStore::new()),
            FixtureGeocoder::returning(make_place("London", "GB")),
            FixtureElevation { value: Ok(10.0) },
        );
        let err = resolver.resolve_or_create(51.5, -0.13, None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedRegion { .. }));
    }

    #[tokio::test]
    async fn test_resolve_or_create_surfaces_geocoding_failure() {
        let resolver = make_resolver(
            Arc::new(MemoryLocationStore::new()),
            FixtureGeocoder::failing(),
            FixtureElevation { value: Ok(10.0) },
        );
        let err = resolver.resolve_or_create(4.88, 101.97, None).await.unwrap_err();
        assert!(matches!(err, Error::GeocodingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_or_create_surfaces_elevation_failure() {
        let resolver = make_resolver(
            Arc::new(MemoryLocationStore::new()),
            FixtureGeocoder::returning(make_place("Gua Musang", "MY")),
            FixtureElevation {
                value: Err(Error::ElevationUnavailable("down".into())),
            },
        );
        let err = resolver.resolve_or_create(4.88, 101.97, None).await.unwrap_err();
        assert!(matches!(err, Error::ElevationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_geocoder_elevation_short_circuits_lookup() {
        let mut place = make_place("Kundasang", "MY");
        place.elevation_m = Some(1_900.0);
        let resolver = make_resolver(
            Arc::new(MemoryLocationStore::new()),
            FixtureGeocoder::returning(place),
            FixtureElevation {
                value: Err(Error::ElevationUnavailable("should not be needed".into())),
            },
        );

        let resolved = resolver.resolve_or_create(5.98, 116.58, None).await.unwrap();
        let created = resolved.nearest.unwrap();
        assert_eq!(created.elevation_m, Some(1_900.0));
        // 1900 m with no extra keywords still earns the highland tag.
        assert!(created.tags.contains(&LocationTag::Highland));
    }

    #[tokio::test]
    async fn test_duplicate_race_observed_before_write() {
        let store = Arc::new(MemoryLocationStore::new());
        // The "other request" lands its create while ours is geocoding.
        let racing = make_location("gua-musang", 4.87, 101.96, "MY");
        let geocoder = FixtureGeocoder {
            place: Some(make_place("Gua Musang", "MY")),
            fail: false,
            calls: AtomicUsize::new(0),
            race_insert: Some((store.clone(), racing)),
        };
        let resolver = make_resolver(
            store.clone(),
            geocoder,
            FixtureElevation { value: Ok(84.0) },
        );

        let resolved = resolver.resolve_or_create(4.88, 101.97, None).await.unwrap();
        assert!(!resolved.is_new, "second create must observe the first");
        assert_eq!(resolved.nearest.unwrap().slug, "gua-musang");
        assert_eq!(store.count().await, 1, "exactly one location exists");
    }

    #[tokio::test]
    async fn test_slug_collision_gets_numeric_suffix() {
        // An existing, far-away location already owns the slug.
        let store = Arc::new(MemoryLocationStore::with_seed(&[make_location(
            "gua-musang",
            1.49,
            103.74,
            "MY",
        )]));
        let resolver = make_resolver(
            store.clone(),
            FixtureGeocoder::returning(make_place("Gua Musang", "MY")),
            FixtureElevation { value: Ok(84.0) },
        );

        let resolved = resolver.resolve_or_create(4.88, 101.97, None).await.unwrap();
        assert!(resolved.is_new);
        assert_eq!(resolved.nearest.unwrap().slug, "gua-musang-2");
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_infer_tags_from_metadata() {
        let mut place = make_place("Pulau Pangkor", "MY");
        place.kind = Some("island".into());
        let tags = infer_tags(&place, Some(12.0));
        assert!(tags.contains(&LocationTag::Coastal));
        assert!(tags.contains(&LocationTag::Tourism));
        assert!(!tags.contains(&LocationTag::Highland));
    }
}
