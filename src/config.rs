//! Configuration loader — merges env vars, .env file, and config.toml.

use common::{Error, GatewayConfig};
use std::collections::HashSet;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_positive_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number > 0")))?;
    if parsed <= 0.0 {
        return Err(Error::Config(format!("{env_name} must be a number > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &GatewayConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.home_country.len() != 2 || !config.home_country.chars().all(|c| c.is_ascii_alphabetic())
    {
        issues.push("home_country must be a two-letter ISO code".into());
    }

    if config.locations.is_empty() {
        issues.push("locations must contain at least one seed location".into());
    }
    let mut seen_slugs = HashSet::new();
    for location in &config.locations {
        if !seen_slugs.insert(location.slug.as_str()) {
            issues.push(format!("duplicate seed slug '{}'", location.slug));
        }
        if !config
            .geo
            .in_supported_region(location.latitude, location.longitude)
        {
            issues.push(format!(
                "seed location '{}' lies outside geo.region_bounds",
                location.slug
            ));
        }
    }

    for (name, breaker) in [
        ("primary", &config.breakers.primary),
        ("secondary", &config.breakers.secondary),
        ("llm", &config.breakers.llm),
    ] {
        if breaker.failure_threshold == 0 {
            issues.push(format!("breakers.{name}.failure_threshold must be > 0"));
        }
        if breaker.window_secs == 0 {
            issues.push(format!("breakers.{name}.window_secs must be > 0"));
        }
        if breaker.call_timeout_ms == 0 {
            issues.push(format!("breakers.{name}.call_timeout_ms must be > 0"));
        }
    }

    if config.cache.weather_ttl_secs == 0 {
        issues.push("cache.weather_ttl_secs must be > 0".into());
    }
    if config.cache.fallback_ttl_secs == 0 {
        issues.push("cache.fallback_ttl_secs must be > 0".into());
    }
    if config.cache.summary_ttl_popular_secs > config.cache.summary_ttl_active_secs {
        issues.push("cache.summary_ttl_popular_secs must be <= summary_ttl_active_secs".into());
    }
    if config.cache.summary_ttl_active_secs > config.cache.summary_ttl_default_secs {
        issues.push("cache.summary_ttl_active_secs must be <= summary_ttl_default_secs".into());
    }
    if config.cache.summary_stale_drift_c <= 0.0 {
        issues.push("cache.summary_stale_drift_c must be > 0".into());
    }

    if config.geo.nearest_limit == 0 {
        issues.push("geo.nearest_limit must be > 0".into());
    }
    if config.geo.max_distance_km <= 0.0 {
        issues.push("geo.max_distance_km must be > 0".into());
    }
    if config.geo.duplicate_radius_km <= 0.0 {
        issues.push("geo.duplicate_radius_km must be > 0".into());
    }
    if config.geo.duplicate_radius_km > config.geo.max_distance_km {
        issues.push("geo.duplicate_radius_km must be <= geo.max_distance_km".into());
    }
    let [lat_min, lat_max, lon_min, lon_max] = config.geo.region_bounds;
    if lat_min >= lat_max || lon_min >= lon_max {
        issues.push("geo.region_bounds must be [lat_min, lat_max, lon_min, lon_max]".into());
    }

    if config.timing.refresh_interval_secs == 0 {
        issues.push("timing.refresh_interval_secs must be > 0".into());
    }
    if config.timing.heartbeat_interval_secs == 0 {
        issues.push("timing.heartbeat_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load gateway configuration from environment and optional config file.
pub fn load_config() -> Result<GatewayConfig, Error> {
    // 1. Load .env file if present.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = GatewayConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(country) = std::env::var("CUACA_HOME_COUNTRY") {
        config.home_country = country.trim().to_uppercase();
    }
    if let Ok(key) = std::env::var("WEATHERAPI_KEY") {
        config.weatherapi_key = key;
    }
    if let Ok(raw) = std::env::var("CUACA_WEATHER_TTL_SECS") {
        config.cache.weather_ttl_secs = parse_positive_u64(&raw, "CUACA_WEATHER_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("CUACA_REFRESH_INTERVAL_SECS") {
        config.timing.refresh_interval_secs =
            parse_positive_u64(&raw, "CUACA_REFRESH_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("CUACA_MAX_DISTANCE_KM") {
        config.geo.max_distance_km = parse_positive_f64(&raw, "CUACA_MAX_DISTANCE_KM")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
