//! Cuaca gateway daemon.
//!
//! Single-binary Tokio application that:
//! 1. Seeds the location catalog
//! 2. Keeps weather for every catalog location warm in the cache
//! 3. Tracks provider health through per-provider breakers
//! 4. Answers coordinate and slug lookups for the presentation layer

use std::sync::Arc;
use std::time::Duration;

use breaker::BreakerRegistry;
use cache::MemoryStore;
use clap::Parser;
use common::{GatewayConfig, Source};
use cuaca_gateway::{config, WeatherService};
use georesolve::{HttpElevation, HttpGeocoder, MemoryLocationStore};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Weather gateway with provider fallback and geospatial caching.
#[derive(Parser)]
#[command(name = "cuaca-gateway", about = "Resilient weather gateway")]
struct Cli {
    /// Run a single catalog refresh pass and exit.
    #[arg(long)]
    once: bool,

    /// Probe the provider chain once and exit.
    #[arg(long)]
    check_providers: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cuaca_gateway=info,providers=info,breaker=info,cache=info,georesolve=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Cuaca gateway starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Catalog: {} locations, home country {}",
        cfg.locations.len(),
        cfg.home_country
    );
    info!(
        "Breakers: primary {}f/{}s cooldown {}s, secondary {}f/{}s cooldown {}s",
        cfg.breakers.primary.failure_threshold,
        cfg.breakers.primary.window_secs,
        cfg.breakers.primary.cooldown_secs,
        cfg.breakers.secondary.failure_threshold,
        cfg.breakers.secondary.window_secs,
        cfg.breakers.secondary.cooldown_secs,
    );
    info!(
        "Cache: weather {}s, fallback {}s, summaries {}/{}/{}s",
        cfg.cache.weather_ttl_secs,
        cfg.cache.fallback_ttl_secs,
        cfg.cache.summary_ttl_popular_secs,
        cfg.cache.summary_ttl_active_secs,
        cfg.cache.summary_ttl_default_secs,
    );

    // ── Shared state ─────────────────────────────────────────────────
    let registry = Arc::new(BreakerRegistry::new());
    let service = Arc::new(WeatherService::new(
        cfg.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryLocationStore::with_seed(&cfg.locations)),
        Arc::new(HttpGeocoder::new()),
        Arc::new(HttpElevation::new()),
        &registry,
    ));

    // ── Check-providers mode ─────────────────────────────────────────
    if cli.check_providers {
        let probe = &cfg.locations[0];
        info!("Probing provider chain via '{}'...", probe.slug);
        match service.weather_for_slug(&probe.slug).await {
            Ok(result) => {
                info!(
                    "Probe answered from {} ({:.1}°C, code {})",
                    result.source,
                    result.data.current.temperature_c,
                    result.data.current.weather_code
                );
                if result.source == Source::Fallback {
                    warn!("Chain exhausted; answer was synthetic");
                }
            }
            Err(e) => {
                error!("Probe failed: {}", e);
                std::process::exit(1);
            }
        }
        for (name, state) in registry.states() {
            info!("Breaker {}: {:?}", name, state);
        }
        return;
    }

    // ── Once mode ────────────────────────────────────────────────────
    if cli.once {
        run_refresh(&service, &cfg).await;
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    info!("Spawning tasks...");

    // Task 1: Catalog refresh
    let refresh_service = service.clone();
    let refresh_cfg = cfg.clone();
    let refresh_handle = tokio::spawn(async move {
        loop {
            run_refresh(&refresh_service, &refresh_cfg).await;
            sleep(Duration::from_secs(refresh_cfg.timing.refresh_interval_secs)).await;
        }
    });

    // Task 2: Heartbeat
    let hb_registry = registry.clone();
    let hb_cfg = cfg.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(
            hb_cfg.timing.heartbeat_interval_secs,
        ));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let states = hb_registry.states();
            let summary: Vec<String> = states
                .iter()
                .map(|(name, state)| format!("{name}={state:?}"))
                .collect();
            info!(
                "HEARTBEAT: locations={} breakers=[{}]",
                hb_cfg.locations.len(),
                summary.join(", ")
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Cuaca gateway is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = refresh_handle => {
            error!("Refresh task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    info!("Cuaca gateway shut down.");
}

// ── Task implementations ────────────────────────────────────────────

/// One pass over the catalog, warming the weather cache for every slug.
async fn run_refresh(service: &WeatherService, cfg: &GatewayConfig) {
    info!("Refreshing catalog weather...");

    let mut served = 0usize;
    let mut synthetic = 0usize;
    for location in &cfg.locations {
        match service.weather_for_slug(&location.slug).await {
            Ok(result) => {
                served += 1;
                if result.source == Source::Fallback {
                    synthetic += 1;
                }
                info!(
                    "{}: {:.1}°C code {} via {}",
                    location.slug,
                    result.data.current.temperature_c,
                    result.data.current.weather_code,
                    result.source
                );
            }
            Err(e) => {
                warn!("Refresh failed for {}: {}", location.slug, e);
            }
        }
    }

    info!(
        "Refresh complete: {}/{} served, {} synthetic",
        served,
        cfg.locations.len(),
        synthetic
    );
}
