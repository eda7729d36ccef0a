//! Cuaca gateway library.
//!
//! The surface the presentation layer consumes: [`service::WeatherService`]
//! answers "weather for coordinates or slug" and "nearest catalog location
//! for coordinates", built on the breaker, cache, provider, and resolver
//! crates.

pub mod config;
pub mod service;

pub use service::WeatherService;
