//! Process-wide breaker registry.
//!
//! One breaker per provider name, created lazily on first reference.
//! Constructed once at startup and passed by reference so tests can build
//! isolated instances; deliberately not a module-level singleton.

use crate::{BreakerState, CircuitBreaker};
use common::config::BreakerConfig;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the breaker for `name`, creating it with `config` on first use.
    pub fn get_or_create(&self, name: &str, config: &BreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config.clone())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// Current state of every registered breaker, for heartbeat logging.
    pub fn states(&self) -> Vec<(String, BreakerState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}
