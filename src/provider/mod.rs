pub mod mock;
pub mod openmeteo;
pub mod types;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use std::time::Duration;

use openmeteo::ProviderError;
use types::ForecastPayload;

/// Boundary to the outbound weather provider: one call per location,
/// failures typed as unavailable or malformed. The refresh pipeline only
/// depends on this trait, so tests can drive it with a mock.
#[async_trait]
pub trait ForecastFetch: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64)
        -> Result<ForecastPayload, ProviderError>;
}

/// Current-conditions record served by the pass-through endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSnapshot {
    pub temperature: f64,
    pub windspeed: f64,
    pub pressure: f64,
    pub time: Option<String>,
}

pub type CurrentWeatherCache = Cache<String, CurrentSnapshot>;

pub fn init_current_cache() -> CurrentWeatherCache {
    Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(10 * 60)) // 10 minutes
        .build()
}

pub fn current_cache_key(latitude: f64, longitude: f64) -> String {
    format!("current_{:.4}_{:.4}", latitude, longitude)
}
