use serde::{Deserialize, Serialize};
use std::env;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub openmeteo_base_url: String,
    pub openmeteo_forecast_path: String,
    pub refresh_interval_minutes: u64,
    pub provider_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./weather_tracker.db".to_string()),
            openmeteo_base_url: env::var("OPENMETEO_BASE_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com".to_string()),
            openmeteo_forecast_path: env::var("OPENMETEO_FORECAST_PATH")
                .unwrap_or_else(|_| "/v1/forecast".to_string()),
            refresh_interval_minutes: env::var("REFRESH_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite:./weather_tracker.db".to_string(),
            openmeteo_base_url: "https://api.open-meteo.com".to_string(),
            openmeteo_forecast_path: "/v1/forecast".to_string(),
            refresh_interval_minutes: 15,
            provider_timeout_secs: 10,
        }
    }
}
