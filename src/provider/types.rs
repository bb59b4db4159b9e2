use serde::{Deserialize, Serialize};

/// Sea-level standard atmosphere, substituted when the provider omits
/// pressure from a current-conditions snapshot. Hourly rows keep a missing
/// pressure as null instead.
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// One Open-Meteo forecast response. Either block may be absent, and the
/// hourly sequences may disagree in length; the refresh pipeline guards
/// every index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPayload {
    #[serde(rename = "current_weather")]
    pub current: Option<CurrentConditions>,
    pub hourly: Option<HourlySeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub windspeed: f64,
    pub pressure: Option<f64>,
    pub time: Option<String>,
}

/// Parallel per-hour sequences. Timestamps are ISO-8601 strings passed
/// through as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub relativehumidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default)]
    pub pressure_msl: Vec<Option<f64>>,
}
