use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

/// Validate latitude and longitude coordinates
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!(
            "Invalid latitude: {}. Must be between -90 and 90",
            lat
        ));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!(
            "Invalid longitude: {}. Must be between -180 and 180",
            lon
        ));
    }
    Ok(())
}

/// Validate a query time-of-day as padded HH:MM. The string is matched
/// against stored timestamps verbatim, so unpadded forms are rejected.
pub fn validate_time_of_day(value: &str) -> Result<(), String> {
    if value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok() {
        Ok(())
    } else {
        Err(format!("Invalid time format: {}. Use HH:MM", value))
    }
}

/// Error response helper
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
            timestamp: Utc::now(),
        }
    }
}
