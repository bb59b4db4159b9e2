use crate::database::{Database, DatabaseError, WeatherSample};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Measurement fields a query may project.
pub const MEASUREMENT_FIELDS: [&str; 5] = [
    "temperature",
    "humidity",
    "windspeed",
    "precipitation",
    "pressure",
];

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Location not found")]
    LocationNotFound,
    #[error("Weather forecast not found for the requested time")]
    ForecastNotFound,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Answers "weather at location X at time T" against the stored samples.
/// Reads only from the store; refresh timing is irrelevant here.
pub struct Resolver {
    database: Arc<Database>,
}

impl Resolver {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Resolve the location by (owner, name), match the stored samples on
    /// the HH:MM component of their timestamps (latest dated match wins) and
    /// project the requested fields. `time_of_day` is assumed pre-validated
    /// as padded HH:MM.
    pub async fn resolve(
        &self,
        owner_id: Option<Uuid>,
        name: &str,
        time_of_day: &str,
        fields: Option<&[String]>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let location = self
            .database
            .find_location(owner_id, name)
            .await?
            .ok_or(ResolveError::LocationNotFound)?;

        let sample = self
            .database
            .sample_at_time_of_day(location.id, time_of_day)
            .await?
            .ok_or(ResolveError::ForecastNotFound)?;

        Ok(project_fields(&sample, time_of_day, fields))
    }
}

/// Project a sample into a response record. A requested subset keeps only
/// recognized field names, dropping unknown ones silently; without a subset
/// the record carries all five measurements plus the requested time-of-day
/// string (not the stored timestamp).
pub(crate) fn project_fields(
    sample: &WeatherSample,
    time_of_day: &str,
    fields: Option<&[String]>,
) -> Map<String, Value> {
    let mut record = Map::new();

    match fields {
        Some(requested) => {
            for field in requested {
                if MEASUREMENT_FIELDS.contains(&field.as_str()) {
                    record.insert(field.clone(), json_number(measurement(sample, field)));
                }
            }
        }
        None => {
            for field in MEASUREMENT_FIELDS {
                record.insert(field.to_string(), json_number(measurement(sample, field)));
            }
            record.insert(
                "time".to_string(),
                Value::String(time_of_day.to_string()),
            );
        }
    }

    record
}

fn measurement(sample: &WeatherSample, field: &str) -> Option<f64> {
    match field {
        "temperature" => sample.temperature,
        "humidity" => sample.humidity,
        "windspeed" => sample.windspeed,
        "precipitation" => sample.precipitation,
        "pressure" => sample.pressure,
        _ => None,
    }
}

fn json_number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
