use crate::database::{Database, DatabaseError, WeatherSample};
use crate::provider::openmeteo::ProviderError;
use crate::provider::types::STANDARD_PRESSURE_HPA;
use crate::provider::ForecastFetch;
use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Hourly entries ingested per refresh. The provider reports a multi-day
/// series; only the first day's worth is tracked.
pub const HOURLY_ENTRIES_PER_REFRESH: usize = 24;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

/// Fetches provider forecasts and reconciles them into the store, one
/// location at a time.
pub struct RefreshService<P> {
    database: Arc<Database>,
    provider: Arc<P>,
}

impl<P: ForecastFetch> RefreshService<P> {
    pub fn new(database: Arc<Database>, provider: Arc<P>) -> Self {
        Self { database, provider }
    }

    /// Fetch the forecast for one location and upsert the current-conditions
    /// snapshot plus the first day of hourly samples. Returns how many
    /// samples were written. Every write carries the fetch completion time
    /// as `updated_at`, independent of provider-reported timestamps.
    pub async fn refresh_one(
        &self,
        location_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<usize, RefreshError> {
        let payload = self.provider.fetch(latitude, longitude).await?;
        let fetched_at = Utc::now();
        let mut written = 0;

        if let Some(current) = &payload.current {
            let timestamp = current
                .time
                .clone()
                .unwrap_or_else(|| Local::now().format("%Y-%m-%dT%H:%M").to_string());

            let sample = WeatherSample {
                location_id,
                timestamp,
                temperature: Some(current.temperature),
                humidity: None,
                windspeed: Some(current.windspeed),
                precipitation: None,
                // Snapshot-only default; hourly rows keep missing pressure null.
                pressure: Some(current.pressure.unwrap_or(STANDARD_PRESSURE_HPA)),
                updated_at: fetched_at,
            };
            self.database.upsert_sample(&sample).await?;
            written += 1;
        }

        if let Some(hourly) = &payload.hourly {
            for (index, timestamp) in hourly
                .time
                .iter()
                .take(HOURLY_ENTRIES_PER_REFRESH)
                .enumerate()
            {
                let sample = WeatherSample {
                    location_id,
                    timestamp: timestamp.clone(),
                    temperature: value_at(&hourly.temperature_2m, index),
                    humidity: value_at(&hourly.relativehumidity_2m, index),
                    windspeed: value_at(&hourly.windspeed_10m, index),
                    precipitation: value_at(&hourly.precipitation, index),
                    pressure: value_at(&hourly.pressure_msl, index),
                    updated_at: fetched_at,
                };
                self.database.upsert_sample(&sample).await?;
                written += 1;
            }
        }

        Ok(written)
    }

    /// Refresh every tracked location, strictly in turn. A failing location
    /// is logged and skipped; it never aborts the rest of the pass.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, DatabaseError> {
        let locations = self.database.all_locations().await?;
        let mut summary = RefreshSummary::default();

        for location in locations {
            match self
                .refresh_one(location.id, location.latitude, location.longitude)
                .await
            {
                Ok(written) => {
                    tracing::debug!("Refreshed {} samples for '{}'", written, location.name);
                    summary.refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!("Refresh failed for '{}': {}", location.name, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Run the fleet refresh on a fixed interval. The first tick fires
    /// immediately.
    pub fn spawn_interval(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()>
    where
        P: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.refresh_all().await {
                    Ok(summary) => tracing::info!(
                        "Fleet refresh: {} refreshed, {} failed",
                        summary.refreshed,
                        summary.failed
                    ),
                    Err(e) => tracing::error!("Fleet refresh aborted: {}", e),
                }
            }
        })
    }
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_database;
    use crate::provider::mock::MockProvider;
    use crate::provider::types::{CurrentConditions, ForecastPayload, HourlySeries};

    fn service(database: Arc<Database>, provider: MockProvider) -> RefreshService<MockProvider> {
        RefreshService::new(database, Arc::new(provider))
    }

    #[tokio::test]
    async fn test_refresh_writes_current_and_hourly_samples() {
        let db = Arc::new(test_database().await);
        let location = db.create_location(None, "Paris", 48.8566, 2.3522).await.unwrap();

        let refresh = service(db.clone(), MockProvider::returning(MockProvider::sample_payload()));
        let written = refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();

        assert_eq!(written, 25); // 1 current + 24 hourly
        let stored = db.samples_for_location(location.id).await.unwrap();
        assert_eq!(stored.len(), 25);

        // The snapshot row carries the defaulted pressure and no humidity.
        let snapshot = stored
            .iter()
            .find(|s| s.timestamp == "2024-03-01T12:30")
            .unwrap();
        assert_eq!(snapshot.pressure, Some(STANDARD_PRESSURE_HPA));
        assert_eq!(snapshot.temperature, Some(14.2));
        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.precipitation, None);
    }

    #[tokio::test]
    async fn test_hourly_series_is_capped_at_one_day() {
        let db = Arc::new(test_database().await);
        let location = db.create_location(None, "Lima", -12.05, -77.04).await.unwrap();

        let payload = ForecastPayload {
            current: None,
            hourly: Some(HourlySeries {
                time: (0..48).map(|h| format!("2024-03-0{}T{:02}:00", 1 + h / 24, h % 24)).collect(),
                temperature_2m: (0..48).map(|h| Some(h as f64)).collect(),
                ..HourlySeries::default()
            }),
        };

        let refresh = service(db.clone(), MockProvider::returning(payload));
        let written = refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();

        assert_eq!(written, HOURLY_ENTRIES_PER_REFRESH);
        let stored = db.samples_for_location(location.id).await.unwrap();
        assert_eq!(stored.len(), HOURLY_ENTRIES_PER_REFRESH);
        assert!(stored.iter().all(|s| s.timestamp.starts_with("2024-03-01")));
    }

    #[tokio::test]
    async fn test_short_field_series_yields_nulls_not_errors() {
        let db = Arc::new(test_database().await);
        let location = db.create_location(None, "Quito", -0.18, -78.47).await.unwrap();

        let payload = ForecastPayload {
            current: None,
            hourly: Some(HourlySeries {
                time: vec![
                    "2024-03-01T00:00".to_string(),
                    "2024-03-01T01:00".to_string(),
                    "2024-03-01T02:00".to_string(),
                ],
                temperature_2m: vec![Some(20.0), Some(21.0), Some(22.0)],
                relativehumidity_2m: vec![Some(70.0)], // shorter than time
                ..HourlySeries::default()
            }),
        };

        let refresh = service(db.clone(), MockProvider::returning(payload));
        let written = refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();
        assert_eq!(written, 3);

        let stored = db.samples_for_location(location.id).await.unwrap();
        assert_eq!(stored[0].humidity, Some(70.0));
        assert_eq!(stored[1].humidity, None);
        assert_eq!(stored[2].humidity, None);
        // Sequences absent from the payload stay null on every row.
        assert!(stored.iter().all(|s| s.pressure.is_none()));
    }

    #[tokio::test]
    async fn test_second_refresh_replaces_samples_in_full() {
        let db = Arc::new(test_database().await);
        let location = db.create_location(None, "Oslo", 59.91, 10.75).await.unwrap();

        let first = ForecastPayload {
            current: None,
            hourly: Some(HourlySeries {
                time: vec!["2024-03-01T06:00".to_string()],
                temperature_2m: vec![Some(-3.0)],
                relativehumidity_2m: vec![Some(90.0)],
                ..HourlySeries::default()
            }),
        };
        let refresh = service(db.clone(), MockProvider::returning(first));
        refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();
        let before = db.samples_for_location(location.id).await.unwrap()[0].clone();

        let second = ForecastPayload {
            current: None,
            hourly: Some(HourlySeries {
                time: vec!["2024-03-01T06:00".to_string()],
                temperature_2m: vec![Some(-1.5)],
                ..HourlySeries::default()
            }),
        };
        let refresh = service(db.clone(), MockProvider::returning(second));
        refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();

        let stored = db.samples_for_location(location.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].temperature, Some(-1.5));
        assert_eq!(stored[0].humidity, None); // replaced, not merged
        assert!(stored[0].updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_missing_snapshot_time_falls_back_to_wall_clock() {
        let db = Arc::new(test_database().await);
        let location = db.create_location(None, "Perth", -31.95, 115.86).await.unwrap();

        let payload = ForecastPayload {
            current: Some(CurrentConditions {
                temperature: 25.0,
                windspeed: 4.0,
                pressure: Some(1011.0),
                time: None,
            }),
            hourly: None,
        };

        let refresh = service(db.clone(), MockProvider::returning(payload));
        refresh
            .refresh_one(location.id, location.latitude, location.longitude)
            .await
            .unwrap();

        let stored = db.samples_for_location(location.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        // Minute-precision local wall clock, same shape the provider reports.
        assert_eq!(stored[0].timestamp.len(), "2024-03-01T12:30".len());
        assert!(stored[0].timestamp.contains('T'));
        assert_eq!(stored[0].pressure, Some(1011.0));
    }

    #[tokio::test]
    async fn test_fleet_pass_survives_a_failing_location() {
        let db = Arc::new(test_database().await);
        let broken = db.create_location(None, "Atlantis", 0.0, 0.0).await.unwrap();
        let healthy = db.create_location(None, "Paris", 48.8566, 2.3522).await.unwrap();

        let provider = Arc::new(
            MockProvider::returning(MockProvider::sample_payload())
                .failing_for(broken.latitude, broken.longitude),
        );
        let refresh = RefreshService::new(db.clone(), provider.clone());

        let summary = refresh.refresh_all().await.unwrap();
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(provider.calls(), 2); // both locations were attempted

        assert!(db.samples_for_location(broken.id).await.unwrap().is_empty());
        assert!(!db.samples_for_location(healthy.id).await.unwrap().is_empty());
    }
}
