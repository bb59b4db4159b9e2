use super::openmeteo::ProviderError;
use super::types::{CurrentConditions, ForecastPayload, HourlySeries};
use super::ForecastFetch;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic stand-in for the Open-Meteo client. Returns a fixed
/// payload, except for coordinates registered as failing, which report an
/// outage instead.
pub struct MockProvider {
    payload: ForecastPayload,
    failing: Vec<(f64, f64)>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn returning(payload: ForecastPayload) -> Self {
        Self {
            payload,
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, latitude: f64, longitude: f64) -> Self {
        self.failing.push((latitude, longitude));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A full payload: one current snapshot without pressure, and 24 hours
    /// of complete sequences for 2024-03-01.
    pub fn sample_payload() -> ForecastPayload {
        let hours: Vec<usize> = (0..24).collect();
        ForecastPayload {
            current: Some(CurrentConditions {
                temperature: 14.2,
                windspeed: 3.4,
                pressure: None,
                time: Some("2024-03-01T12:30".to_string()),
            }),
            hourly: Some(HourlySeries {
                time: hours
                    .iter()
                    .map(|h| format!("2024-03-01T{h:02}:00"))
                    .collect(),
                temperature_2m: hours.iter().map(|h| Some(10.0 + *h as f64 * 0.5)).collect(),
                relativehumidity_2m: hours.iter().map(|h| Some(60.0 + *h as f64)).collect(),
                windspeed_10m: hours.iter().map(|_| Some(2.0)).collect(),
                precipitation: hours.iter().map(|_| Some(0.0)).collect(),
                pressure_msl: hours.iter().map(|_| Some(1015.0)).collect(),
            }),
        }
    }
}

#[async_trait]
impl ForecastFetch for MockProvider {
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastPayload, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing
            .iter()
            .any(|&(lat, lon)| lat == latitude && lon == longitude)
        {
            return Err(ProviderError::Unavailable("simulated outage".to_string()));
        }

        Ok(self.payload.clone())
    }
}
