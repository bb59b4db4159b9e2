use super::types::ForecastPayload;
use super::ForecastFetch;
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure, timeout or non-success status from the provider.
    #[error("Weather provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered but the payload did not decode.
    #[error("Malformed provider payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

const HOURLY_FIELDS: &str =
    "temperature_2m,relativehumidity_2m,windspeed_10m,precipitation,pressure_msl";

pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .user_agent("WeatherTracker/1.0")
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            forecast_url: format!(
                "{}{}",
                config.openmeteo_base_url, config.openmeteo_forecast_path
            ),
        }
    }

    /// One forecast request for the given point: current conditions plus the
    /// hourly series, timestamps in the location's own timezone.
    pub async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastPayload, ProviderError> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();

        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("current_weather", "true"),
                ("hourly", HOURLY_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let payload: ForecastPayload = serde_json::from_str(&body)?;
        Ok(payload)
    }
}

#[async_trait]
impl ForecastFetch for OpenMeteoClient {
    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastPayload, ProviderError> {
        self.fetch_forecast(latitude, longitude).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        Config {
            openmeteo_base_url: base_url.to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("current_weather", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current_weather": {
                    "temperature": 12.5,
                    "windspeed": 3.1,
                    "time": "2024-03-01T12:00"
                },
                "hourly": {
                    "time": ["2024-03-01T00:00", "2024-03-01T01:00"],
                    "temperature_2m": [1.5, null],
                    "relativehumidity_2m": [80.0]
                }
            })))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&test_config(&server.uri()));
        let payload = client.fetch_forecast(48.8566, 2.3522).await.unwrap();

        let current = payload.current.unwrap();
        assert_eq!(current.temperature, 12.5);
        assert_eq!(current.pressure, None);

        let hourly = payload.hourly.unwrap();
        assert_eq!(hourly.time.len(), 2);
        assert_eq!(hourly.temperature_2m, vec![Some(1.5), None]);
        // Absent sequences decode as empty, not as an error.
        assert!(hourly.pressure_msl.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&test_config(&server.uri()));
        let err = client.fetch_forecast(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a forecast"))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&test_config(&server.uri()));
        let err = client.fetch_forecast(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
