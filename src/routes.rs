use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    database::{Database, DatabaseError, Location},
    provider::{
        current_cache_key,
        openmeteo::{OpenMeteoClient, ProviderError},
        types::STANDARD_PRESSURE_HPA,
        CurrentSnapshot, CurrentWeatherCache, ForecastFetch,
    },
    refresh::{RefreshError, RefreshService},
    resolve::{Resolver, ResolveError},
    utils::{validate_coordinates, validate_time_of_day, ErrorResponse},
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub weather_client: Arc<OpenMeteoClient>,
    pub refresh: Arc<RefreshService<OpenMeteoClient>>,
    pub resolver: Arc<Resolver>,
    pub current_cache: CurrentWeatherCache,
}

/// Domain error mapped to a status code and an `ErrorResponse` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(&self.message, self.status.as_str());
        (self.status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::LocationExists => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            DatabaseError::OwnerNotFound => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
            DatabaseError::Query(_) | DatabaseError::WriteConflict(..) => {
                tracing::error!("Database failure: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::LocationNotFound | ResolveError::ForecastNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, e.to_string())
            }
            ResolveError::Database(inner) => inner.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        tracing::error!("Provider failure: {}", e);
        ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::Provider(inner) => inner.into(),
            RefreshError::Database(inner) => inner.into(),
        }
    }
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterUserResponse {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct AddLocationRequest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct AddLocationResponse {
    pub location: Location,
    pub samples_written: usize,
}

#[derive(Debug, Deserialize)]
pub struct WeatherAtTimeQuery {
    pub time: String,
    pub fields: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentWeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.database.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, ApiError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Username must not be empty",
        ));
    }

    let user = state.database.register_user(username).await?;
    Ok(Json(RegisterUserResponse {
        user_id: user.id,
        username: user.username,
    }))
}

/// Register a location and refresh it before answering, so a query straight
/// after registration can already see samples. A provider failure surfaces
/// here, but the location stays registered; the scheduled pass retries it.
pub async fn add_location(
    State(state): State<AppState>,
    Query(owner): Query<OwnerQuery>,
    Json(request): Json<AddLocationRequest>,
) -> Result<Json<AddLocationResponse>, ApiError> {
    validate_coordinates(request.latitude, request.longitude)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let location = state
        .database
        .create_location(
            owner.user_id,
            request.name.trim(),
            request.latitude,
            request.longitude,
        )
        .await?;

    let samples_written = state
        .refresh
        .refresh_one(location.id, location.latitude, location.longitude)
        .await?;

    Ok(Json(AddLocationResponse {
        location,
        samples_written,
    }))
}

pub async fn list_locations(
    State(state): State<AppState>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<Vec<Location>>, ApiError> {
    let locations = state.database.list_locations(owner.user_id).await?;
    Ok(Json(locations))
}

pub async fn weather_at_time(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<WeatherAtTimeQuery>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    validate_time_of_day(&query.time)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let fields = query.fields.as_deref().map(parse_fields_param);
    let record = state
        .resolver
        .resolve(query.user_id, &name, &query.time, fields.as_deref())
        .await?;

    Ok(Json(record))
}

pub async fn current_weather(
    State(state): State<AppState>,
    Query(query): Query<CurrentWeatherQuery>,
) -> Result<Json<CurrentSnapshot>, ApiError> {
    validate_coordinates(query.latitude, query.longitude)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let key = current_cache_key(query.latitude, query.longitude);
    if let Some(cached) = state.current_cache.get(&key).await {
        return Ok(Json(cached));
    }

    let payload = state
        .weather_client
        .fetch(query.latitude, query.longitude)
        .await?;
    let current = payload.current.ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_GATEWAY,
            "Provider response carried no current conditions",
        )
    })?;

    let snapshot = CurrentSnapshot {
        temperature: current.temperature,
        windspeed: current.windspeed,
        pressure: current.pressure.unwrap_or(STANDARD_PRESSURE_HPA),
        time: current.time,
    };
    state.current_cache.insert(key, snapshot.clone()).await;

    Ok(Json(snapshot))
}

fn parse_fields_param(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users/register", post(register_user))
        .route("/locations", post(add_location))
        .route("/locations", get(list_locations))
        .route("/locations/:name/weather", get(weather_at_time))
        .route("/weather/current", get(current_weather))
        .with_state(state)
}
