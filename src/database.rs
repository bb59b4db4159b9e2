use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Owner not found")]
    OwnerNotFound,
    #[error("Location already tracked for this owner")]
    LocationExists,
    /// A unique violation that escaped the upsert's ON CONFLICT clause.
    #[error("Write conflict on ({0}, {1})")]
    WriteConflict(Uuid, String),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

/// One timestamped weather reading for a location. The timestamp is the
/// provider's ISO-8601 string, stored as-is (no timezone normalization).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherSample {
    pub location_id: Uuid,
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub windspeed: Option<f64>,
    pub precipitation: Option<f64>,
    pub pressure: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                id TEXT PRIMARY KEY,
                owner_id TEXT REFERENCES users(id),
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forecasts (
                location_id TEXT NOT NULL REFERENCES locations(id),
                timestamp TEXT NOT NULL,
                temperature REAL,
                humidity REAL,
                windspeed REAL,
                precipitation REAL,
                pressure REAL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (location_id, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_locations_owner ON locations(owner_id, name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register a username, returning the existing user when it is already
    /// taken.
    pub async fn register_user(&self, username: &str) -> Result<User, DatabaseError> {
        let id = Uuid::new_v4();

        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username) VALUES ($1, $2) RETURNING *",
        )
        .bind(id)
        .bind(username)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                    .bind(username)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn user_exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Create a tracked location. The (owner, name) pair must be unique, and
    /// a missing owner forms its own uniqueness group, so the duplicate check
    /// is an explicit lookup rather than a UNIQUE constraint (SQLite treats
    /// NULLs as distinct there).
    pub async fn create_location(
        &self,
        owner_id: Option<Uuid>,
        name: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Location, DatabaseError> {
        if let Some(owner) = owner_id {
            if !self.user_exists(owner).await? {
                return Err(DatabaseError::OwnerNotFound);
            }
        }

        if self.find_location(owner_id, name).await?.is_some() {
            return Err(DatabaseError::LocationExists);
        }

        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (id, owner_id, name, latitude, longitude, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(location)
    }

    pub async fn find_location(
        &self,
        owner_id: Option<Uuid>,
        name: &str,
    ) -> Result<Option<Location>, DatabaseError> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            SELECT * FROM locations
            WHERE (owner_id = $1 OR ($1 IS NULL AND owner_id IS NULL)) AND name = $2
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Locations of one owner group: the given owner's, or the shared group
    /// when no owner is given.
    pub async fn list_locations(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Location>, DatabaseError> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT * FROM locations
            WHERE (owner_id = $1 OR ($1 IS NULL AND owner_id IS NULL))
            ORDER BY name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    /// Every tracked location, for the fleet refresh pass.
    pub async fn all_locations(&self) -> Result<Vec<Location>, DatabaseError> {
        let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(locations)
    }

    /// Write one sample. A sample already stored under the same
    /// (location, timestamp) key is replaced in full, not merged.
    pub async fn upsert_sample(&self, sample: &WeatherSample) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO forecasts
                (location_id, timestamp, temperature, humidity, windspeed, precipitation, pressure, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (location_id, timestamp) DO UPDATE SET
                temperature = excluded.temperature,
                humidity = excluded.humidity,
                windspeed = excluded.windspeed,
                precipitation = excluded.precipitation,
                pressure = excluded.pressure,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(sample.location_id)
        .bind(&sample.timestamp)
        .bind(sample.temperature)
        .bind(sample.humidity)
        .bind(sample.windspeed)
        .bind(sample.precipitation)
        .bind(sample.pressure)
        .bind(sample.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                DatabaseError::WriteConflict(sample.location_id, sample.timestamp.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest sample whose stored timestamp carries the given HH:MM
    /// time-of-day. The pattern anchors at the ISO date/time separator, so
    /// the date, seconds and any timezone suffix are ignored; ties across
    /// dates go to the lexicographically greatest timestamp.
    pub async fn sample_at_time_of_day(
        &self,
        location_id: Uuid,
        time_of_day: &str,
    ) -> Result<Option<WeatherSample>, DatabaseError> {
        let sample = sqlx::query_as::<_, WeatherSample>(
            r#"
            SELECT * FROM forecasts
            WHERE location_id = $1 AND timestamp LIKE '%T' || $2 || '%'
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(location_id)
        .bind(time_of_day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sample)
    }

    pub async fn samples_for_location(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<WeatherSample>, DatabaseError> {
        let samples = sqlx::query_as::<_, WeatherSample>(
            "SELECT * FROM forecasts WHERE location_id = $1 ORDER BY timestamp",
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn test_database() -> Database {
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection, or each pooled connection would see its own empty
    // in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");

    let database = Database::new(pool);
    database.init_tables().await.expect("schema init");
    database
}
