//! OpenF1 API client
//!
//! Thin typed layer over the public OpenF1 REST API. Each endpoint method
//! performs one GET, decodes the JSON array the API serves, and converts
//! the wire rows into the core model types. Rows missing the fields a
//! sample cannot do without (driver, timestamp, coordinates) are dropped
//! during conversion; everything else is passed through.

use chrono::{DateTime, NaiveDateTime, Utc};
use orv_core::model::{
    CarMetrics, CarTelemetrySample, Driver, Lap, LocationSample, Meeting, RaceSession,
};
use orv_core::source::RaceDataSource;
use orv_core::units::{Gear, KilometersPerHour, Percentage, Rpm};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Public OpenF1 endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openf1.org/v1";

/// Range-filter timestamp format for finished sessions.
const HISTORICAL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Live range filters carry fractional seconds, so back-to-back polls do
/// not re-fetch the boundary sample.
const LIVE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct OpenF1Client {
    http: reqwest::Client,
    base: String,
}

impl OpenF1Client {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let url = format!("{}/{}", self.base, endpoint);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        response.json().await.map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    pub async fn meetings(&self, year: i32) -> Result<Vec<Meeting>, ApiError> {
        let rows: Vec<MeetingRow> = self
            .get_rows("meetings", &[("year", year.to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(MeetingRow::into_meeting).collect())
    }

    pub async fn sessions(&self, meeting_key: u64) -> Result<Vec<RaceSession>, ApiError> {
        let rows: Vec<SessionRow> = self
            .get_rows("sessions", &[("meeting_key", meeting_key.to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(SessionRow::into_session).collect())
    }

    pub async fn session(&self, session_key: u64) -> Result<Option<RaceSession>, ApiError> {
        let rows: Vec<SessionRow> = self
            .get_rows("sessions", &[("session_key", session_key.to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(SessionRow::into_session).next())
    }

    pub async fn latest_session(&self) -> Result<Option<RaceSession>, ApiError> {
        let rows: Vec<SessionRow> = self
            .get_rows("sessions", &[("session_key", "latest".to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(SessionRow::into_session).last())
    }

    pub async fn drivers(&self, session_key: u64) -> Result<Vec<Driver>, ApiError> {
        let rows: Vec<DriverRow> = self
            .get_rows("drivers", &[("session_key", session_key.to_string())])
            .await?;
        Ok(rows.into_iter().map(DriverRow::into_driver).collect())
    }

    pub async fn locations(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>, ApiError> {
        let query = [
            ("session_key", session_key.to_string()),
            ("driver_number", driver_number.to_string()),
            ("date>", start.format(HISTORICAL_DATE_FORMAT).to_string()),
            ("date<", end.format(HISTORICAL_DATE_FORMAT).to_string()),
        ];
        let rows: Vec<LocationRow> = self.get_rows("location", &query).await?;
        Ok(rows.into_iter().filter_map(LocationRow::into_sample).collect())
    }

    pub async fn car_telemetry(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CarTelemetrySample>, ApiError> {
        let query = [
            ("session_key", session_key.to_string()),
            ("driver_number", driver_number.to_string()),
            ("date>", start.format(HISTORICAL_DATE_FORMAT).to_string()),
            ("date<", end.format(HISTORICAL_DATE_FORMAT).to_string()),
        ];
        let rows: Vec<CarRow> = self.get_rows("car_data", &query).await?;
        Ok(rows.into_iter().filter_map(CarRow::into_sample).collect())
    }

    pub async fn laps(&self, session_key: u64) -> Result<Vec<Lap>, ApiError> {
        let rows: Vec<LapRow> = self
            .get_rows("laps", &[("session_key", session_key.to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(LapRow::into_lap).collect())
    }

    /// Live-session positions strictly newer than `since`, all drivers.
    pub async fn live_locations(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>, ApiError> {
        let query = [
            ("session_key", "latest".to_string()),
            ("date>", since.format(LIVE_DATE_FORMAT).to_string()),
        ];
        let rows: Vec<LocationRow> = self.get_rows("location", &query).await?;
        Ok(rows.into_iter().filter_map(LocationRow::into_sample).collect())
    }

    /// Live-session car telemetry strictly newer than `since`, all drivers.
    pub async fn live_car_telemetry(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<CarTelemetrySample>, ApiError> {
        let query = [
            ("session_key", "latest".to_string()),
            ("date>", since.format(LIVE_DATE_FORMAT).to_string()),
        ];
        let rows: Vec<CarRow> = self.get_rows("car_data", &query).await?;
        Ok(rows.into_iter().filter_map(CarRow::into_sample).collect())
    }
}

impl Default for OpenF1Client {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[async_trait::async_trait]
impl RaceDataSource for OpenF1Client {
    fn name(&self) -> &str {
        "OpenF1"
    }

    async fn meetings(&self, year: i32) -> anyhow::Result<Vec<Meeting>> {
        Ok(OpenF1Client::meetings(self, year).await?)
    }

    async fn sessions(&self, meeting_key: u64) -> anyhow::Result<Vec<RaceSession>> {
        Ok(OpenF1Client::sessions(self, meeting_key).await?)
    }

    async fn session(&self, session_key: u64) -> anyhow::Result<Option<RaceSession>> {
        Ok(OpenF1Client::session(self, session_key).await?)
    }

    async fn latest_session(&self) -> anyhow::Result<Option<RaceSession>> {
        Ok(OpenF1Client::latest_session(self).await?)
    }

    async fn drivers(&self, session_key: u64) -> anyhow::Result<Vec<Driver>> {
        Ok(OpenF1Client::drivers(self, session_key).await?)
    }

    async fn locations(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LocationSample>> {
        Ok(OpenF1Client::locations(self, session_key, driver_number, start, end).await?)
    }

    async fn car_telemetry(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CarTelemetrySample>> {
        Ok(OpenF1Client::car_telemetry(self, session_key, driver_number, start, end).await?)
    }

    async fn laps(&self, session_key: u64) -> anyhow::Result<Vec<Lap>> {
        Ok(OpenF1Client::laps(self, session_key).await?)
    }

    async fn location_updates(
        &self,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LocationSample>> {
        Ok(self.live_locations(since).await?)
    }

    async fn car_updates(
        &self,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CarTelemetrySample>> {
        Ok(self.live_car_telemetry(since).await?)
    }
}

// =============================================================================
// Wire rows — the shapes the API actually serves
// =============================================================================

/// The API mixes `+00:00`-offset and naive timestamp strings; accept both,
/// reading naive ones as UTC.
fn parse_wire_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn de_date_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_wire_date))
}

#[derive(Debug, Deserialize)]
struct MeetingRow {
    meeting_key: u64,
    #[serde(default)]
    meeting_name: Option<String>,
    #[serde(default)]
    circuit_short_name: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    year: i32,
    #[serde(default, deserialize_with = "de_date_opt")]
    date_start: Option<DateTime<Utc>>,
}

impl MeetingRow {
    fn into_meeting(self) -> Option<Meeting> {
        Some(Meeting {
            meeting_key: self.meeting_key,
            meeting_name: self.meeting_name.unwrap_or_default(),
            circuit_short_name: self.circuit_short_name.unwrap_or_default(),
            country_name: self.country_name.unwrap_or_default(),
            year: self.year,
            date_start: self.date_start?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    session_key: u64,
    meeting_key: u64,
    #[serde(default)]
    session_name: Option<String>,
    #[serde(default)]
    session_type: Option<String>,
    #[serde(default)]
    circuit_short_name: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    year: i32,
    #[serde(default, deserialize_with = "de_date_opt")]
    date_start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_date_opt")]
    date_end: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn into_session(self) -> Option<RaceSession> {
        Some(RaceSession {
            session_key: self.session_key,
            meeting_key: self.meeting_key,
            session_name: self.session_name.unwrap_or_default(),
            session_type: self.session_type.unwrap_or_default(),
            circuit_short_name: self.circuit_short_name.unwrap_or_default(),
            country_name: self.country_name.unwrap_or_default(),
            year: self.year,
            date_start: self.date_start?,
            date_end: self.date_end?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DriverRow {
    driver_number: u32,
    #[serde(default)]
    name_acronym: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    team_name: Option<String>,
    #[serde(default)]
    team_colour: Option<String>,
}

impl DriverRow {
    fn into_driver(self) -> Driver {
        let acronym = self
            .name_acronym
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("#{}", self.driver_number));
        let full_name = self
            .full_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| acronym.clone());
        Driver {
            driver_number: self.driver_number,
            name_acronym: acronym,
            full_name,
            team_name: self.team_name.unwrap_or_default(),
            team_color: self.team_colour.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    driver_number: Option<u32>,
    #[serde(default, deserialize_with = "de_date_opt")]
    date: Option<DateTime<Utc>>,
    x: Option<f64>,
    y: Option<f64>,
}

impl LocationRow {
    fn into_sample(self) -> Option<LocationSample> {
        Some(LocationSample {
            driver_number: self.driver_number?,
            date: self.date?,
            x: self.x?,
            y: self.y?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CarRow {
    driver_number: Option<u32>,
    #[serde(default, deserialize_with = "de_date_opt")]
    date: Option<DateTime<Utc>>,
    speed: Option<f64>,
    throttle: Option<f64>,
    brake: Option<f64>,
    rpm: Option<f64>,
    n_gear: Option<i64>,
}

impl CarRow {
    fn into_sample(self) -> Option<CarTelemetrySample> {
        Some(CarTelemetrySample {
            driver_number: self.driver_number?,
            date: self.date?,
            metrics: CarMetrics {
                speed: KilometersPerHour(self.speed.unwrap_or_default()),
                throttle: Percentage::new(self.throttle.unwrap_or_default()),
                brake: Percentage::new(self.brake.unwrap_or_default()),
                rpm: Rpm(self.rpm.unwrap_or_default()),
                gear: Gear::new(self.n_gear.unwrap_or_default()),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct LapRow {
    driver_number: Option<u32>,
    lap_number: Option<u32>,
    #[serde(default, deserialize_with = "de_date_opt")]
    date_start: Option<DateTime<Utc>>,
    lap_duration: Option<f64>,
    duration_sector_1: Option<f64>,
    duration_sector_2: Option<f64>,
    duration_sector_3: Option<f64>,
}

impl LapRow {
    fn into_lap(self) -> Option<Lap> {
        Some(Lap {
            driver_number: self.driver_number?,
            lap_number: self.lap_number?,
            // a started but untimed lap is allowed to keep its start
            date_start: self.date_start,
            lap_duration: self.lap_duration?,
            sector_durations: [
                self.duration_sector_1,
                self.duration_sector_2,
                self.duration_sector_3,
            ],
        })
    }
}
