//! Race data source trait definition

use crate::model::{CarTelemetrySample, Driver, Lap, LocationSample, Meeting, RaceSession};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for backends that serve race session data
///
/// Each source is responsible for:
/// - Listing meetings and their sessions for the picker
/// - Serving per-session driver, location, car telemetry and lap data
/// - Serving incremental updates for the live session, when it has one
#[async_trait]
pub trait RaceDataSource: Send + Sync {
    /// Get the name of this source (e.g., "OpenF1", "Demo")
    fn name(&self) -> &str;

    /// List the meetings of a year.
    async fn meetings(&self, year: i32) -> Result<Vec<Meeting>>;

    /// List the sessions of a meeting.
    async fn sessions(&self, meeting_key: u64) -> Result<Vec<RaceSession>>;

    /// Look one session up by key.
    async fn session(&self, session_key: u64) -> Result<Option<RaceSession>>;

    /// The session currently running, if any.
    ///
    /// `Ok(None)` means the source is reachable but nothing is live.
    async fn latest_session(&self) -> Result<Option<RaceSession>>;

    /// The driver roster of a session.
    async fn drivers(&self, session_key: u64) -> Result<Vec<Driver>>;

    /// One driver's world positions within `[start, end)`.
    async fn locations(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>>;

    /// One driver's car telemetry within `[start, end)`.
    async fn car_telemetry(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CarTelemetrySample>>;

    /// All timed laps of a session, every driver.
    async fn laps(&self, session_key: u64) -> Result<Vec<Lap>>;

    /// Positions of the live session strictly after `since`, all drivers.
    async fn location_updates(&self, since: DateTime<Utc>) -> Result<Vec<LocationSample>>;

    /// Car telemetry of the live session strictly after `since`, all drivers.
    async fn car_updates(&self, since: DateTime<Utc>) -> Result<Vec<CarTelemetrySample>>;
}
