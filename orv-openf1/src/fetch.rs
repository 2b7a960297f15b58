//! Session loading
//!
//! Assembles everything a session viewing needs in one pass: resolve the
//! session, load the roster, pull each requested driver's location and car
//! telemetry over the session window, merge, build the frame table, fetch
//! laps, compute extents. Loading runs to completion or fails outright;
//! individual fetch failures downgrade to "no data for that piece" unless
//! the result would be a session with no positions at all.

use chrono::{DateTime, TimeDelta, Utc};
use orv_core::align::{merge_streams, MergeMode};
use orv_core::frames::FrameTable;
use orv_core::geom::TrackExtents;
use orv_core::model::{DriverRoster, Lap, MergedSample, RaceSession};
use orv_core::source::RaceDataSource;
use thiserror::Error;
use tracing::{info, warn};

/// How far back the initial live fetch reaches.
pub const LIVE_LOOKBACK_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no session is currently live")]
    NoLiveSession,
    #[error("session {0} not found")]
    SessionNotFound(u64),
    #[error("the session has no drivers listed")]
    NoDrivers,
    #[error("no location data for any requested driver")]
    NoLocations,
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Everything derived from one session selection. Rebuilt wholesale when
/// the selection changes; only `merged` and `frames` grow in live mode.
#[derive(Debug)]
pub struct SessionBundle {
    pub session: RaceSession,
    pub roster: DriverRoster,
    /// The drivers whose data was requested; the UI's default selection.
    pub driver_numbers: Vec<u32>,
    pub merged: Vec<MergedSample>,
    pub frames: FrameTable,
    pub laps: Vec<Lap>,
    pub extents: TrackExtents,
    pub mode: MergeMode,
}

impl SessionBundle {
    /// The driver whose positions trace the track background.
    pub fn reference_driver(&self) -> Option<u32> {
        self.merged.first().map(|m| m.driver_number)
    }

    /// The reference driver's positions in time order, for the track
    /// silhouette.
    pub fn reference_path(&self) -> Vec<(f64, f64)> {
        let Some(reference) = self.reference_driver() else {
            return Vec::new();
        };
        self.merged
            .iter()
            .filter(|m| m.driver_number == reference)
            .map(|m| (m.x, m.y))
            .collect()
    }

    pub fn is_live(&self) -> bool {
        self.mode == MergeMode::Live
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.frames.timestamps().last().copied()
    }
}

/// Load a finished session over its full time window.
pub async fn load_historical(
    source: &dyn RaceDataSource,
    session_key: u64,
    driver_numbers: Option<&[u32]>,
) -> Result<SessionBundle, LoadError> {
    let session = source
        .session(session_key)
        .await?
        .ok_or(LoadError::SessionNotFound(session_key))?;

    let roster = load_roster(source, session.session_key).await?;
    let wanted = select_drivers(&roster, driver_numbers)?;

    let mut locations = Vec::new();
    let mut telemetry = Vec::new();
    for &driver in &wanted {
        match source
            .locations(session.session_key, driver, session.date_start, session.date_end)
            .await
        {
            Ok(rows) if rows.is_empty() => warn!("no location data for driver {driver}"),
            Ok(rows) => locations.extend(rows),
            Err(e) => warn!("location fetch failed for driver {driver}: {e:#}"),
        }
        match source
            .car_telemetry(session.session_key, driver, session.date_start, session.date_end)
            .await
        {
            Ok(rows) => telemetry.extend(rows),
            Err(e) => warn!("car telemetry fetch failed for driver {driver}: {e:#}"),
        }
    }

    let laps = load_laps(source, session.session_key).await;
    let merged = merge_streams(locations, telemetry, MergeMode::Historical);
    assemble(session, roster, wanted, merged, laps, MergeMode::Historical)
}

/// Load the live session's recent window. Data is fetched for every driver
/// on track; `driver_numbers` only narrows the default display selection.
pub async fn load_live(
    source: &dyn RaceDataSource,
    driver_numbers: Option<&[u32]>,
) -> Result<SessionBundle, LoadError> {
    let session = source
        .latest_session()
        .await?
        .ok_or(LoadError::NoLiveSession)?;

    let roster = load_roster(source, session.session_key).await?;
    let wanted = select_drivers(&roster, driver_numbers)?;

    let since = Utc::now() - TimeDelta::seconds(LIVE_LOOKBACK_SECS);
    let locations = source.location_updates(since).await.unwrap_or_else(|e| {
        warn!("live location fetch failed: {e:#}");
        Vec::new()
    });
    let telemetry = source.car_updates(since).await.unwrap_or_else(|e| {
        warn!("live car telemetry fetch failed: {e:#}");
        Vec::new()
    });

    let laps = load_laps(source, session.session_key).await;
    let merged = merge_streams(locations, telemetry, MergeMode::Live);
    assemble(session, roster, wanted, merged, laps, MergeMode::Live)
}

async fn load_roster(
    source: &dyn RaceDataSource,
    session_key: u64,
) -> Result<DriverRoster, LoadError> {
    let drivers = source.drivers(session_key).await.unwrap_or_else(|e| {
        warn!("driver listing failed: {e:#}");
        Vec::new()
    });
    let roster = DriverRoster::from_drivers(drivers);
    if roster.is_empty() {
        return Err(LoadError::NoDrivers);
    }
    Ok(roster)
}

fn select_drivers(
    roster: &DriverRoster,
    requested: Option<&[u32]>,
) -> Result<Vec<u32>, LoadError> {
    let wanted = match requested {
        Some(numbers) => roster
            .numbers()
            .into_iter()
            .filter(|n| numbers.contains(n))
            .collect(),
        None => roster.numbers(),
    };
    if wanted.is_empty() {
        return Err(LoadError::NoDrivers);
    }
    Ok(wanted)
}

async fn load_laps(source: &dyn RaceDataSource, session_key: u64) -> Vec<Lap> {
    source.laps(session_key).await.unwrap_or_else(|e| {
        warn!("lap fetch failed: {e:#}");
        Vec::new()
    })
}

fn assemble(
    session: RaceSession,
    roster: DriverRoster,
    driver_numbers: Vec<u32>,
    merged: Vec<MergedSample>,
    laps: Vec<Lap>,
    mode: MergeMode,
) -> Result<SessionBundle, LoadError> {
    let extents = TrackExtents::from_points(merged.iter().map(|m| (m.x, m.y)))
        .ok_or(LoadError::NoLocations)?;
    let frames = FrameTable::build(merged.clone());
    info!(
        "loaded session {} ({}): {} frames, {} drivers, {} laps",
        session.session_key,
        session.session_name,
        frames.len(),
        driver_numbers.len(),
        laps.len(),
    );
    Ok(SessionBundle {
        session,
        roster,
        driver_numbers,
        merged,
        frames,
        laps,
        extents,
        mode,
    })
}
