//! Lap and sector lookup
//!
//! "Current lap" for a driver at a timestamp, comparison against the
//! previous lap's sectors, and extraction of the telemetry series for a
//! lap's time window. All of it is a linear scan over the handful of laps a
//! session has; nothing here caches across frames.

use crate::model::{Lap, MergedSample};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Chart window length for a lap whose recorded duration is unusable.
pub const FALLBACK_LAP_SECS: f64 = 300.0;

/// The lap a driver is on at `at`: the lap with the greatest start
/// timestamp that is not after `at`. Laps without a start timestamp are
/// never selected.
pub fn current_lap<'a>(laps: &'a [Lap], driver: u32, at: DateTime<Utc>) -> Option<&'a Lap> {
    laps.iter()
        .filter(|l| l.driver_number == driver)
        .filter_map(|l| l.date_start.map(|start| (start, l)))
        .filter(|(start, _)| *start <= at)
        .max_by_key(|(start, _)| *start)
        .map(|(_, l)| l)
}

/// The lap numbered exactly one less than `lap_number`, for sector
/// comparison. `None` for the first lap.
pub fn previous_lap<'a>(laps: &'a [Lap], driver: u32, lap_number: u32) -> Option<&'a Lap> {
    let wanted = lap_number.checked_sub(1)?;
    laps.iter()
        .find(|l| l.driver_number == driver && l.lap_number == wanted)
}

/// Outcome of comparing one sector of the current lap to the same sector of
/// the previous lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorDelta {
    /// Current sector has no recorded time.
    NoTime,
    /// The previous lap has no time for this sector to compare against.
    NoBaseline,
    Improved,
    NotFaster,
}

pub fn compare_sector(current: Option<f64>, previous: Option<f64>) -> SectorDelta {
    match (current, previous) {
        (None, _) => SectorDelta::NoTime,
        (Some(_), None) => SectorDelta::NoBaseline,
        (Some(c), Some(p)) if c < p => SectorDelta::Improved,
        _ => SectorDelta::NotFaster,
    }
}

/// The lap's chart window `[start, start + duration)`. Falls back to
/// [`FALLBACK_LAP_SECS`] when the recorded duration is not positive.
/// `None` when the lap has no start timestamp.
pub fn lap_window(lap: &Lap) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = lap.date_start?;
    let secs = if lap.lap_duration > 0.0 {
        lap.lap_duration
    } else {
        FALLBACK_LAP_SECS
    };
    let end = start + TimeDelta::milliseconds((secs * 1_000.0) as i64);
    Some((start, end))
}

/// Parallel time series for one driver over one lap window, for the chart
/// endpoints. `t` is seconds since the lap start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LapSeries {
    pub t: Vec<f64>,
    pub speed: Vec<f64>,
    pub throttle: Vec<f64>,
    pub brake: Vec<f64>,
    pub rpm: Vec<f64>,
    pub gear: Vec<u8>,
}

/// Extract the chart series from a merged stream. Rows without attached
/// telemetry are skipped; they would only punch holes in the charts.
pub fn lap_series(
    samples: &[MergedSample],
    driver: u32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> LapSeries {
    let mut series = LapSeries::default();
    for sample in samples {
        if sample.driver_number != driver || sample.date < start || sample.date >= end {
            continue;
        }
        let Some(car) = sample.car else { continue };
        series
            .t
            .push((sample.date - start).num_milliseconds() as f64 / 1_000.0);
        series.speed.push(car.speed.0);
        series.throttle.push(car.throttle.0);
        series.brake.push(car.brake.0);
        series.rpm.push(car.rpm.0);
        series.gear.push(car.gear.0);
    }
    series
}
