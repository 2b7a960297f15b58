//! Nearest-in-time stream alignment
//!
//! Location and car telemetry arrive as two independently sampled streams
//! per driver. This module attaches to each location sample the telemetry
//! sample closest in time within the same driver's stream, provided the gap
//! stays within a mode-dependent tolerance. Rows with no telemetry close
//! enough keep their position data and carry no car state.

use crate::model::{CarTelemetrySample, LocationSample, MergedSample};
use chrono::TimeDelta;
use std::collections::BTreeMap;

/// Widest gap bridged when replaying a finished session.
pub const HISTORICAL_TOLERANCE_SECS: i64 = 1;

/// Widest gap bridged in live mode, where the feeds drift further apart.
pub const LIVE_TOLERANCE_SECS: i64 = 2;

/// Which tolerance applies. The two values are carried-over policy, not
/// derived from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Historical,
    Live,
}

impl MergeMode {
    pub fn tolerance(self) -> TimeDelta {
        match self {
            MergeMode::Historical => TimeDelta::seconds(HISTORICAL_TOLERANCE_SECS),
            MergeMode::Live => TimeDelta::seconds(LIVE_TOLERANCE_SECS),
        }
    }
}

/// Merge the two streams. The output is sorted by timestamp; rows at the
/// same timestamp keep their relative input order. Telemetry attaches to a
/// location sample iff the nearest same-driver telemetry sample lies within
/// the tolerance (ties between an earlier and a later candidate go to the
/// earlier one). An empty location stream yields an empty result; whether
/// that is an error is the caller's call.
pub fn merge_streams(
    mut locations: Vec<LocationSample>,
    telemetry: Vec<CarTelemetrySample>,
    mode: MergeMode,
) -> Vec<MergedSample> {
    let tolerance = mode.tolerance();

    let mut by_driver: BTreeMap<u32, Vec<CarTelemetrySample>> = BTreeMap::new();
    for sample in telemetry {
        by_driver.entry(sample.driver_number).or_default().push(sample);
    }
    for partition in by_driver.values_mut() {
        partition.sort_by_key(|s| s.date);
    }

    locations.sort_by_key(|l| l.date);
    locations
        .into_iter()
        .map(|loc| {
            let car = by_driver
                .get(&loc.driver_number)
                .and_then(|partition| nearest_within(partition, loc.date, tolerance))
                .map(|s| s.metrics);
            MergedSample {
                driver_number: loc.driver_number,
                date: loc.date,
                x: loc.x,
                y: loc.y,
                car,
            }
        })
        .collect()
}

/// Nearest sample to `at` in a date-sorted partition, if within `tolerance`.
fn nearest_within(
    partition: &[CarTelemetrySample],
    at: chrono::DateTime<chrono::Utc>,
    tolerance: TimeDelta,
) -> Option<&CarTelemetrySample> {
    if partition.is_empty() {
        return None;
    }
    let idx = partition.partition_point(|s| s.date < at);
    let after = partition.get(idx);
    let before = idx.checked_sub(1).and_then(|i| partition.get(i));
    let best = match (before, after) {
        (Some(b), Some(a)) => {
            // tie goes to the earlier sample
            if (at - b.date) <= (a.date - at) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    let gap = if best.date >= at { best.date - at } else { at - best.date };
    (gap <= tolerance).then_some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CarMetrics;
    use crate::units::{Gear, KilometersPerHour, Percentage, Rpm};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 26, 13, 0, 0).unwrap() + TimeDelta::milliseconds(ms)
    }

    fn loc(driver: u32, ms: i64) -> LocationSample {
        LocationSample {
            driver_number: driver,
            date: at(ms),
            x: ms as f64,
            y: 0.0,
        }
    }

    fn car(driver: u32, ms: i64, speed: f64) -> CarTelemetrySample {
        CarTelemetrySample {
            driver_number: driver,
            date: at(ms),
            metrics: CarMetrics {
                speed: KilometersPerHour(speed),
                throttle: Percentage::new(80.0),
                brake: Percentage::new(0.0),
                rpm: Rpm(10_500.0),
                gear: Gear(6),
            },
        }
    }

    fn speed(sample: &MergedSample) -> Option<f64> {
        sample.car.map(|c| c.speed.0)
    }

    #[test]
    fn attaches_nearest_sample_within_tolerance() {
        let merged = merge_streams(
            vec![loc(1, 1_000)],
            vec![car(1, 200, 100.0), car(1, 1_400, 200.0)],
            MergeMode::Historical,
        );
        assert_eq!(speed(&merged[0]), Some(200.0));
    }

    #[test]
    fn leaves_telemetry_absent_beyond_tolerance() {
        let merged = merge_streams(
            vec![loc(1, 0), loc(1, 5_000)],
            vec![car(1, 2_500, 150.0)],
            MergeMode::Historical,
        );
        assert_eq!(speed(&merged[0]), None);
        assert_eq!(speed(&merged[1]), None);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let merged = merge_streams(
            vec![loc(1, 1_000)],
            vec![car(1, 2_000, 140.0)],
            MergeMode::Historical,
        );
        assert_eq!(speed(&merged[0]), Some(140.0));
    }

    #[test]
    fn live_mode_bridges_wider_gaps() {
        let locations = vec![loc(1, 0)];
        let telemetry = vec![car(1, 1_800, 120.0)];
        let historical = merge_streams(locations.clone(), telemetry.clone(), MergeMode::Historical);
        assert_eq!(speed(&historical[0]), None);
        let live = merge_streams(locations, telemetry, MergeMode::Live);
        assert_eq!(speed(&live[0]), Some(120.0));
    }

    #[test]
    fn tie_between_neighbours_prefers_the_earlier() {
        let merged = merge_streams(
            vec![loc(1, 1_000)],
            vec![car(1, 500, 111.0), car(1, 1_500, 222.0)],
            MergeMode::Historical,
        );
        assert_eq!(speed(&merged[0]), Some(111.0));
    }

    #[test]
    fn pairs_only_within_the_same_driver() {
        let merged = merge_streams(
            vec![loc(1, 1_000), loc(2, 1_000)],
            vec![car(2, 1_000, 250.0)],
            MergeMode::Historical,
        );
        let d1 = merged.iter().find(|m| m.driver_number == 1).unwrap();
        let d2 = merged.iter().find(|m| m.driver_number == 2).unwrap();
        assert_eq!(speed(d1), None);
        assert_eq!(speed(d2), Some(250.0));
    }

    #[test]
    fn output_is_sorted_by_timestamp() {
        let merged = merge_streams(
            vec![loc(1, 3_000), loc(2, 1_000), loc(1, 2_000)],
            vec![],
            MergeMode::Historical,
        );
        let dates: Vec<_> = merged.iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![at(1_000), at(2_000), at(3_000)]);
    }

    #[test]
    fn empty_telemetry_passes_locations_through() {
        let merged = merge_streams(vec![loc(1, 0), loc(1, 1_000)], vec![], MergeMode::Historical);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.car.is_none()));
        assert_eq!(merged[1].x, 1_000.0);
    }

    #[test]
    fn empty_locations_yield_empty_output() {
        let merged = merge_streams(vec![], vec![car(1, 0, 90.0)], MergeMode::Historical);
        assert!(merged.is_empty());
    }
}
