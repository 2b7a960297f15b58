//! Session data model
//!
//! Typed views of the records the OpenF1 API serves: meetings, sessions,
//! the driver roster, the two raw sample streams (world position and car
//! telemetry), laps, and the merged sample the alignment pipeline produces.
//!
//! Everything here is session-scoped value data. When the viewer switches
//! session, the whole set is rebuilt from scratch; nothing is shared or
//! mutated across sessions.

use crate::units::{Gear, KilometersPerHour, Percentage, Rpm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A race weekend (Grand Prix) as listed by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_key: u64,
    pub meeting_name: String,
    pub circuit_short_name: String,
    pub country_name: String,
    pub year: i32,
    pub date_start: DateTime<Utc>,
}

/// One session of a race weekend (practice, qualifying, race, ...).
///
/// Selected once per viewing; immutable for the viewing duration. The
/// start/end timestamps bound the historical data fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSession {
    pub session_key: u64,
    pub meeting_key: u64,
    pub session_name: String,
    pub session_type: String,
    pub circuit_short_name: String,
    pub country_name: String,
    pub year: i32,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
}

/// Roster entry for one driver, keyed by car number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_number: u32,
    pub name_acronym: String,
    pub full_name: String,
    pub team_name: String,
    /// Hex color like `#3671C6`. Kept as received; use [`Driver::color_rgb`]
    /// for drawing.
    pub team_color: String,
}

impl Driver {
    pub fn color_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.team_color)
    }
}

/// White, the fallback for missing or unparseable team colors.
pub const FALLBACK_COLOR: [u8; 3] = [255, 255, 255];

/// Parse a `#RRGGBB` color string into an RGB triple, tolerating a missing
/// `#` prefix. Anything unparseable falls back to white.
pub fn parse_hex_color(hex: &str) -> [u8; 3] {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return FALLBACK_COLOR;
    }
    match (
        u8::from_str_radix(&hex[0..2], 16),
        u8::from_str_radix(&hex[2..4], 16),
        u8::from_str_radix(&hex[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => [r, g, b],
        _ => FALLBACK_COLOR,
    }
}

/// The session's driver roster, keyed and iterated by car number.
///
/// A driver can appear in the sample data without a roster entry (the
/// upstream listings are not always consistent); the accessors fall back to
/// a `#<number>` acronym and white rather than failing the lookup.
#[derive(Debug, Clone, Default)]
pub struct DriverRoster {
    drivers: BTreeMap<u32, Driver>,
}

impl DriverRoster {
    pub fn from_drivers(list: Vec<Driver>) -> Self {
        let mut drivers = BTreeMap::new();
        for d in list {
            drivers.insert(d.driver_number, d);
        }
        Self { drivers }
    }

    pub fn get(&self, number: u32) -> Option<&Driver> {
        self.drivers.get(&number)
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.drivers.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.values()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn display_acronym(&self, number: u32) -> String {
        match self.drivers.get(&number) {
            Some(d) => d.name_acronym.clone(),
            None => format!("#{}", number),
        }
    }

    pub fn color_rgb(&self, number: u32) -> [u8; 3] {
        self.drivers
            .get(&number)
            .map(|d| d.color_rgb())
            .unwrap_or(FALLBACK_COLOR)
    }
}

/// One world-position sample for one driver. Irregularly sampled; not
/// aligned across drivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
}

/// The car-state fields of a telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarMetrics {
    pub speed: KilometersPerHour,
    pub throttle: Percentage,
    pub brake: Percentage,
    pub rpm: Rpm,
    pub gear: Gear,
}

/// One car-telemetry sample. Sampled independently of [`LocationSample`]
/// and may be entirely absent for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarTelemetrySample {
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: CarMetrics,
}

/// A location sample with the nearest-in-time car telemetry attached, when
/// one exists within the merge tolerance. `car` stays `None` for rows whose
/// nearest telemetry sample was outside the tolerance (or when the session
/// has no telemetry at all).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedSample {
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub car: Option<CarMetrics>,
}

/// One timed lap. Laps the upstream reports without a total duration are
/// discarded at load and never reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    pub driver_number: u32,
    pub lap_number: u32,
    /// Absent for laps the upstream has not timestamped (common for the
    /// first out-lap); such laps are never selected as "current".
    pub date_start: Option<DateTime<Utc>>,
    pub lap_duration: f64,
    /// The three sector durations in order; individual sectors can be
    /// missing even on a timed lap.
    pub sector_durations: [Option<f64>; 3],
}

impl Lap {
    /// Sector duration by zero-based index; out-of-range indices read as
    /// missing.
    pub fn sector(&self, index: usize) -> Option<f64> {
        self.sector_durations.get(index).copied().flatten()
    }
}
