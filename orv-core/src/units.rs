//! Type-safe wrappers for telemetry units
//!
//! Newtype wrappers around the raw numbers the upstream API ships, so speed,
//! revs, and pedal positions cannot be mixed up in the pipeline.
//!
//! All floating-point units serialize with 4 decimal places to reduce JSON
//! payload size. Deserialization clamps where the wire is known to wander
//! out of range (brake pressure above 100, stray gear indices).

use serde::{Deserialize, Serialize};

/// Round f64 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10000.0).round() / 10000.0)
}

/// Kilometers per hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KilometersPerHour(#[serde(serialize_with = "round4")] pub f64);

/// Engine revolutions per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rpm(#[serde(serialize_with = "round4")] pub f64);

/// Seconds (lap and sector durations)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4")] pub f64);

/// Percentage (0.0 to 100.0), used for throttle and brake position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentage(#[serde(serialize_with = "round4")] pub f64);

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 100.0]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 100.0))
    }

    /// Fraction in [0.0, 1.0]
    pub fn as_fraction(&self) -> f64 {
        self.0 / 100.0
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::new(f64::deserialize(deserializer)?))
    }
}

/// Gearbox position: 0 is neutral, 1-8 are forward gears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gear(pub u8);

impl Gear {
    pub const NEUTRAL: Gear = Gear(0);
    pub const MAX: u8 = 8;

    /// Create a gear, clamping out-of-range wire values into 0..=8
    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn is_neutral(&self) -> bool {
        self.0 == 0
    }
}

impl<'de> Deserialize<'de> for Gear {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::new(i64::deserialize(deserializer)?))
    }
}
