//! Demo source that generates a synthetic session for testing
//!
//! Simulates a short race on a closed circuit: three drivers lapping an
//! oval-with-chicanes loop, with speed, throttle, brake, gear and RPM
//! derived from a segment profile. Fully deterministic, anchored at a fixed
//! date, so the server and its tests can run without network access.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use orv_core::model::{
    CarMetrics, CarTelemetrySample, Driver, Lap, LocationSample, Meeting, RaceSession,
};
use orv_core::source::RaceDataSource;
use orv_core::units::{Gear, KilometersPerHour, Percentage, Rpm};

pub const DEMO_MEETING_KEY: u64 = 1299;
pub const DEMO_SESSION_KEY: u64 = 9901;
const DEMO_YEAR: i32 = 2024;

/// 2024-05-26T13:00:00Z.
const DEMO_EPOCH_SECS: i64 = 1_716_728_400;

const SESSION_SECS: i64 = 450;
const LOCATION_PERIOD_MS: i64 = 500;
const TELEMETRY_PERIOD_MS: i64 = 700;
const LAPS_PER_DRIVER: u32 = 5;

// =============================================================================
// Pace profile — a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy)]
enum SegmentKind {
    Straight, // Full throttle, top speed
    Braking,  // Heavy braking into a corner
    Corner,   // Constant-ish speed cornering
    Accel,    // Accelerating out of a corner
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f64,    // seconds to traverse at representative pace
    target_kph: f64,  // speed at end of segment
}

/// A simple circuit: ~84s lap, mix of corners and straights
fn demo_track() -> Vec<TrackSegment> {
    vec![
        // Start/finish straight
        TrackSegment { kind: SegmentKind::Straight, duration: 8.0, target_kph: 305.0 },
        // T1: heavy braking into slow right-hander
        TrackSegment { kind: SegmentKind::Braking,  duration: 3.0, target_kph: 110.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.0, target_kph: 95.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.5, target_kph: 220.0 },
        // Short straight
        TrackSegment { kind: SegmentKind::Straight, duration: 4.0, target_kph: 250.0 },
        // T2: medium braking into fast left-hander
        TrackSegment { kind: SegmentKind::Braking,  duration: 2.0, target_kph: 180.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 3.5, target_kph: 170.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0, target_kph: 235.0 },
        // Back straight
        TrackSegment { kind: SegmentKind::Straight, duration: 10.0, target_kph: 320.0 },
        // T3: chicane
        TrackSegment { kind: SegmentKind::Braking,  duration: 2.5, target_kph: 140.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 2.0, target_kph: 125.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 2.0, target_kph: 120.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0, target_kph: 200.0 },
        // Medium straight
        TrackSegment { kind: SegmentKind::Straight, duration: 6.0, target_kph: 270.0 },
        // T4: long sweeping right
        TrackSegment { kind: SegmentKind::Braking,  duration: 1.5, target_kph: 205.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 5.0, target_kph: 200.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 3.0, target_kph: 240.0 },
        // T5: tight hairpin
        TrackSegment { kind: SegmentKind::Braking,  duration: 3.5, target_kph: 85.0 },
        TrackSegment { kind: SegmentKind::Corner,   duration: 4.5, target_kph: 80.0 },
        TrackSegment { kind: SegmentKind::Accel,    duration: 4.0, target_kph: 220.0 },
        // Run to start/finish
        TrackSegment { kind: SegmentKind::Straight, duration: 6.0, target_kph: 290.0 },
    ]
}

struct PaceState {
    speed_kph: f64,
    throttle: f64, // percent
    brake: f64,    // percent
}

fn pace_at(track: &[TrackSegment], lap_time: f64) -> PaceState {
    let lap_duration: f64 = track.iter().map(|s| s.duration).sum();
    let t = lap_time.rem_euclid(lap_duration);

    let mut elapsed = 0.0_f64;
    let mut seg_idx = 0;
    for (i, seg) in track.iter().enumerate() {
        if elapsed + seg.duration > t {
            seg_idx = i;
            break;
        }
        elapsed += seg.duration;
        if i == track.len() - 1 {
            seg_idx = i;
        }
    }

    let seg = track[seg_idx];
    let seg_t = ((t - elapsed) / seg.duration).clamp(0.0, 1.0);

    let prev_target = if seg_idx > 0 {
        track[seg_idx - 1].target_kph
    } else {
        track[track.len() - 1].target_kph
    };

    let smooth_t = smoothstep(seg_t);
    let speed_kph = lerp(prev_target, seg.target_kph, smooth_t);

    let (throttle, brake) = match seg.kind {
        SegmentKind::Straight => (95.0 + 5.0 * (1.0 - seg_t), 0.0),
        SegmentKind::Braking => {
            let brake_force = 100.0 - smooth_t * 30.0; // starts heavy, eases off
            (0.0, brake_force.clamp(0.0, 100.0))
        }
        SegmentKind::Corner => (20.0 + 30.0 * seg_t, 0.0),
        SegmentKind::Accel => (50.0 + 50.0 * smooth_t, 0.0),
    };

    PaceState {
        speed_kph,
        throttle: throttle.clamp(0.0, 100.0),
        brake,
    }
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn speed_to_gear(kph: f64) -> u8 {
    match kph {
        x if x < 50.0 => 1,
        x if x < 95.0 => 2,
        x if x < 140.0 => 3,
        x if x < 185.0 => 4,
        x if x < 230.0 => 5,
        x if x < 265.0 => 6,
        x if x < 295.0 => 7,
        _ => 8,
    }
}

fn speed_to_rpm(kph: f64, gear: u8) -> f64 {
    // lower gear = higher RPM for the same speed
    let base_ratio = match gear {
        1 => 95.0,
        2 => 72.0,
        3 => 58.0,
        4 => 49.0,
        5 => 43.0,
        6 => 40.0,
        7 => 38.0,
        _ => 36.0,
    };
    (kph * base_ratio + 3_500.0).clamp(4_000.0, 12_500.0)
}

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// Circuit geometry — a closed loop with pinched sides
// =============================================================================

fn track_position(lap_frac: f64) -> (f64, f64) {
    let theta = lap_frac * std::f64::consts::TAU;
    let x = 4_000.0 * theta.cos();
    let y = 2_600.0 * theta.sin() + 420.0 * (3.0 * theta).sin();
    (x, y)
}

fn base_lap_secs(driver: u32) -> f64 {
    match driver {
        7 => 83.7,
        22 => 84.6,
        _ => 85.4,
    }
}

/// Seconds behind the leader at the start.
fn grid_delay(driver: u32) -> f64 {
    match driver {
        7 => 0.0,
        22 => 1.5,
        _ => 3.0,
    }
}

// =============================================================================
// DemoSource
// =============================================================================

pub struct DemoSource {
    start: DateTime<Utc>,
    track: Vec<TrackSegment>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self {
            start: DateTime::UNIX_EPOCH + TimeDelta::seconds(DEMO_EPOCH_SECS),
            track: demo_track(),
        }
    }

    fn session_end(&self) -> DateTime<Utc> {
        self.start + TimeDelta::seconds(SESSION_SECS)
    }

    fn meeting(&self) -> Meeting {
        Meeting {
            meeting_key: DEMO_MEETING_KEY,
            meeting_name: "Demo Grand Prix".to_string(),
            circuit_short_name: "Demo Circuit".to_string(),
            country_name: "Demoland".to_string(),
            year: DEMO_YEAR,
            date_start: self.start,
        }
    }

    fn race_session(&self) -> RaceSession {
        RaceSession {
            session_key: DEMO_SESSION_KEY,
            meeting_key: DEMO_MEETING_KEY,
            session_name: "Race".to_string(),
            session_type: "Race".to_string(),
            circuit_short_name: "Demo Circuit".to_string(),
            country_name: "Demoland".to_string(),
            year: DEMO_YEAR,
            date_start: self.start,
            date_end: self.session_end(),
        }
    }

    fn roster(&self) -> Vec<Driver> {
        vec![
            Driver {
                driver_number: 7,
                name_acronym: "RIV".to_string(),
                full_name: "Alex Rivera".to_string(),
                team_name: "Apex Racing".to_string(),
                team_color: "#3671C6".to_string(),
            },
            Driver {
                driver_number: 22,
                name_acronym: "CHE".to_string(),
                full_name: "Sam Chen".to_string(),
                team_name: "Velocity Motorsport".to_string(),
                team_color: "#E80020".to_string(),
            },
            Driver {
                driver_number: 42,
                name_acronym: "DEM".to_string(),
                full_name: "Demo Player".to_string(),
                team_name: "Team Demo".to_string(),
                team_color: "#27F4D2".to_string(),
            },
        ]
    }

    fn is_demo_driver(driver: u32) -> bool {
        matches!(driver, 7 | 22 | 42)
    }

    fn driver_locations(&self, driver: u32) -> Vec<LocationSample> {
        let lap_secs = base_lap_secs(driver);
        let delay = grid_delay(driver);
        let mut samples = Vec::new();
        let mut offset_ms = 0;
        while offset_ms < SESSION_SECS * 1_000 {
            let t = offset_ms as f64 / 1_000.0;
            let lap_frac = ((t - delay).rem_euclid(lap_secs)) / lap_secs;
            let (x, y) = track_position(lap_frac);
            samples.push(LocationSample {
                driver_number: driver,
                date: self.start + TimeDelta::milliseconds(offset_ms),
                x,
                y,
            });
            offset_ms += LOCATION_PERIOD_MS;
        }
        samples
    }

    fn driver_telemetry(&self, driver: u32) -> Vec<CarTelemetrySample> {
        let lap_secs = base_lap_secs(driver);
        let mut samples = Vec::new();
        let mut offset_ms = 0;
        let mut step = 0_u64;
        while offset_ms < SESSION_SECS * 1_000 {
            let t = offset_ms as f64 / 1_000.0;
            let lap_time = (t - grid_delay(driver)).rem_euclid(lap_secs);
            let pace = pace_at(&self.track, lap_time);
            let seed = driver as f64 * 1_000.0 + step as f64;
            let speed = (pace.speed_kph + jitter(seed, 1.2)).max(0.0);
            let gear = speed_to_gear(speed);
            samples.push(CarTelemetrySample {
                driver_number: driver,
                date: self.start + TimeDelta::milliseconds(offset_ms),
                metrics: CarMetrics {
                    speed: KilometersPerHour(speed),
                    throttle: Percentage::new(pace.throttle + jitter(seed * 1.2, 2.0)),
                    brake: Percentage::new(pace.brake + jitter(seed * 1.3, 2.0)),
                    rpm: Rpm(speed_to_rpm(speed, gear) + jitter(seed * 1.1, 120.0)),
                    gear: Gear(gear),
                },
            });
            offset_ms += TELEMETRY_PERIOD_MS;
            step += 1;
        }
        samples
    }

    fn driver_laps(&self, driver: u32) -> Vec<Lap> {
        let mut laps = Vec::new();
        let mut start = self.start + TimeDelta::milliseconds((grid_delay(driver) * 1_000.0) as i64);
        for number in 1..=LAPS_PER_DRIVER {
            let seed = driver as f64 * 77.0 + number as f64;
            let duration = base_lap_secs(driver) + jitter(seed, 0.9);
            let s1 = duration * 0.31 + jitter(seed * 2.1, 0.4);
            let s2 = duration * 0.36 + jitter(seed * 2.2, 0.4);
            let s3 = duration - s1 - s2;
            laps.push(Lap {
                driver_number: driver,
                lap_number: number,
                date_start: Some(start),
                lap_duration: duration,
                sector_durations: [Some(s1), Some(s2), Some(s3)],
            });
            start += TimeDelta::milliseconds((duration * 1_000.0) as i64);
        }
        laps
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaceDataSource for DemoSource {
    fn name(&self) -> &str {
        "Demo"
    }

    async fn meetings(&self, year: i32) -> Result<Vec<Meeting>> {
        if year == DEMO_YEAR {
            Ok(vec![self.meeting()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn sessions(&self, meeting_key: u64) -> Result<Vec<RaceSession>> {
        if meeting_key == DEMO_MEETING_KEY {
            Ok(vec![self.race_session()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn session(&self, session_key: u64) -> Result<Option<RaceSession>> {
        Ok((session_key == DEMO_SESSION_KEY).then(|| self.race_session()))
    }

    async fn latest_session(&self) -> Result<Option<RaceSession>> {
        // the demo session is always finished
        Ok(None)
    }

    async fn drivers(&self, session_key: u64) -> Result<Vec<Driver>> {
        if session_key == DEMO_SESSION_KEY {
            Ok(self.roster())
        } else {
            Ok(Vec::new())
        }
    }

    async fn locations(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>> {
        if session_key != DEMO_SESSION_KEY || !Self::is_demo_driver(driver_number) {
            return Ok(Vec::new());
        }
        Ok(self
            .driver_locations(driver_number)
            .into_iter()
            .filter(|s| s.date >= start && s.date < end)
            .collect())
    }

    async fn car_telemetry(
        &self,
        session_key: u64,
        driver_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CarTelemetrySample>> {
        if session_key != DEMO_SESSION_KEY || !Self::is_demo_driver(driver_number) {
            return Ok(Vec::new());
        }
        Ok(self
            .driver_telemetry(driver_number)
            .into_iter()
            .filter(|s| s.date >= start && s.date < end)
            .collect())
    }

    async fn laps(&self, session_key: u64) -> Result<Vec<Lap>> {
        if session_key != DEMO_SESSION_KEY {
            return Ok(Vec::new());
        }
        let mut laps = Vec::new();
        for driver in [7, 22, 42] {
            laps.extend(self.driver_laps(driver));
        }
        Ok(laps)
    }

    async fn location_updates(&self, _since: DateTime<Utc>) -> Result<Vec<LocationSample>> {
        Ok(Vec::new())
    }

    async fn car_updates(&self, _since: DateTime<Utc>) -> Result<Vec<CarTelemetrySample>> {
        Ok(Vec::new())
    }
}
