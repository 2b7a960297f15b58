//! OpenRaceView Core Library
//!
//! This crate provides the session data model, the time-alignment and
//! frame-table pipeline, lap/sector lookup, track geometry, and the data
//! source trait shared by the OpenF1 client and the demo source.

pub mod align;
pub mod frames;
pub mod geom;
pub mod laps;
pub mod model;
pub mod source;
pub mod units;

pub use frames::FrameTable;
pub use geom::{Projection, TrackExtents};
pub use model::{Driver, DriverRoster, Lap, MergedSample, RaceSession};
pub use source::RaceDataSource;
