//! OpenF1 API client and demo data source for OpenRaceView

pub mod client;
pub mod demo;
pub mod fetch;

pub use client::{ApiError, OpenF1Client};
pub use demo::DemoSource;
pub use fetch::{load_historical, load_live, LoadError, SessionBundle};
