//! OpenRaceView Server Library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod live;
pub mod playback;
pub mod render;
pub mod state;
pub mod web_ui;
