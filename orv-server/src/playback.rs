//! Playback state and the ticker task
//!
//! Holds the frame cursor and timing controls shared by the HTTP handlers
//! and the background ticker. The state itself is synchronous and pure so
//! playback semantics are unit-testable without a runtime.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Seconds between frames for each speed preset, slowest first.
pub const FRAME_DELAY_PRESETS: [f64; 5] = [0.5, 0.2, 0.1, 0.05, 0.01];
pub const DEFAULT_FRAME_DELAY: f64 = 0.05;
pub const MIN_FRAME_DELAY: f64 = 0.01;
pub const MAX_FRAME_DELAY: f64 = 0.5;

/// Playback cursor over the loaded frame table
pub struct PlaybackState {
    current_frame: usize,
    total_frames: usize,
    playing: bool,
    frame_delay: f64,
}

impl PlaybackState {
    pub fn new(total_frames: usize) -> Self {
        Self {
            current_frame: 0,
            total_frames,
            playing: false,
            frame_delay: DEFAULT_FRAME_DELAY,
        }
    }

    /// Rewind to frame 0, paused, with a new table size. The speed setting
    /// survives session switches.
    pub fn reset(&mut self, total_frames: usize) {
        self.current_frame = 0;
        self.total_frames = total_frames;
        self.playing = false;
    }

    /// Extend the table size as live data arrives. Never shrinks.
    pub fn grow_total(&mut self, total_frames: usize) {
        if total_frames > self.total_frames {
            self.total_frames = total_frames;
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn frame_delay(&self) -> f64 {
        self.frame_delay
    }

    pub fn play(&mut self) {
        if self.total_frames > 0 {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek(&mut self, frame: usize) {
        self.current_frame = frame.min(self.total_frames.saturating_sub(1));
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.frame_delay = delay.clamp(MIN_FRAME_DELAY, MAX_FRAME_DELAY);
    }

    /// Step to the next frame. Returns the new frame index, or None when
    /// paused; reaching the last frame pauses playback.
    pub fn advance(&mut self) -> Option<usize> {
        if !self.playing {
            return None;
        }

        if self.current_frame >= self.total_frames.saturating_sub(1) {
            self.playing = false;
            return None;
        }

        self.current_frame += 1;
        Some(self.current_frame)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            current_frame: self.current_frame,
            total_frames: self.total_frames,
            playing: self.playing,
            frame_delay: self.frame_delay,
        }
    }
}

/// Serializable playback state for the API
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub current_frame: usize,
    pub total_frames: usize,
    pub playing: bool,
    pub frame_delay: f64,
}

/// Events pushed to SSE subscribers by the ticker and the live poller
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Tick {
        frame: usize,
        timestamp: DateTime<Utc>,
        playing: bool,
    },
    Live {
        total_frames: usize,
        last_timestamp: Option<DateTime<Utc>>,
    },
}

/// Global ticker: advances the frame cursor on a timer and broadcasts each
/// step. Idles at the configured delay while paused.
pub async fn run_ticker(state: AppState) {
    info!("Playback ticker started");

    loop {
        let delay = {
            let playback = state.playback.read().await;
            playback.frame_delay()
        };
        sleep(Duration::from_secs_f64(delay)).await;

        let advanced = {
            let mut playback = state.playback.write().await;
            playback.advance()
        };
        let Some(frame) = advanced else { continue };

        // The session may have been swapped between the advance and here;
        // skip the broadcast if the frame no longer resolves.
        let timestamp = {
            let bundle = state.bundle.read().await;
            bundle.as_ref().and_then(|b| b.frames.timestamp(frame))
        };
        let Some(timestamp) = timestamp else { continue };

        let playing = {
            let playback = state.playback.read().await;
            playback.is_playing()
        };
        let _ = state.events_tx.send(PlaybackEvent::Tick {
            frame,
            timestamp,
            playing,
        });
    }
}
