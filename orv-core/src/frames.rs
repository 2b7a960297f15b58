//! Frame table
//!
//! Turns the merged sample stream into a dense, frame-indexed table: one
//! frame per distinct timestamp, one cell per driver observed so far. Each
//! cell is forward-filled per field (the position is the driver's newest
//! sample at or before the frame, the car state is the newest *attached*
//! telemetry at or before it), so the playback loop can look any
//! (frame, driver) pair up without searching.
//!
//! The builder keeps its tail state, so live mode can append newly merged
//! samples to an existing table without rebuilding it.

use crate::model::MergedSample;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Dense (timestamp × driver) table. Frame index i corresponds to the i-th
/// distinct timestamp observed in the stream.
#[derive(Debug, Clone, Default)]
pub struct FrameTable {
    timestamps: Vec<DateTime<Utc>>,
    frames: Vec<BTreeMap<u32, MergedSample>>,
    last_known: BTreeMap<u32, MergedSample>,
}

impl FrameTable {
    /// Build the table from a full merged stream.
    pub fn build(samples: Vec<MergedSample>) -> Self {
        let mut table = Self::default();
        table.extend(samples);
        table
    }

    /// Append more merged samples, preserving the forward-fill invariant.
    ///
    /// Samples older than the current last frame are dropped (live polls
    /// fetch strictly-newer data, so anything older is a stray). Samples at
    /// exactly the last frame's timestamp update that frame in place.
    pub fn extend(&mut self, mut samples: Vec<MergedSample>) {
        samples.sort_by_key(|s| s.date);
        for sample in samples {
            let mut filled = sample;
            if filled.car.is_none() {
                filled.car = self
                    .last_known
                    .get(&filled.driver_number)
                    .and_then(|prev| prev.car);
            }
            match self.timestamps.last() {
                Some(&last) if filled.date < last => continue,
                Some(&last) if filled.date == last => {
                    self.last_known.insert(filled.driver_number, filled);
                    if let Some(frame) = self.frames.last_mut() {
                        frame.insert(filled.driver_number, filled);
                    }
                }
                _ => {
                    self.last_known.insert(filled.driver_number, filled);
                    self.timestamps.push(filled.date);
                    self.frames.push(self.last_known.clone());
                }
            }
        }
    }

    /// Number of frames (distinct timestamps).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn timestamp(&self, frame: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(frame).copied()
    }

    /// All cells of one frame, keyed by driver number.
    pub fn frame(&self, index: usize) -> Option<&BTreeMap<u32, MergedSample>> {
        self.frames.get(index)
    }

    /// One cell. `None` when the frame is out of range or the driver has no
    /// observation at or before it.
    pub fn get(&self, frame: usize, driver: u32) -> Option<&MergedSample> {
        self.frames.get(frame)?.get(&driver)
    }

    /// Every driver observed anywhere in the stream so far.
    pub fn drivers(&self) -> Vec<u32> {
        self.last_known.keys().copied().collect()
    }
}
