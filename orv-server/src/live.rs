//! Live session polling
//!
//! While a live session is loaded, a background task periodically fetches
//! samples newer than the last observed timestamp, merges them with the
//! live tolerance, appends them to the frame table through its resume path,
//! and broadcasts the growth to connected clients.

use crate::playback::PlaybackEvent;
use crate::state::AppState;
use anyhow::Result;
use orv_core::align::{merge_streams, MergeMode};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Poll until cancelled. Poll failures are logged and skipped; the next
/// scheduled poll is the only retry.
pub async fn run(state: AppState, cancel: CancellationToken) {
    info!("Live poller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(POLL_INTERVAL) => {}
        }

        if let Err(e) = poll_cycle(&state).await {
            warn!("live poll failed: {:#}", e);
        }
    }

    info!("Live poller stopped");
}

async fn poll_cycle(state: &AppState) -> Result<()> {
    let (since, drivers) = {
        let bundle = state.bundle.read().await;
        let Some(bundle) = bundle.as_ref() else {
            return Ok(());
        };
        if !bundle.is_live() {
            return Ok(());
        }
        match bundle.last_timestamp() {
            Some(since) => (since, bundle.driver_numbers.clone()),
            None => return Ok(()),
        }
    };

    let locations: Vec<_> = state
        .source
        .location_updates(since)
        .await?
        .into_iter()
        .filter(|s| drivers.contains(&s.driver_number))
        .collect();
    if locations.is_empty() {
        return Ok(());
    }
    let telemetry: Vec<_> = state
        .source
        .car_updates(since)
        .await?
        .into_iter()
        .filter(|s| drivers.contains(&s.driver_number))
        .collect();

    let merged = merge_streams(locations, telemetry, MergeMode::Live);

    let (total, last_timestamp) = {
        let mut bundle = state.bundle.write().await;
        let Some(bundle) = bundle.as_mut() else {
            return Ok(());
        };
        bundle.merged.extend(merged.iter().copied());
        bundle.frames.extend(merged);
        (bundle.frames.len(), bundle.last_timestamp())
    };

    state.playback.write().await.grow_total(total);
    let _ = state.events_tx.send(PlaybackEvent::Live {
        total_frames: total,
        last_timestamp,
    });
    debug!("live append: {} frames total", total);

    Ok(())
}
