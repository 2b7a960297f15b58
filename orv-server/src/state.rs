//! Application state management

use crate::playback::{PlaybackEvent, PlaybackState};
use crate::render::TrackMap;
use orv_core::source::RaceDataSource;
use orv_openf1::SessionBundle;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How long meeting/session listings stay served from memory
const LISTING_TTL: Duration = Duration::from_secs(60);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Upstream data source (the OpenF1 client or the demo source)
    pub source: Arc<dyn RaceDataSource>,

    /// The currently loaded session (None before the first load)
    pub bundle: Arc<RwLock<Option<SessionBundle>>>,

    /// Cached track background + projection for the loaded session.
    /// None when nothing is loaded or the session's geometry is degenerate.
    pub track: Arc<RwLock<Option<TrackMap>>>,

    /// Playback cursor shared by the handlers and the ticker task
    pub playback: Arc<RwLock<PlaybackState>>,

    /// Broadcast channel for playback and live events
    /// Multiple consumers can subscribe to receive events
    pub events_tx: broadcast::Sender<PlaybackEvent>,

    /// Cancellation token for the live poller task (None when not live)
    pub live_cancel: Arc<RwLock<Option<CancellationToken>>>,

    /// Short-lived cache for meeting/session listings
    listings: Arc<RwLock<HashMap<ListingKey, CachedListing>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingKey {
    Meetings { year: i32 },
    Sessions { meeting_key: u64 },
}

struct CachedListing {
    fetched_at: Instant,
    value: serde_json::Value,
}

impl AppState {
    pub fn new(source: Arc<dyn RaceDataSource>) -> Self {
        // Create broadcast channel with capacity for 100 events
        let (events_tx, _) = broadcast::channel(100);

        Self {
            source,
            bundle: Arc::new(RwLock::new(None)),
            track: Arc::new(RwLock::new(None)),
            playback: Arc::new(RwLock::new(PlaybackState::new(0))),
            events_tx,
            live_cancel: Arc::new(RwLock::new(None)),
            listings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to playback and live events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events_tx.subscribe()
    }

    /// Swap in a freshly loaded session: stop any live poller, rebuild the
    /// track background, and rewind playback.
    pub async fn install_bundle(&self, bundle: SessionBundle) {
        self.cancel_live_poller().await;

        let track = match TrackMap::new(bundle.extents, &bundle.reference_path()) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!("track rendering disabled for this session: {}", e);
                None
            }
        };
        let total = bundle.frames.len();

        *self.track.write().await = track;
        *self.bundle.write().await = Some(bundle);
        self.playback.write().await.reset(total);
    }

    pub async fn cancel_live_poller(&self) {
        let mut cancel = self.live_cancel.write().await;
        if let Some(token) = cancel.take() {
            token.cancel();
        }
    }

    pub async fn cached_listing(&self, key: ListingKey) -> Option<serde_json::Value> {
        let listings = self.listings.read().await;
        listings
            .get(&key)
            .filter(|cached| cached.fetched_at.elapsed() < LISTING_TTL)
            .map(|cached| cached.value.clone())
    }

    pub async fn store_listing(&self, key: ListingKey, value: serde_json::Value) {
        let mut listings = self.listings.write().await;
        listings.insert(
            key,
            CachedListing {
                fetched_at: Instant::now(),
                value,
            },
        );
    }
}
