//! REST API and SSE routes

use crate::live;
use crate::playback::PlaybackStatus;
use crate::render::DisplayMode;
use crate::state::{AppState, ListingKey};
use crate::web_ui;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use orv_core::geom::TrackExtents;
use orv_core::laps::{self, LapSeries, SectorDelta};
use orv_core::model::{CarMetrics, Driver, Lap, RaceSession};
use orv_openf1::{load_historical, load_live, LoadError};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(web_ui::serve_ui))
        .route("/api/meetings", get(list_meetings))
        .route("/api/sessions", get(list_sessions))
        .route("/api/drivers", get(list_drivers))
        .route("/api/session", get(session_summary).post(load_session))
        .route("/api/frames/:index", get(frame_rows))
        .route("/api/frames/:index/image", get(frame_image))
        .route("/api/playback", get(playback_status).post(playback_control))
        .route("/api/playback/stream", get(event_stream))
        .route("/api/laps", get(list_laps))
        .route("/api/laps/sectors", get(sector_table))
        .route("/api/laps/telemetry", get(lap_telemetry))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === Listing Endpoints ===

#[derive(Deserialize)]
struct MeetingsQuery {
    year: i32,
}

async fn list_meetings(
    State(state): State<AppState>,
    Query(query): Query<MeetingsQuery>,
) -> Json<serde_json::Value> {
    let key = ListingKey::Meetings { year: query.year };
    if let Some(cached) = state.cached_listing(key).await {
        return Json(cached);
    }

    let meetings = match state.source.meetings(query.year).await {
        Ok(meetings) => meetings,
        Err(e) => {
            tracing::warn!("failed to fetch meetings for {}: {:#}", query.year, e);
            return Json(serde_json::json!([]));
        }
    };

    let value = serde_json::json!(meetings);
    state.store_listing(key, value.clone()).await;
    Json(value)
}

#[derive(Deserialize)]
struct SessionsQuery {
    meeting_key: u64,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Json<serde_json::Value> {
    let key = ListingKey::Sessions {
        meeting_key: query.meeting_key,
    };
    if let Some(cached) = state.cached_listing(key).await {
        return Json(cached);
    }

    let sessions = match state.source.sessions(query.meeting_key).await {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!(
                "failed to fetch sessions for meeting {}: {:#}",
                query.meeting_key,
                e
            );
            return Json(serde_json::json!([]));
        }
    };

    let value = serde_json::json!(sessions);
    state.store_listing(key, value.clone()).await;
    Json(value)
}

#[derive(Deserialize)]
struct DriversQuery {
    session_key: u64,
}

/// Roster preview for the driver picker, before a session is loaded
async fn list_drivers(
    State(state): State<AppState>,
    Query(query): Query<DriversQuery>,
) -> Json<Vec<Driver>> {
    match state.source.drivers(query.session_key).await {
        Ok(drivers) => Json(drivers),
        Err(e) => {
            tracing::warn!(
                "failed to fetch drivers for session {}: {:#}",
                query.session_key,
                e
            );
            Json(Vec::new())
        }
    }
}

// === Session Endpoints ===

#[derive(Deserialize)]
struct LoadSessionRequest {
    session_key: Option<u64>,
    driver_numbers: Option<Vec<u32>>,
    #[serde(default)]
    live: bool,
}

#[derive(Serialize)]
struct DriverSummary {
    driver_number: u32,
    acronym: String,
    full_name: String,
    team_name: String,
    team_color: String,
    laps: usize,
}

#[derive(Serialize)]
struct SessionSummary {
    session: RaceSession,
    live: bool,
    total_frames: usize,
    degenerate: bool,
    extents: TrackExtents,
    drivers: Vec<DriverSummary>,
}

async fn load_session(
    State(state): State<AppState>,
    Json(request): Json<LoadSessionRequest>,
) -> Result<Json<SessionSummary>, (StatusCode, String)> {
    let drivers = request.driver_numbers.as_deref();

    let bundle = if request.live {
        load_live(state.source.as_ref(), drivers).await
    } else {
        let session_key = request.session_key.ok_or((
            StatusCode::BAD_REQUEST,
            "session_key is required unless live is set".to_string(),
        ))?;
        load_historical(state.source.as_ref(), session_key, drivers).await
    }
    .map_err(load_error_response)?;

    let live = bundle.is_live();
    state.install_bundle(bundle).await;

    if live {
        let token = CancellationToken::new();
        *state.live_cancel.write().await = Some(token.clone());
        tokio::spawn(live::run(state.clone(), token));
    }

    Ok(Json(build_summary(&state).await?))
}

async fn session_summary(
    State(state): State<AppState>,
) -> Result<Json<SessionSummary>, (StatusCode, String)> {
    Ok(Json(build_summary(&state).await?))
}

async fn build_summary(state: &AppState) -> Result<SessionSummary, (StatusCode, String)> {
    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let degenerate = state.track.read().await.is_none();

    let drivers = bundle
        .driver_numbers
        .iter()
        .map(|&number| {
            let lap_count = bundle
                .laps
                .iter()
                .filter(|l| l.driver_number == number)
                .count();
            match bundle.roster.get(number) {
                Some(driver) => DriverSummary {
                    driver_number: number,
                    acronym: driver.name_acronym.clone(),
                    full_name: driver.full_name.clone(),
                    team_name: driver.team_name.clone(),
                    team_color: driver.team_color.clone(),
                    laps: lap_count,
                },
                None => DriverSummary {
                    driver_number: number,
                    acronym: format!("#{}", number),
                    full_name: format!("#{}", number),
                    team_name: String::new(),
                    team_color: String::new(),
                    laps: lap_count,
                },
            }
        })
        .collect();

    Ok(SessionSummary {
        session: bundle.session.clone(),
        live: bundle.is_live(),
        total_frames: bundle.frames.len(),
        degenerate,
        extents: bundle.extents,
        drivers,
    })
}

// === Frame Endpoints ===

#[derive(Serialize)]
struct FrameRow {
    driver_number: u32,
    acronym: String,
    x: f64,
    y: f64,
    px: Option<i64>,
    py: Option<i64>,
    car: Option<CarMetrics>,
}

#[derive(Serialize)]
struct FrameResponse {
    frame: usize,
    timestamp: DateTime<Utc>,
    rows: Vec<FrameRow>,
}

async fn frame_rows(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<FrameResponse>, (StatusCode, String)> {
    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let total = bundle.frames.len();
    let rows = bundle
        .frames
        .frame(index)
        .ok_or_else(|| frame_out_of_range(index, total))?;
    let timestamp = bundle
        .frames
        .timestamp(index)
        .ok_or_else(|| frame_out_of_range(index, total))?;

    let track = state.track.read().await;
    let projection = track.as_ref().map(|t| *t.projection());

    let rows = rows
        .iter()
        .map(|(&driver, sample)| {
            let (px, py) = match &projection {
                Some(projection) => {
                    let (px, py) = projection.project(sample.x, sample.y);
                    (Some(px), Some(py))
                }
                None => (None, None),
            };
            FrameRow {
                driver_number: driver,
                acronym: bundle.roster.display_acronym(driver),
                x: sample.x,
                y: sample.y,
                px,
                py,
                car: sample.car,
            }
        })
        .collect();

    Ok(Json(FrameResponse {
        frame: index,
        timestamp,
        rows,
    }))
}

#[derive(Deserialize)]
struct FrameImageQuery {
    mode: Option<DisplayMode>,
    drivers: Option<String>,
}

async fn frame_image(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<FrameImageQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let selected = query
        .drivers
        .as_deref()
        .map(parse_driver_list)
        .transpose()?;

    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let rows = bundle
        .frames
        .frame(index)
        .ok_or_else(|| frame_out_of_range(index, bundle.frames.len()))?;

    let track = state.track.read().await;
    let track = track.as_ref().ok_or((
        StatusCode::CONFLICT,
        "track geometry is degenerate, images are unavailable".to_string(),
    ))?;

    let png = track
        .compose(
            rows,
            &bundle.roster,
            query.mode.unwrap_or_default(),
            selected.as_deref(),
        )
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render frame: {}", e),
            )
        })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

// === Playback Endpoints ===

async fn playback_status(State(state): State<AppState>) -> Json<PlaybackStatus> {
    let playback = state.playback.read().await;
    Json(playback.status())
}

#[derive(Deserialize)]
struct PlaybackRequest {
    action: String,
    value: Option<f64>,
}

async fn playback_control(
    State(state): State<AppState>,
    Json(request): Json<PlaybackRequest>,
) -> Result<Json<PlaybackStatus>, (StatusCode, String)> {
    let mut playback = state.playback.write().await;

    match request.action.as_str() {
        "play" => playback.play(),
        "pause" => playback.pause(),
        "toggle" => playback.toggle(),
        "reset" => {
            let total = playback.total_frames();
            playback.reset(total);
        }
        "seek" => {
            let frame = request
                .value
                .ok_or((StatusCode::BAD_REQUEST, "Missing 'value' for seek".to_string()))?;
            playback.seek(frame as usize);
        }
        "speed" => {
            let delay = request
                .value
                .ok_or((StatusCode::BAD_REQUEST, "Missing 'value' for speed".to_string()))?;
            playback.set_delay(delay);
        }
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown action: {}", other),
            ))
        }
    }

    Ok(Json(playback.status()))
}

async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Broadcast stream error: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// === Lap Endpoints ===

#[derive(Deserialize)]
struct LapsQuery {
    driver_number: u32,
}

async fn list_laps(
    State(state): State<AppState>,
    Query(query): Query<LapsQuery>,
) -> Result<Json<Vec<Lap>>, (StatusCode, String)> {
    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let laps = bundle
        .laps
        .iter()
        .filter(|l| l.driver_number == query.driver_number)
        .cloned()
        .collect();
    Ok(Json(laps))
}

#[derive(Deserialize)]
struct SectorsQuery {
    frame: usize,
    drivers: Option<String>,
}

#[derive(Serialize)]
struct SectorCell {
    duration: Option<f64>,
    delta: SectorDelta,
}

#[derive(Serialize)]
struct SectorRow {
    driver_number: u32,
    acronym: String,
    lap_number: Option<u32>,
    sectors: [SectorCell; 3],
}

async fn sector_table(
    State(state): State<AppState>,
    Query(query): Query<SectorsQuery>,
) -> Result<Json<Vec<SectorRow>>, (StatusCode, String)> {
    let selected = query
        .drivers
        .as_deref()
        .map(parse_driver_list)
        .transpose()?;

    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let timestamp = bundle
        .frames
        .timestamp(query.frame)
        .ok_or_else(|| frame_out_of_range(query.frame, bundle.frames.len()))?;

    let drivers = selected.unwrap_or_else(|| bundle.driver_numbers.clone());
    let rows = drivers
        .iter()
        .map(|&driver| {
            let acronym = bundle.roster.display_acronym(driver);
            match laps::current_lap(&bundle.laps, driver, timestamp) {
                Some(lap) => {
                    let previous = laps::previous_lap(&bundle.laps, driver, lap.lap_number);
                    let sectors = [0usize, 1, 2].map(|i| {
                        let current = lap.sector(i);
                        let baseline = previous.and_then(|p| p.sector(i));
                        SectorCell {
                            duration: current,
                            delta: laps::compare_sector(current, baseline),
                        }
                    });
                    SectorRow {
                        driver_number: driver,
                        acronym,
                        lap_number: Some(lap.lap_number),
                        sectors,
                    }
                }
                None => SectorRow {
                    driver_number: driver,
                    acronym,
                    lap_number: None,
                    sectors: [0usize, 1, 2].map(|_| SectorCell {
                        duration: None,
                        delta: SectorDelta::NoTime,
                    }),
                },
            }
        })
        .collect();

    Ok(Json(rows))
}

#[derive(Deserialize)]
struct LapTelemetryQuery {
    driver_number: u32,
    frame: usize,
}

#[derive(Serialize)]
struct LapTelemetry {
    driver_number: u32,
    lap_number: Option<u32>,
    lap_start: Option<DateTime<Utc>>,
    series: LapSeries,
}

async fn lap_telemetry(
    State(state): State<AppState>,
    Query(query): Query<LapTelemetryQuery>,
) -> Result<Json<LapTelemetry>, (StatusCode, String)> {
    let bundle = state.bundle.read().await;
    let bundle = bundle.as_ref().ok_or_else(no_session)?;
    let timestamp = bundle
        .frames
        .timestamp(query.frame)
        .ok_or_else(|| frame_out_of_range(query.frame, bundle.frames.len()))?;

    let response = match laps::current_lap(&bundle.laps, query.driver_number, timestamp) {
        Some(lap) => {
            let series = laps::lap_window(lap)
                .map(|(start, end)| {
                    laps::lap_series(&bundle.merged, query.driver_number, start, end)
                })
                .unwrap_or_default();
            LapTelemetry {
                driver_number: query.driver_number,
                lap_number: Some(lap.lap_number),
                lap_start: lap.date_start,
                series,
            }
        }
        None => LapTelemetry {
            driver_number: query.driver_number,
            lap_number: None,
            lap_start: None,
            series: LapSeries::default(),
        },
    };

    Ok(Json(response))
}

// === Helpers ===

fn no_session() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "no session loaded".to_string())
}

fn frame_out_of_range(index: usize, total: usize) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("frame {} out of range (0..{})", index, total),
    )
}

fn load_error_response(err: LoadError) -> (StatusCode, String) {
    let status = match &err {
        LoadError::NoLiveSession
        | LoadError::SessionNotFound(_)
        | LoadError::NoDrivers
        | LoadError::NoLocations => StatusCode::NOT_FOUND,
        LoadError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    tracing::warn!("session load failed: {}", err);
    (status, err.to_string())
}

fn parse_driver_list(raw: &str) -> Result<Vec<u32>, (StatusCode, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>().map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("invalid driver number: {:?}", part),
                )
            })
        })
        .collect()
}
