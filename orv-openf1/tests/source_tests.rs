//! Integration tests for the DemoSource and the session loader

use orv_openf1::demo::{DEMO_MEETING_KEY, DEMO_SESSION_KEY};
use orv_openf1::{load_historical, load_live, DemoSource, LoadError};
use orv_core::align::MergeMode;
use orv_core::source::RaceDataSource;

#[tokio::test]
async fn test_demo_source_name() {
    let source = DemoSource::new();
    assert_eq!(source.name(), "Demo");
}

#[tokio::test]
async fn test_demo_source_listings() {
    let source = DemoSource::new();

    let meetings = source.meetings(2024).await.unwrap();
    assert_eq!(meetings.len(), 1, "2024 should have exactly one demo meeting");
    assert_eq!(meetings[0].meeting_key, DEMO_MEETING_KEY);

    let sessions = source.sessions(DEMO_MEETING_KEY).await.unwrap();
    assert_eq!(sessions.len(), 1, "the demo meeting should have one session");
    assert_eq!(sessions[0].session_key, DEMO_SESSION_KEY);

    assert!(
        source.meetings(2021).await.unwrap().is_empty(),
        "other years should list no meetings"
    );
    assert!(
        source.sessions(42).await.unwrap().is_empty(),
        "unknown meetings should list no sessions"
    );
}

#[tokio::test]
async fn test_load_historical_builds_a_complete_bundle() {
    let source = DemoSource::new();
    let bundle = load_historical(&source, DEMO_SESSION_KEY, None)
        .await
        .expect("loading the demo session should succeed");

    assert_eq!(bundle.session.session_key, DEMO_SESSION_KEY);
    assert_eq!(bundle.roster.len(), 3, "the demo roster has three drivers");
    assert_eq!(bundle.driver_numbers, vec![7, 22, 42]);
    assert_eq!(bundle.mode, MergeMode::Historical);
    assert!(!bundle.is_live());

    assert!(bundle.frames.len() > 100, "a full session should yield many frames");
    assert!(
        bundle
            .frames
            .timestamps()
            .windows(2)
            .all(|w| w[0] < w[1]),
        "frame timestamps should be strictly increasing"
    );

    assert!(!bundle.extents.is_degenerate(), "the demo circuit spans an area");
    assert_eq!(bundle.laps.len(), 15, "five laps for each of three drivers");
}

#[tokio::test]
async fn test_load_historical_attaches_telemetry_everywhere() {
    let source = DemoSource::new();
    let bundle = load_historical(&source, DEMO_SESSION_KEY, None)
        .await
        .unwrap();

    // Telemetry runs at a 700ms cadence against 500ms locations, so every
    // location has a telemetry sample within the 1s window.
    assert!(
        bundle.merged.iter().all(|s| s.car.is_some()),
        "every merged sample should carry car telemetry"
    );
}

#[tokio::test]
async fn test_load_historical_respects_driver_selection() {
    let source = DemoSource::new();
    let bundle = load_historical(&source, DEMO_SESSION_KEY, Some(&[22]))
        .await
        .expect("loading a single driver should succeed");

    assert_eq!(bundle.driver_numbers, vec![22]);
    assert!(
        bundle.merged.iter().all(|s| s.driver_number == 22),
        "merged data should only contain the selected driver"
    );
    assert_eq!(
        bundle.roster.len(),
        3,
        "the roster still lists everyone for display purposes"
    );
}

#[tokio::test]
async fn test_load_historical_unknown_session() {
    let source = DemoSource::new();
    let err = load_historical(&source, 123_456, None)
        .await
        .expect_err("an unknown session key should fail");
    assert!(matches!(err, LoadError::SessionNotFound(123_456)));
}

#[tokio::test]
async fn test_load_historical_unknown_driver_selection() {
    let source = DemoSource::new();
    let err = load_historical(&source, DEMO_SESSION_KEY, Some(&[99]))
        .await
        .expect_err("selecting only unknown drivers should fail");
    assert!(matches!(err, LoadError::NoDrivers));
}

#[tokio::test]
async fn test_load_live_without_a_live_session() {
    let source = DemoSource::new();
    let err = load_live(&source, None)
        .await
        .expect_err("the demo source never has a live session");
    assert!(matches!(err, LoadError::NoLiveSession));
}

#[tokio::test]
async fn test_bundle_session_serializes_to_json() {
    let source = DemoSource::new();
    let bundle = load_historical(&source, DEMO_SESSION_KEY, None)
        .await
        .unwrap();

    let json = serde_json::to_string(&bundle.session).expect("session should serialize");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("JSON should parse");
    assert_eq!(parsed["session_name"], "Race");
    assert_eq!(parsed["year"], 2024);
}
