// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Integration tests for session export and import: an analysis run is
//! persisted to JSON and restored bit-exact into a fresh state.

use rust_rheed::acquisition::MockSource;
use rust_rheed::config::AnalysisConfig;
use rust_rheed::processing::{
    export_csv, export_json, import_json, BatchAnalysisPipeline, RunMode, SharedAnalysisState,
    SharedEventStream,
};

async fn analyzed_state() -> SharedAnalysisState {
    let state = SharedAnalysisState::new(3.5);
    let pipeline = BatchAnalysisPipeline::new(
        Box::new(MockSource::new(200, 30.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        1,
    );
    pipeline.run().await.unwrap();
    state
}

#[tokio::test]
async fn json_session_round_trips_bit_exact() {
    let state = analyzed_state().await;
    let original = state.snapshot().await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    export_json(&original, &path).unwrap();

    let restored = SharedAnalysisState::new(1.0);
    let persisted = import_json(&restored, &path).await.unwrap();
    assert_eq!(persisted.time_points, original.time_points());
    assert_eq!(persisted.brightness_values, original.brightness_values());
    assert_eq!(persisted.peak_count, 5);

    let snapshot = restored.snapshot().await;
    assert_eq!(snapshot.time_points(), original.time_points());
    assert_eq!(snapshot.brightness_values(), original.brightness_values());
    assert_eq!(snapshot.peak_count(), original.peak_count());
    assert_eq!(snapshot.lattice_constant(), 3.5);
    assert_eq!(snapshot.run_mode(), RunMode::Idle);

    // Metrics recompute identically from the restored series.
    let metrics = snapshot.derived_metrics();
    assert_eq!(metrics.thickness_nm, original.derived_metrics().thickness_nm);
}

#[tokio::test]
async fn json_file_carries_the_expected_fields() {
    let state = analyzed_state().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    export_json(&state.snapshot().await, &path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    for field in [
        "time_points",
        "brightness_values",
        "peak_count",
        "lattice_constant",
        "thickness_nm",
        "growth_rate_nm_per_hr",
    ] {
        assert!(raw.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(raw["peak_count"], 5);
    assert_eq!(raw["lattice_constant"], 3.5);
}

#[tokio::test]
async fn csv_export_is_a_plain_time_intensity_table() {
    let state = analyzed_state().await;
    let snapshot = state.snapshot().await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");
    export_csv(&snapshot, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next().unwrap(), "Time (s),Intensity");
    assert_eq!(contents.lines().count(), snapshot.sample_count() + 1);

    // Each row parses back into the original pair.
    for (line, (time, value)) in lines.zip(
        snapshot
            .time_points()
            .iter()
            .zip(snapshot.brightness_values().iter()),
    ) {
        let mut cols = line.split(',');
        assert_eq!(cols.next().unwrap().parse::<f64>().unwrap(), *time);
        assert_eq!(cols.next().unwrap().parse::<f64>().unwrap(), *value);
    }
}

#[tokio::test]
async fn import_during_an_active_run_is_rejected() {
    let state = analyzed_state().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    export_json(&state.snapshot().await, &path).unwrap();

    let busy = SharedAnalysisState::new(3.5);
    busy.begin_run(RunMode::LiveRunning).await.unwrap();
    assert!(import_json(&busy, &path).await.is_err());
    assert_eq!(busy.sample_count().await, 0);
    assert_eq!(busy.run_mode().await, RunMode::LiveRunning);
}
