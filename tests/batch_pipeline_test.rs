// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Integration tests for the batch analysis pipeline over a synthetic
//! video source.

use rust_rheed::acquisition::MockSource;
use rust_rheed::config::AnalysisConfig;
use rust_rheed::processing::{
    AnalysisEvent, BatchAnalysisPipeline, EventStreamConsumer, RunMode, SharedAnalysisState,
    SharedEventStream,
};

#[tokio::test]
async fn batch_run_produces_strided_time_series() {
    let state = SharedAnalysisState::new(3.5);
    let events = SharedEventStream::new();
    let pipeline = BatchAnalysisPipeline::new(
        Box::new(MockSource::new(40, 30.0)),
        state.clone(),
        events,
        &AnalysisConfig::default(),
        4,
    );
    pipeline.run().await.unwrap();

    let snapshot = state.snapshot().await;
    // Frames 0, 4, ..., 36 of forty.
    assert_eq!(snapshot.sample_count(), 10);
    assert_eq!(snapshot.run_mode(), RunMode::Idle);

    // Time stamps follow the video clock, not the wall clock.
    for (i, time) in snapshot.time_points().iter().enumerate() {
        let expected = (i as f64 * 4.0) / 30.0;
        assert!((time - expected).abs() < 1e-12, "sample {} at {}", i, time);
    }
}

#[tokio::test]
async fn batch_run_publishes_progress_and_completion() {
    let state = SharedAnalysisState::new(3.5);
    let events = SharedEventStream::new();
    let mut consumer = EventStreamConsumer::new(&events);
    let pipeline = BatchAnalysisPipeline::new(
        Box::new(MockSource::new(120, 30.0)),
        state,
        events,
        &AnalysisConfig::default(),
        4,
    );
    pipeline.run().await.unwrap();

    let mut data_points = 0usize;
    let mut last_progress: Option<u8> = None;
    let mut completed = false;
    while let Some(event) = consumer.next_event().await {
        match event {
            AnalysisEvent::DataPoint { brightness, .. } => {
                assert!(brightness >= 1.0);
                data_points += 1;
            }
            AnalysisEvent::Progress(pct) => {
                assert!(pct <= 100);
                if let Some(previous) = last_progress {
                    assert!(pct >= previous, "progress went backwards");
                }
                last_progress = Some(pct);
            }
            AnalysisEvent::Completed => {
                completed = true;
                break;
            }
        }
    }

    assert_eq!(data_points, 30);
    assert_eq!(last_progress, Some(100));
    assert!(completed);
}

#[tokio::test]
async fn batch_run_counts_synthetic_oscillations() {
    let state = SharedAnalysisState::new(3.5);
    let pipeline = BatchAnalysisPipeline::new(
        Box::new(MockSource::new(200, 30.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        1,
    );
    pipeline.run().await.unwrap();

    let snapshot = state.snapshot().await;
    // Five full 40-frame oscillations in 200 frames.
    assert_eq!(snapshot.peak_count(), 5);

    let metrics = snapshot.derived_metrics();
    assert!((metrics.thickness_nm - 1.75).abs() < 1e-12);
    assert!(metrics.growth_rate_nm_per_hr > 0.0);
}

#[tokio::test]
async fn batch_run_refuses_a_busy_state() {
    let state = SharedAnalysisState::new(3.5);
    state.begin_run(RunMode::LiveRunning).await.unwrap();

    let pipeline = BatchAnalysisPipeline::new(
        Box::new(MockSource::new(8, 30.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        4,
    );
    assert!(pipeline.run().await.is_err());
    assert_eq!(state.run_mode().await, RunMode::LiveRunning);
}
