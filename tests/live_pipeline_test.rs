// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Integration tests for the live analysis pipeline: pause/resume
//! semantics, stop requests and source hand-back.

use rust_rheed::acquisition::MockSource;
use rust_rheed::config::AnalysisConfig;
use rust_rheed::processing::{
    LiveAnalysisPipeline, RunMode, SharedAnalysisState, SharedEventStream,
};
use std::time::Duration;

fn endless_pipeline(
    state: &SharedAnalysisState,
    stride: u64,
) -> LiveAnalysisPipeline {
    LiveAnalysisPipeline::new(
        Box::new(MockSource::endless(1000.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        stride,
    )
}

#[tokio::test]
async fn stop_ends_the_run_and_releases_the_state() {
    let state = SharedAnalysisState::new(3.5);
    let pipeline = endless_pipeline(&state, 1);
    let control = pipeline.control();
    let handle = tokio::spawn(pipeline.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.run_mode().await, RunMode::LiveRunning);
    control.stop();
    handle.await.unwrap().unwrap();

    assert_eq!(state.run_mode().await, RunMode::Idle);
    assert!(state.sample_count().await > 0);

    // The state is free for the next run.
    state.begin_run(RunMode::BatchRunning).await.unwrap();
}

#[tokio::test]
async fn pause_suspends_sampling_and_resume_continues_it() {
    let state = SharedAnalysisState::new(3.5);
    let pipeline = endless_pipeline(&state, 1);
    let control = pipeline.control();
    let handle = tokio::spawn(pipeline.run());

    tokio::time::sleep(Duration::from_millis(30)).await;
    control.pause();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.run_mode().await, RunMode::LivePaused);
    let frozen = state.sample_count().await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(state.sample_count().await, frozen);

    control.resume();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(state.run_mode().await, RunMode::LiveRunning);
    assert!(state.sample_count().await > frozen);

    control.stop();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn overlapping_runs_are_rejected() {
    let state = SharedAnalysisState::new(3.5);
    let first = endless_pipeline(&state, 1);
    let control = first.control();
    let handle = tokio::spawn(first.run());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = endless_pipeline(&state, 1);
    assert!(second.run().await.is_err());

    control.stop();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn detection_waits_for_enough_live_points() {
    let state = SharedAnalysisState::new(3.5);
    // Ten frames, stride 1: at or below the live detection threshold,
    // so no peaks may be reported.
    let pipeline = LiveAnalysisPipeline::new(
        Box::new(MockSource::new(10, 1000.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        1,
    );
    pipeline.run().await.unwrap();

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.sample_count(), 10);
    assert_eq!(snapshot.peak_count(), 0);
}

#[tokio::test]
async fn finite_live_source_drains_to_completion() {
    let state = SharedAnalysisState::new(3.5);
    let pipeline = LiveAnalysisPipeline::new(
        Box::new(MockSource::new(60, 1000.0)),
        state.clone(),
        SharedEventStream::new(),
        &AnalysisConfig::default(),
        4,
    );
    pipeline.run().await.unwrap();

    let snapshot = state.snapshot().await;
    assert_eq!(snapshot.sample_count(), 15);
    assert_eq!(snapshot.run_mode(), RunMode::Idle);
    // Wall-clock stamps increase monotonically.
    assert!(snapshot.time_points().windows(2).all(|w| w[0] < w[1]));
}
