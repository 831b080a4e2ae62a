// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Batch analysis pipeline
//!
//! Consumes a finite video source to exhaustion: every stride-th frame is
//! reduced to a brightness sample stamped with its video-relative time
//! (`frame_index / fps`), then a single peak detection pass runs over the
//! complete series. Progress events are published at one-percent
//! granularity when the source reports a frame count.

use crate::acquisition::VideoSource;
use crate::config::AnalysisConfig;
use crate::preprocessing::brightness;
use crate::processing::peaks::PeakDetector;
use crate::processing::state::{RunMode, SharedAnalysisState, StateError};
use crate::processing::stream::{AnalysisEvent, SharedEventStream};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot pipeline over a finite source.
pub struct BatchAnalysisPipeline {
    source: Box<dyn VideoSource>,
    state: SharedAnalysisState,
    events: SharedEventStream,
    running: Arc<AtomicBool>,
    detector: PeakDetector,
    frame_stride: u64,
}

impl BatchAnalysisPipeline {
    /// Build a pipeline with the batch detection thresholds from `config`.
    pub fn new(
        source: Box<dyn VideoSource>,
        state: SharedAnalysisState,
        events: SharedEventStream,
        config: &AnalysisConfig,
        frame_stride: u64,
    ) -> Self {
        Self {
            source,
            state,
            events,
            running: Arc::new(AtomicBool::new(false)),
            detector: PeakDetector::batch(config),
            frame_stride: frame_stride.max(1),
        }
    }

    /// Handle that lets another task stop the run early.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the source to exhaustion, then detect peaks over the full
    /// series. Always releases the state, even when decoding fails
    /// partway through.
    pub async fn run(mut self) -> Result<(), StateError> {
        self.state.begin_run(RunMode::BatchRunning).await?;
        self.running.store(true, Ordering::SeqCst);

        let fps = self.source.fps();
        let total_frames = self.source.total_frames();
        let progress_step = total_frames.map(|t| (t / 100).max(1));
        info!(
            "Batch analysis started: {:.2} fps, {} frames, stride {}",
            fps,
            total_frames.map_or("unknown".to_string(), |t| t.to_string()),
            self.frame_stride
        );

        let mut frame_index: u64 = 0;
        let mut decode_errors: u64 = 0;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                info!("Batch analysis stopped at frame {}", frame_index);
                break;
            }
            match self.source.read_frame() {
                Ok(Some(frame)) => {
                    if frame_index % self.frame_stride == 0 {
                        let value = brightness::extract(&frame);
                        let time_seconds = frame_index as f64 / fps;
                        self.state.append_sample(time_seconds, value).await;
                        self.events
                            .publish(AnalysisEvent::DataPoint {
                                time_seconds,
                                brightness: value,
                            })
                            .await;
                    }
                    if let (Some(total), Some(step)) = (total_frames, progress_step) {
                        if frame_index % step == 0 {
                            let pct = ((frame_index * 100) / total).min(100) as u8;
                            self.events.publish(AnalysisEvent::Progress(pct)).await;
                        }
                    }
                    frame_index += 1;
                }
                Ok(None) => {
                    debug!("Source exhausted after {} frames", frame_index);
                    break;
                }
                Err(e) => {
                    decode_errors += 1;
                    warn!("Skipping undecodable frame {}: {}", frame_index, e);
                    frame_index += 1;
                }
            }
        }

        let series = self.state.brightness_series().await;
        let peaks = self.detector.detect(&series);
        info!(
            "Batch analysis finished: {} samples, {} peaks, {} decode errors",
            series.len(),
            peaks.len(),
            decode_errors
        );
        self.state.replace_peaks(peaks).await;

        self.events.publish(AnalysisEvent::Progress(100)).await;
        self.events.publish(AnalysisEvent::Completed).await;
        self.running.store(false, Ordering::SeqCst);
        self.state.finish_run().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MockSource;
    use crate::config::AnalysisConfig;

    #[tokio::test]
    async fn batch_run_samples_every_stride_frame() {
        let source = MockSource::new(40, 30.0);
        let state = SharedAnalysisState::new(3.5);
        let events = SharedEventStream::new();
        let pipeline = BatchAnalysisPipeline::new(
            Box::new(source),
            state.clone(),
            events,
            &AnalysisConfig::default(),
            4,
        );
        pipeline.run().await.unwrap();

        let snapshot = state.snapshot().await;
        // Frames 0, 4, 8, ... 36.
        assert_eq!(snapshot.sample_count(), 10);
        assert_eq!(snapshot.run_mode(), RunMode::Idle);
        let times = snapshot.time_points();
        assert!((times[0] - 0.0).abs() < 1e-12);
        assert!((times[1] - 4.0 / 30.0).abs() < 1e-12);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn batch_run_rejects_an_active_state() {
        let state = SharedAnalysisState::new(3.5);
        state.begin_run(RunMode::LiveRunning).await.unwrap();

        let pipeline = BatchAnalysisPipeline::new(
            Box::new(MockSource::new(8, 30.0)),
            state.clone(),
            SharedEventStream::new(),
            &AnalysisConfig::default(),
            4,
        );
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, StateError::RunAlreadyActive(RunMode::LiveRunning)));
        // The live run's state was not clobbered.
        assert_eq!(state.run_mode().await, RunMode::LiveRunning);
    }

    #[tokio::test]
    async fn batch_run_detects_oscillations_in_synthetic_video() {
        // 200 frames of a 40-frame oscillation, stride 1 so the full
        // waveform reaches the detector.
        let source = MockSource::new(200, 30.0);
        let state = SharedAnalysisState::new(3.5);
        let pipeline = BatchAnalysisPipeline::new(
            Box::new(source),
            state.clone(),
            SharedEventStream::new(),
            &AnalysisConfig::default(),
            1,
        );
        pipeline.run().await.unwrap();

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.sample_count(), 200);
        assert_eq!(snapshot.peak_count(), 5);
        assert_eq!(snapshot.peaks(), &[10, 50, 90, 130, 170]);

        let metrics = snapshot.derived_metrics();
        assert!((metrics.thickness_nm - 5.0 * 3.5 / 10.0).abs() < 1e-12);
    }
}
