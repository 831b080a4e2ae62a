// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Live analysis pipeline
//!
//! Samples a camera (or any open-ended source) on an interval derived
//! from the source frame rate. Samples are stamped with wall-clock time
//! since the run started, and peak detection reruns over the whole
//! accumulated series after each new sample once enough points exist.
//!
//! A [`LiveControl`] handle lets other tasks pause, resume and stop the
//! run; pausing suspends frame intake entirely, so the pause interval
//! contributes no samples.

use crate::acquisition::VideoSource;
use crate::config::AnalysisConfig;
use crate::preprocessing::brightness;
use crate::processing::peaks::PeakDetector;
use crate::processing::state::{RunMode, SharedAnalysisState, StateError};
use crate::processing::stream::{AnalysisEvent, SharedEventStream};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Remote control for a running live pipeline.
#[derive(Debug, Clone)]
pub struct LiveControl {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl LiveControl {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request the run to end. The pipeline notices on its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Suspend frame intake without ending the run.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume frame intake after a pause.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Open-ended pipeline over a live source.
pub struct LiveAnalysisPipeline {
    source: Box<dyn VideoSource>,
    state: SharedAnalysisState,
    events: SharedEventStream,
    control: LiveControl,
    detector: PeakDetector,
    frame_stride: u64,
    min_live_points: usize,
}

impl LiveAnalysisPipeline {
    /// Build a pipeline with the live detection thresholds from `config`.
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
            control: LiveControl::new(),
            detector: PeakDetector::live(config),
            frame_stride: frame_stride.max(1),
            min_live_points: config.min_live_points,
        }
    }

    /// Handle for pausing, resuming and stopping the run.
    pub fn control(&self) -> LiveControl {
        self.control.clone()
    }

    /// Run until stopped or the source ends. The source is closed when
    /// this returns, releasing the capture device.
    pub async fn run(mut self) -> Result<(), StateError> {
        self.state.begin_run(RunMode::LiveRunning).await?;
        self.control.running.store(true, Ordering::SeqCst);

        let fps = self.source.fps();
        let tick = Duration::from_secs_f64(1.0 / fps.max(1.0));
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            "Live analysis started: {:.2} fps, stride {}",
            fps, self.frame_stride
        );

        let start = Instant::now();
        let mut frames_read: u64 = 0;
        let mut was_paused = false;
        loop {
            interval.tick().await;
            if !self.control.running.load(Ordering::SeqCst) {
                info!("Live analysis stop requested");
                break;
            }

            let paused = self.control.paused.load(Ordering::SeqCst);
            if paused != was_paused {
                info!("Live analysis {}", if paused { "paused" } else { "resumed" });
                self.state.set_paused(paused).await;
                was_paused = paused;
            }
            if paused {
                continue;
            }

            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Live source ended after {} frames", frames_read);
                    break;
                }
                Err(e) => {
                    warn!("Dropping unreadable live frame: {}", e);
                    continue;
                }
            };

            if frames_read % self.frame_stride == 0 {
                let value = brightness::extract(&frame);
                let time_seconds = start.elapsed().as_secs_f64();
                self.state.append_sample(time_seconds, value).await;
                self.events
                    .publish(AnalysisEvent::DataPoint {
                        time_seconds,
                        brightness: value,
                    })
                    .await;

                let series = self.state.brightness_series().await;
                if series.len() > self.min_live_points {
                    let peaks = self.detector.detect(&series);
                    debug!("Live detection: {} peaks over {} samples", peaks.len(), series.len());
                    self.state.replace_peaks(peaks).await;
                }
            }
            frames_read += 1;
        }

        self.control.running.store(false, Ordering::SeqCst);
        self.events.publish(AnalysisEvent::Completed).await;
        self.state.finish_run().await;
        Ok(())
    }
}
