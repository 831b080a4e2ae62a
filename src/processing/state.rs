// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Shared analysis state
//!
//! One [`AnalysisState`] aggregates the accumulated brightness series, the
//! detected peak set and the user parameters of a run. At most one pipeline
//! may mutate the state at a time; [`AnalysisState::begin_run`] enforces the
//! single-active-producer invariant, and all other consumers read immutable
//! snapshots through [`SharedAnalysisState`].

use crate::processing::metrics::DerivedMetrics;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which pipeline, if any, currently owns the state for mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// No active pipeline; the state is read-only.
    Idle,
    /// A batch pipeline is appending samples.
    BatchRunning,
    /// A live pipeline is appending samples.
    LiveRunning,
    /// A live pipeline holds the state but sample acceptance is suspended.
    LivePaused,
}

impl RunMode {
    fn is_active(self) -> bool {
        self != RunMode::Idle
    }
}

/// Errors from state ownership and parameter updates.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("Another analysis run is already active ({0:?})")]
    RunAlreadyActive(RunMode),

    #[error("Lattice constant must be positive, got {0}")]
    InvalidLatticeConstant(f64),
}

/// The accumulated series, peak set and parameters of one analysis session.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    time_points: Vec<f64>,
    brightness_values: Vec<f64>,
    peaks: Vec<usize>,
    peak_count: usize,
    lattice_constant_angstrom: f64,
    run_mode: RunMode,
}

impl AnalysisState {
    /// Create an empty state with the given lattice constant.
    pub fn new(lattice_constant_angstrom: f64) -> Self {
        Self {
            time_points: Vec::new(),
            brightness_values: Vec::new(),
            peaks: Vec::new(),
            peak_count: 0,
            lattice_constant_angstrom,
            run_mode: RunMode::Idle,
        }
    }

    /// Claim exclusive write ownership for a new run.
    ///
    /// Clears the series and peak set, so every run starts from an empty
    /// trace. Fails if another pipeline is still active.
    pub fn begin_run(&mut self, mode: RunMode) -> Result<(), StateError> {
        if self.run_mode.is_active() {
            return Err(StateError::RunAlreadyActive(self.run_mode));
        }
        self.time_points.clear();
        self.brightness_values.clear();
        self.peaks.clear();
        self.peak_count = 0;
        self.run_mode = mode;
        Ok(())
    }

    /// Mark the active run as finished; the state becomes read-only.
    pub fn finish_run(&mut self) {
        self.run_mode = RunMode::Idle;
    }

    /// Toggle the live run between running and paused.
    pub fn set_paused(&mut self, paused: bool) {
        self.run_mode = match (self.run_mode, paused) {
            (RunMode::LiveRunning, true) => RunMode::LivePaused,
            (RunMode::LivePaused, false) => RunMode::LiveRunning,
            (mode, _) => mode,
        };
    }

    /// Append one sample. Samples arrive in non-decreasing time order from
    /// the single active producer.
    pub fn append_sample(&mut self, time_seconds: f64, brightness: f64) {
        self.time_points.push(time_seconds);
        self.brightness_values.push(brightness);
    }

    /// Replace the peak set wholesale with a fresh detection result.
    pub fn replace_peaks(&mut self, peaks: Vec<usize>) {
        self.peak_count = peaks.len();
        self.peaks = peaks;
    }

    /// Replace series, peak count and parameters from persisted data.
    ///
    /// Peak indices are not persisted, so the restored peak set is empty
    /// while the count is authoritative. Rejected while a run is active.
    pub fn restore(
        &mut self,
        time_points: Vec<f64>,
        brightness_values: Vec<f64>,
        peak_count: usize,
        lattice_constant_angstrom: f64,
    ) -> Result<(), StateError> {
        if self.run_mode.is_active() {
            return Err(StateError::RunAlreadyActive(self.run_mode));
        }
        if lattice_constant_angstrom <= 0.0 {
            return Err(StateError::InvalidLatticeConstant(lattice_constant_angstrom));
        }
        self.time_points = time_points;
        self.brightness_values = brightness_values;
        self.peaks = Vec::new();
        self.peak_count = peak_count;
        self.lattice_constant_angstrom = lattice_constant_angstrom;
        Ok(())
    }

    /// Update the lattice constant. Never touches the series; derived
    /// metrics are recomputed from scratch on every read.
    pub fn set_lattice_constant(&mut self, lattice: f64) -> Result<(), StateError> {
        if lattice <= 0.0 {
            return Err(StateError::InvalidLatticeConstant(lattice));
        }
        self.lattice_constant_angstrom = lattice;
        Ok(())
    }

    pub fn time_points(&self) -> &[f64] {
        &self.time_points
    }

    pub fn brightness_values(&self) -> &[f64] {
        &self.brightness_values
    }

    pub fn peaks(&self) -> &[usize] {
        &self.peaks
    }

    pub fn peak_count(&self) -> usize {
        self.peak_count
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant_angstrom
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn sample_count(&self) -> usize {
        self.time_points.len()
    }

    /// Compute the presentation metrics for the current state.
    pub fn derived_metrics(&self) -> DerivedMetrics {
        DerivedMetrics::compute(
            &self.time_points,
            self.peak_count,
            self.lattice_constant_angstrom,
        )
    }
}

/// Cloneable handle to the analysis state shared between the active
/// pipeline and read-only consumers.
#[derive(Debug, Clone)]
pub struct SharedAnalysisState {
    inner: Arc<RwLock<AnalysisState>>,
}

impl SharedAnalysisState {
    /// Create a fresh shared state.
    pub fn new(lattice_constant_angstrom: f64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AnalysisState::new(lattice_constant_angstrom))),
        }
    }

    /// Take an immutable snapshot of the whole state.
    pub async fn snapshot(&self) -> AnalysisState {
        self.inner.read().await.clone()
    }

    /// Claim write ownership for a new run.
    pub async fn begin_run(&self, mode: RunMode) -> Result<(), StateError> {
        self.inner.write().await.begin_run(mode)
    }

    /// Release write ownership.
    pub async fn finish_run(&self) {
        self.inner.write().await.finish_run();
    }

    /// Reflect a live pause/resume transition in the run mode.
    pub async fn set_paused(&self, paused: bool) {
        self.inner.write().await.set_paused(paused);
    }

    /// Append one sample.
    pub async fn append_sample(&self, time_seconds: f64, brightness: f64) {
        self.inner.write().await.append_sample(time_seconds, brightness);
    }

    /// Replace the peak set wholesale.
    pub async fn replace_peaks(&self, peaks: Vec<usize>) {
        self.inner.write().await.replace_peaks(peaks);
    }

    /// Clone the accumulated brightness series.
    pub async fn brightness_series(&self) -> Vec<f64> {
        self.inner.read().await.brightness_values.clone()
    }

    /// Number of accumulated samples.
    pub async fn sample_count(&self) -> usize {
        self.inner.read().await.sample_count()
    }

    /// Current run mode.
    pub async fn run_mode(&self) -> RunMode {
        self.inner.read().await.run_mode()
    }

    /// Update the lattice constant; series is untouched.
    pub async fn set_lattice_constant(&self, lattice: f64) -> Result<(), StateError> {
        self.inner.write().await.set_lattice_constant(lattice)
    }

    /// Compute the presentation metrics for the current state.
    pub async fn derived_metrics(&self) -> DerivedMetrics {
        self.inner.read().await.derived_metrics()
    }

    /// Atomically replace the state from persisted data.
    pub async fn restore(
        &self,
        time_points: Vec<f64>,
        brightness_values: Vec<f64>,
        peak_count: usize,
        lattice_constant_angstrom: f64,
    ) -> Result<(), StateError> {
        self.inner.write().await.restore(
            time_points,
            brightness_values,
            peak_count,
            lattice_constant_angstrom,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_run_rejects_an_active_producer() {
        let mut state = AnalysisState::new(3.5);
        state.begin_run(RunMode::BatchRunning).unwrap();
        let err = state.begin_run(RunMode::LiveRunning).unwrap_err();
        assert!(matches!(
            err,
            StateError::RunAlreadyActive(RunMode::BatchRunning)
        ));

        state.finish_run();
        state.begin_run(RunMode::LiveRunning).unwrap();
    }

    #[test]
    fn begin_run_clears_previous_session() {
        let mut state = AnalysisState::new(3.5);
        state.begin_run(RunMode::LiveRunning).unwrap();
        state.append_sample(0.1, 1.4);
        state.replace_peaks(vec![0]);
        state.finish_run();

        state.begin_run(RunMode::BatchRunning).unwrap();
        assert_eq!(state.sample_count(), 0);
        assert_eq!(state.peak_count(), 0);
        assert!(state.peaks().is_empty());
    }

    #[test]
    fn pause_transitions_only_apply_to_live_runs() {
        let mut state = AnalysisState::new(3.5);
        state.begin_run(RunMode::BatchRunning).unwrap();
        state.set_paused(true);
        assert_eq!(state.run_mode(), RunMode::BatchRunning);
        state.finish_run();

        state.begin_run(RunMode::LiveRunning).unwrap();
        state.set_paused(true);
        assert_eq!(state.run_mode(), RunMode::LivePaused);
        state.set_paused(false);
        assert_eq!(state.run_mode(), RunMode::LiveRunning);
    }

    #[test]
    fn lattice_updates_never_touch_the_series() {
        let mut state = AnalysisState::new(3.5);
        state.begin_run(RunMode::LiveRunning).unwrap();
        state.append_sample(0.5, 1.2);
        state.append_sample(1.0, 1.8);
        state.finish_run();

        state.set_lattice_constant(5.65).unwrap();
        assert_eq!(state.sample_count(), 2);
        assert_eq!(state.lattice_constant(), 5.65);
        assert!(state.set_lattice_constant(-1.0).is_err());
    }

    #[test]
    fn restore_is_rejected_during_a_run() {
        let mut state = AnalysisState::new(3.5);
        state.begin_run(RunMode::LiveRunning).unwrap();
        let err = state
            .restore(vec![0.0], vec![1.0], 1, 3.5)
            .unwrap_err();
        assert!(matches!(err, StateError::RunAlreadyActive(_)));
    }

    #[test]
    fn restore_keeps_count_but_not_indices() {
        let mut state = AnalysisState::new(3.5);
        state
            .restore(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 1.0], 7, 4.2)
            .unwrap();
        assert_eq!(state.peak_count(), 7);
        assert!(state.peaks().is_empty());
        assert_eq!(state.lattice_constant(), 4.2);
        assert_eq!(state.derived_metrics().thickness_nm, 7.0 * 4.2 / 10.0);
    }

    #[tokio::test]
    async fn shared_state_snapshots_are_consistent() {
        let shared = SharedAnalysisState::new(3.5);
        shared.begin_run(RunMode::LiveRunning).await.unwrap();
        shared.append_sample(0.0, 1.0).await;
        shared.append_sample(0.5, 2.0).await;
        shared.replace_peaks(vec![1]).await;

        let snapshot = shared.snapshot().await;
        assert_eq!(snapshot.time_points(), &[0.0, 0.5]);
        assert_eq!(snapshot.brightness_values(), &[1.0, 2.0]);
        assert_eq!(snapshot.peak_count(), 1);

        shared.finish_run().await;
        assert_eq!(shared.run_mode().await, RunMode::Idle);
    }
}
