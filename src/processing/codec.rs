// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Session persistence
//!
//! Two formats are supported. JSON is the round-trippable one: it carries
//! the full series, the peak count and user parameters, plus the derived
//! metrics as a convenience for external tooling. CSV is export-only and
//! carries the raw time/intensity table for spreadsheet work.
//!
//! Import is all-or-nothing: a malformed or inconsistent file leaves the
//! in-memory state exactly as it was.

use crate::processing::state::{AnalysisState, SharedAnalysisState, StateError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Errors from the persistence layer.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed session file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Inconsistent session: {times} time points but {values} brightness values")]
    Inconsistent { times: usize, values: usize },

    #[error(transparent)]
    State(#[from] StateError),
}

/// On-disk JSON session layout.
///
/// Field names are part of the format and must not change; files written
/// by earlier releases still import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub time_points: Vec<f64>,
    pub brightness_values: Vec<f64>,
    pub peak_count: usize,
    pub lattice_constant: f64,
    pub thickness_nm: f64,
    pub growth_rate_nm_per_hr: f64,
}

impl PersistedState {
    /// Capture a state snapshot, computing the derived metrics so the
    /// file is self-describing.
    pub fn from_state(state: &AnalysisState) -> Self {
        let metrics = state.derived_metrics();
        Self {
            time_points: state.time_points().to_vec(),
            brightness_values: state.brightness_values().to_vec(),
            peak_count: state.peak_count(),
            lattice_constant: state.lattice_constant(),
            thickness_nm: metrics.thickness_nm,
            growth_rate_nm_per_hr: metrics.growth_rate_nm_per_hr,
        }
    }
}

/// Write the session as pretty-printed JSON.
pub fn export_json<P: AsRef<Path>>(state: &AnalysisState, path: P) -> Result<(), CodecError> {
    let persisted = PersistedState::from_state(state);
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &persisted)?;
    Ok(())
}

/// Write the raw series as a two-column CSV table.
pub fn export_csv<P: AsRef<Path>>(state: &AnalysisState, path: P) -> Result<(), CodecError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Time (s)", "Intensity"])?;
    for (time, value) in state
        .time_points()
        .iter()
        .zip(state.brightness_values().iter())
    {
        writer.write_record([time.to_string(), value.to_string()])?;
    }
    writer.flush().map_err(CodecError::Io)?;
    Ok(())
}

/// Load a JSON session and replace the shared state with it.
///
/// No peak re-detection happens: the persisted `peak_count` is taken as
/// authoritative, since the detection thresholds that produced it are not
/// recorded in the file.
pub async fn import_json<P: AsRef<Path>>(
    state: &SharedAnalysisState,
    path: P,
) -> Result<PersistedState, CodecError> {
    let file = File::open(path)?;
    let persisted: PersistedState = serde_json::from_reader(BufReader::new(file))?;
    if persisted.time_points.len() != persisted.brightness_values.len() {
        return Err(CodecError::Inconsistent {
            times: persisted.time_points.len(),
            values: persisted.brightness_values.len(),
        });
    }
    state
        .restore(
            persisted.time_points.clone(),
            persisted.brightness_values.clone(),
            persisted.peak_count,
            persisted.lattice_constant,
        )
        .await?;
    Ok(persisted)
}
