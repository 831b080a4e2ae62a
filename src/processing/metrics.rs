// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Derived growth metrics
//!
//! Converts a peak count, the elapsed growth time, and the lattice constant
//! into the presentation quantities: monolayer count, film thickness and
//! growth rate. Every function here is total; empty series and zero elapsed
//! time resolve to zero-valued metrics.

use serde::{Deserialize, Serialize};

/// Derived presentation metrics for one analysis state.
///
/// One detected oscillation peak corresponds to one monolayer of the
/// configured lattice spacing, so `thickness_nm = peaks * lattice_Å / 10`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Number of completed monolayers (detected oscillation peaks).
    pub peak_count: usize,
    /// Film thickness in nanometers.
    pub thickness_nm: f64,
    /// Growth rate in nanometers per hour.
    pub growth_rate_nm_per_hr: f64,
}

impl DerivedMetrics {
    /// Compute the metrics from the analysis inputs.
    ///
    /// `time_points` only contributes its maximum (the elapsed growth time);
    /// an empty series means zero elapsed time and therefore zero rate.
    pub fn compute(time_points: &[f64], peak_count: usize, lattice_constant_angstrom: f64) -> Self {
        let thickness_nm = peak_count as f64 * lattice_constant_angstrom / 10.0;

        let total_time_hrs = time_points
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
            .max(0.0)
            / 3600.0;

        let growth_rate_nm_per_hr = if total_time_hrs > 0.0 {
            thickness_nm / total_time_hrs
        } else {
            0.0
        };

        Self {
            peak_count,
            thickness_nm,
            growth_rate_nm_per_hr,
        }
    }
}
