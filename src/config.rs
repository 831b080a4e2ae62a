// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! # Configuration Management
//!
//! This module implements configuration handling for the RHEED analyzer.
//! Settings are loaded from a YAML file into nested sections; command line
//! arguments override individual fields afterwards.
//!
//! ## Configuration Structure
//!
//! - `acquisition`: video decoding and capture settings (frame stride,
//!   capture geometry, device probing range, fallback frame rate)
//! - `analysis`: signal conditioning and growth-metric settings (smoothing
//!   window, detection operating points, lattice constant)
//!
//! ## Usage
//!
//! ```no_run
//! use rust_rheed::config::Config;
//! use std::path::Path;
//!
//! // Load config from file; defaults are used if the file does not exist
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(Some(4.0), None);
//!
//! println!("Lattice constant: {} Å", config.analysis.lattice_constant_angstrom);
//! ```

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Configuration for video acquisition and decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Keep one frame out of every `frame_stride` decoded frames.
    ///
    /// The analysis samples every 4th frame by default, trading temporal
    /// resolution for throughput. Output compatibility with previously
    /// recorded sessions depends on this value, so change it only for new
    /// data sets.
    pub frame_stride: u64,

    /// Capture width in pixels requested from live devices. Default 640.
    pub capture_width: u32,

    /// Capture height in pixels requested from live devices. Default 480.
    pub capture_height: u32,

    /// Frame rate assumed for live devices that do not report one.
    /// Default 30.
    pub fallback_fps: f64,

    /// Number of device indices probed by device enumeration (`0..range`).
    /// Default 5.
    pub device_probe_range: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            frame_stride: 4,
            capture_width: 640,
            capture_height: 480,
            fallback_fps: 30.0,
            device_probe_range: 5,
        }
    }
}

/// One operating point of the peak detector.
///
/// Both thresholds are fractions: `height_fraction` of the smoothed signal
/// range above its minimum, and `distance_fraction` of the series length as
/// the minimum index separation between peaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum peak height as a fraction of the smoothed range. `[0, 1]`.
    pub height_fraction: f64,

    /// Minimum peak separation as a fraction of the series length. `[0, 1]`.
    pub distance_fraction: f64,
}

/// Configuration for signal conditioning and derived metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Out-of-plane lattice constant in Ångström. One detected oscillation
    /// corresponds to one monolayer of this spacing. Must be positive.
    /// Default 3.5.
    pub lattice_constant_angstrom: f64,

    /// Savitzky-Golay smoothing window length in samples (odd). The
    /// effective window shrinks automatically for short series. Default 11.
    pub smoothing_window: usize,

    /// Savitzky-Golay polynomial order. Reduced automatically when the
    /// effective window is too small for it. Default 3.
    pub polynomial_order: usize,

    /// Operating point for whole-series detection at the end of a batch run.
    pub batch_detection: DetectionConfig,

    /// Operating point for incremental detection during a live run. Looser
    /// than the batch thresholds so that short early series register peaks.
    pub live_detection: DetectionConfig,

    /// Minimum number of accumulated samples before live detection runs.
    /// Default 10.
    pub min_live_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lattice_constant_angstrom: 3.5,
            smoothing_window: 11,
            polynomial_order: 3,
            batch_detection: DetectionConfig {
                height_fraction: 0.3,
                distance_fraction: 0.1,
            },
            live_detection: DetectionConfig {
                height_fraction: 0.1,
                distance_fraction: 0.05,
            },
            min_live_points: 10,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Video acquisition settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Signal conditioning and metric settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error: the defaults are returned so the
    /// analyzer runs without any on-disk configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Configuration file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let config: Config = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides.
    ///
    /// Only the fields for which an argument was provided are changed.
    pub fn apply_args(&mut self, lattice_constant: Option<f64>, frame_stride: Option<u64>) {
        if let Some(lattice) = lattice_constant {
            debug!("Overriding lattice constant from command line: {}", lattice);
            self.analysis.lattice_constant_angstrom = lattice;
        }

        if let Some(stride) = frame_stride {
            debug!("Overriding frame stride from command line: {}", stride);
            self.acquisition.frame_stride = stride;
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.lattice_constant_angstrom <= 0.0 {
            anyhow::bail!(
                "lattice_constant_angstrom must be positive, got {}",
                self.analysis.lattice_constant_angstrom
            );
        }
        if self.acquisition.frame_stride == 0 {
            anyhow::bail!("frame_stride must be at least 1");
        }
        if self.analysis.smoothing_window < 3 || self.analysis.smoothing_window % 2 == 0 {
            anyhow::bail!(
                "smoothing_window must be an odd value >= 3, got {}",
                self.analysis.smoothing_window
            );
        }
        Ok(())
    }
}
