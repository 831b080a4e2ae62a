// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Rust RHEED library
//!
//! This library measures epitaxial thin-film growth from Reflection
//! High-Energy Electron Diffraction (RHEED) video. The oscillating intensity
//! of the diffraction specular spot is tracked over time; each oscillation
//! peak corresponds to the completion of one atomic monolayer, so the peak
//! count together with a user-supplied lattice constant yields film
//! thickness and growth rate.
//!
//! The crate is organized in three layers:
//! - [`acquisition`]: video sources (file, capture device, synthetic mock)
//! - [`preprocessing`]: per-frame brightness extraction and signal smoothing
//! - [`processing`]: the batch and live analysis pipelines, peak detection,
//!   derived metrics, shared state and its persisted forms

pub mod acquisition;
pub mod config;
pub mod preprocessing;
pub mod processing;
