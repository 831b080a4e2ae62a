// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Signal preprocessing module
//!
//! This module reduces decoded video frames to the scalar brightness metric
//! tracked by the analysis pipelines, and provides the smoothing filter the
//! peak detector runs before picking oscillation maxima.

pub mod brightness;
pub mod filters;

pub use filters::{Filter, SavitzkyGolayFilter};
