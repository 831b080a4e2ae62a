// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Brightness metric extraction
//!
//! Reduces one video frame to a single scalar: the ratio of the specular
//! spot intensity to the diffuse background. The spot is approximated by the
//! brightest pixels of the frame instead of being localized spatially, which
//! keeps the metric robust against spot drift during growth.
//!
//! The metric is a pure function of the frame contents: identical frames
//! always produce identical values, and the value is always finite and
//! non-negative.

use crate::acquisition::VideoFrame;

/// Number of brightest samples averaged into the specular-spot estimate.
///
/// Fixed at 100 for output compatibility with previously recorded sessions;
/// frames with fewer samples use all of them.
const TOP_SAMPLE_COUNT: usize = 100;

/// Percentile band used for the trimmed-mean background estimate.
const BACKGROUND_BAND: (f64, f64) = (0.10, 0.90);

/// Extract the brightness metric from a frame.
///
/// Multi-channel frames are first reduced to grayscale with BT.601 luma
/// weights. The metric is `top / background` where `top` is the mean of the
/// 100 highest samples and `background` is the trimmed mean of the samples
/// inside the [10th, 90th] percentile band. A non-positive background
/// saturates the metric at 1.0, a value that never registers as a peak.
pub fn extract(frame: &VideoFrame) -> f64 {
    let mut samples = to_gray(frame);
    if samples.is_empty() {
        return 1.0;
    }

    samples.sort_unstable_by(f64::total_cmp);

    let top_start = samples.len().saturating_sub(TOP_SAMPLE_COUNT);
    let top_intensity = mean(&samples[top_start..]);

    let p_low = percentile(&samples, BACKGROUND_BAND.0);
    let p_high = percentile(&samples, BACKGROUND_BAND.1);
    let band: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|&v| v >= p_low && v <= p_high)
        .collect();
    let background_intensity = if band.is_empty() { 0.0 } else { mean(&band) };

    if background_intensity > 0.0 {
        top_intensity / background_intensity
    } else {
        1.0
    }
}

/// Flatten a frame into grayscale samples.
fn to_gray(frame: &VideoFrame) -> Vec<f64> {
    match frame.channels {
        1 => frame.data.iter().map(|&v| v as f64).collect(),
        3 => frame
            .data
            .chunks_exact(3)
            .map(|px| 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64)
            .collect(),
        // Unexpected layouts: average the channels so the metric stays total.
        channels => frame
            .data
            .chunks_exact(channels as usize)
            .map(|px| px.iter().map(|&v| v as f64).sum::<f64>() / channels as f64)
            .collect(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolation percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + frac * (sorted[hi] - sorted[lo])
    }
}
