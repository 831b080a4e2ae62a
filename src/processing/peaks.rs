// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Oscillation peak detection
//!
//! Turns a noisy brightness series into a set of oscillation maxima: the
//! series is smoothed with a Savitzky-Golay filter, then local maxima are
//! picked against a height threshold derived from the smoothed range and a
//! minimum index separation derived from the series length.
//!
//! Two operating points are used in practice: whole-series detection at the
//! end of a batch run uses tighter thresholds (`0.3`/`0.1`), incremental
//! detection during a live run uses looser ones (`0.1`/`0.05`) so that short
//! early series register peaks at all. Both are configuration knobs.

use crate::config::{AnalysisConfig, DetectionConfig};
use crate::preprocessing::filters::{Filter, SavitzkyGolayFilter};

/// Peak detector over smoothed brightness series.
///
/// Detection is total: degenerate inputs (fewer than two samples, or a flat
/// signal with zero range) yield an empty peak set, never an error. Returned
/// indices are strictly increasing and always valid for the input series.
#[derive(Debug, Clone, Copy)]
pub struct PeakDetector {
    height_fraction: f64,
    distance_fraction: f64,
    filter: SavitzkyGolayFilter,
}

impl PeakDetector {
    /// Create a detector with the given operating point and smoothing
    /// parameters.
    pub fn new(detection: DetectionConfig, window: usize, order: usize) -> Self {
        Self {
            height_fraction: detection.height_fraction,
            distance_fraction: detection.distance_fraction,
            filter: SavitzkyGolayFilter::new()
                .with_window(window)
                .with_order(order),
        }
    }

    /// Detector for whole-series batch detection, from configuration.
    pub fn batch(config: &AnalysisConfig) -> Self {
        Self::new(
            config.batch_detection,
            config.smoothing_window,
            config.polynomial_order,
        )
    }

    /// Detector for incremental live detection, from configuration.
    pub fn live(config: &AnalysisConfig) -> Self {
        Self::new(
            config.live_detection,
            config.smoothing_window,
            config.polynomial_order,
        )
    }

    /// Detect oscillation peaks in a brightness series.
    pub fn detect(&self, brightness: &[f64]) -> Vec<usize> {
        if brightness.len() < 2 {
            return Vec::new();
        }

        // Flatness is decided on the raw series: smoothing introduces
        // rounding noise on the order of 1e-14 that would otherwise turn a
        // constant signal into spurious maxima.
        let raw_min = brightness.iter().copied().fold(f64::INFINITY, f64::min);
        let raw_max = brightness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if raw_max - raw_min <= 0.0 {
            // Flat signal: no oscillation to count.
            return Vec::new();
        }

        let smoothed = self.filter.apply(brightness);
        let min = smoothed.iter().copied().fold(f64::INFINITY, f64::min);
        let max = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range <= 0.0 {
            return Vec::new();
        }

        let min_height = min + self.height_fraction * range;
        let min_distance = ((self.distance_fraction * smoothed.len() as f64) as usize).max(1);

        let candidates = local_maxima(&smoothed);
        select_peaks(&smoothed, candidates, min_height, min_distance)
    }
}

/// Indices of all interior local maxima, plateaus resolved to their
/// midpoint. Endpoints are never maxima.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    let n = signal.len();
    let mut i = 1;
    while i + 1 < n {
        if signal[i] > signal[i - 1] {
            // Walk to the end of a possible plateau.
            let mut j = i;
            while j + 1 < n && signal[j + 1] == signal[j] {
                j += 1;
            }
            if j + 1 < n && signal[j + 1] < signal[j] {
                maxima.push((i + j) / 2);
                i = j + 1;
                continue;
            }
            i = j + 1;
            continue;
        }
        i += 1;
    }
    maxima
}

/// Apply the height threshold, then greedily keep the highest candidates
/// while suppressing any other candidate within `min_distance` indices.
fn select_peaks(
    signal: &[f64],
    candidates: Vec<usize>,
    min_height: f64,
    min_distance: usize,
) -> Vec<usize> {
    let mut tall: Vec<usize> = candidates
        .into_iter()
        .filter(|&i| signal[i] >= min_height)
        .collect();
    tall.sort_by(|&a, &b| signal[b].total_cmp(&signal[a]));

    let mut kept: Vec<usize> = Vec::new();
    for candidate in tall {
        let clear = kept
            .iter()
            .all(|&k| candidate.abs_diff(k) >= min_distance);
        if clear {
            kept.push(candidate);
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    fn batch_detector() -> PeakDetector {
        PeakDetector::batch(&AnalysisConfig::default())
    }

    fn live_detector() -> PeakDetector {
        PeakDetector::live(&AnalysisConfig::default())
    }

    #[test]
    fn two_sharp_peaks_are_found_exactly() {
        let series = vec![
            10.0, 10.0, 10.0, 50.0, 10.0, 10.0, 10.0, 50.0, 10.0, 10.0, 10.0,
        ];
        assert_eq!(batch_detector().detect(&series), vec![3, 7]);
    }

    #[test]
    fn flat_series_has_no_peaks() {
        let series = vec![2.5; 30];
        assert!(batch_detector().detect(&series).is_empty());
        assert!(live_detector().detect(&series).is_empty());
    }

    #[test]
    fn constant_feed_reports_no_peaks_at_any_length() {
        // A blank camera feed yields brightness exactly 1.0 per frame;
        // smoothing rounding noise must not register phantom monolayers.
        assert!(live_detector().detect(&vec![1.0; 50]).is_empty());
        assert!(batch_detector().detect(&vec![7.5; 100]).is_empty());
        assert!(batch_detector().detect(&vec![1.0; 1000]).is_empty());
    }

    #[test]
    fn degenerate_series_have_no_peaks() {
        assert!(batch_detector().detect(&[]).is_empty());
        assert!(batch_detector().detect(&[1.0]).is_empty());
        assert!(batch_detector().detect(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn indices_are_strictly_increasing_and_valid() {
        let series: Vec<f64> = (0..200)
            .map(|i| (i as f64 * 0.2).sin() * 3.0 + 10.0)
            .collect();
        let peaks = batch_detector().detect(&series);
        assert!(!peaks.is_empty());
        for pair in peaks.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(*peaks.last().unwrap() < series.len());
    }

    #[test]
    fn oscillation_count_matches_the_waveform() {
        // Five full periods over 200 samples; each period contributes one
        // maximum well above the batch height threshold.
        let series: Vec<f64> = (0..200)
            .map(|i| (std::f64::consts::TAU * i as f64 / 40.0).sin() + 2.0)
            .collect();
        let peaks = batch_detector().detect(&series);
        assert_eq!(peaks.len(), 5);
    }

    #[test]
    fn distance_suppression_keeps_the_higher_peak() {
        // Raw local-maxima picking on an unsmoothed sawtooth: verify the
        // greedy tie-break directly on the helper functions.
        let signal = vec![0.0, 5.0, 0.0, 8.0, 0.0, 1.0, 0.0];
        let candidates = local_maxima(&signal);
        assert_eq!(candidates, vec![1, 3, 5]);
        let kept = select_peaks(&signal, candidates, 0.5, 3);
        assert_eq!(kept, vec![3]);
    }

    #[test]
    fn plateau_maxima_resolve_to_their_midpoint() {
        let signal = vec![0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 0.0];
        assert_eq!(local_maxima(&signal), vec![3]);
    }

    #[test]
    fn live_thresholds_register_peaks_in_short_series() {
        // 12 points, a single shallow oscillation: the looser live operating
        // point must see it.
        let series = vec![
            1.0, 1.05, 1.1, 1.3, 1.5, 1.6, 1.5, 1.3, 1.1, 1.05, 1.0, 1.0,
        ];
        let peaks = live_detector().detect(&series);
        assert!(!peaks.is_empty());
    }
}
