// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Mock video source module
//!
//! This module provides a mock video source that generates synthetic RHEED
//! frames for testing and simulation purposes: a flat background with a
//! compact specular spot whose intensity oscillates sinusoidally, one full
//! oscillation per simulated monolayer.

use super::{VideoFrame, VideoSource};
use anyhow::Result;
use std::f64::consts::TAU;

/// Number of pixels in the synthetic specular spot.
///
/// Matches the sample count of the brightness extractor's top-intensity
/// mean, so the extracted metric equals the spot level exactly.
const SPOT_PIXELS: usize = 100;

/// Mock video source generating a synthetic oscillating specular spot.
pub struct MockSource {
    width: u32,
    height: u32,
    fps: f64,
    total_frames: Option<u64>,
    frames_emitted: u64,
    /// Oscillation period in frames (one simulated monolayer).
    period_frames: f64,
    background_level: u8,
    spot_amplitude: u8,
}

impl MockSource {
    /// Create a finite mock source emitting `total_frames` frames.
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            width: 64,
            height: 48,
            fps,
            total_frames: Some(total_frames),
            frames_emitted: 0,
            period_frames: 40.0,
            background_level: 40,
            spot_amplitude: 120,
        }
    }

    /// Create an endless mock source, standing in for a capture device.
    pub fn endless(fps: f64) -> Self {
        Self {
            total_frames: None,
            ..Self::new(0, fps)
        }
    }

    /// Set the oscillation period in frames.
    pub fn with_period_frames(mut self, period: f64) -> Self {
        self.period_frames = period;
        self
    }

    /// Set the frame geometry.
    pub fn with_geometry(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Spot intensity for a given frame index.
    fn spot_level(&self, frame_index: u64) -> u8 {
        let phase = TAU * frame_index as f64 / self.period_frames;
        let normalized = 0.5 + 0.5 * phase.sin();
        self.background_level
            .saturating_add((self.spot_amplitude as f64 * normalized).round() as u8)
    }
}

impl VideoSource for MockSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        if let Some(total) = self.total_frames {
            if self.frames_emitted >= total {
                return Ok(None);
            }
        }

        let pixel_count = (self.width * self.height) as usize;
        let mut data = vec![self.background_level; pixel_count];
        let spot = self.spot_level(self.frames_emitted);
        for pixel in data.iter_mut().take(SPOT_PIXELS.min(pixel_count)) {
            *pixel = spot;
        }

        self.frames_emitted += 1;
        Ok(Some(VideoFrame::gray(data, self.width, self.height)))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }
}
