// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Video acquisition module
//!
//! This module handles the acquisition of video frames from files or from
//! live capture devices. Decoding is delegated to an `ffmpeg` child process
//! that emits raw 8-bit grayscale frames; sources own that process
//! exclusively and release it on every exit path.

use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

mod camera;
mod file;
mod mock;

pub use camera::CameraSource;
pub use file::FileSource;
pub use mock::MockSource;

use crate::config::AcquisitionConfig;

/// A single decoded video frame.
///
/// Intensity samples are unsigned 8-bit, either one grayscale channel or
/// interleaved multi-channel color. Frames are ephemeral: the decode step
/// owns them and they are dropped as soon as the brightness metric has been
/// extracted.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw intensity samples, `width * height * channels` bytes.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Number of interleaved channels (1 = grayscale, 3 = RGB).
    pub channels: u8,
}

impl VideoFrame {
    /// Create a grayscale frame from raw samples.
    pub fn gray(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            channels: 1,
        }
    }

    /// Check that the buffer length matches the declared geometry.
    pub fn is_valid(&self) -> bool {
        self.channels > 0
            && self.data.len() == (self.width * self.height) as usize * self.channels as usize
    }
}

/// Errors raised when a video source cannot be opened.
///
/// Open failures surface at construction, so a pipeline cannot exist
/// without a working source.
#[derive(thiserror::Error, Debug)]
pub enum SourceOpenError {
    #[error("Video file does not exist: {0}")]
    FileNotFound(PathBuf),

    #[error("Capture device {0} not found")]
    DeviceNotFound(u32),

    #[error("'{0}' executable not found in PATH (required for video decoding)")]
    DecoderMissing(&'static str),

    #[error("No video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Failed to spawn decoder: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Represents a video source (finite file, live device, or synthetic).
pub trait VideoSource: Send {
    /// Read the next frame.
    ///
    /// Returns `Ok(None)` at end of stream. A decode error for a single
    /// frame is returned as `Err` and is non-fatal: callers skip the frame
    /// and continue.
    fn read_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Nominal frame rate of this source in frames per second.
    fn fps(&self) -> f64;

    /// Total number of frames, if the source is finite.
    fn total_frames(&self) -> Option<u64>;
}

/// Get a video source for the given file path.
pub fn get_video_source_from_file<P: AsRef<Path>>(
    path: P,
    config: &AcquisitionConfig,
) -> Result<Box<dyn VideoSource>, SourceOpenError> {
    Ok(Box::new(FileSource::open(path.as_ref(), config)?))
}

/// Get a video source for the given capture device index.
pub fn get_video_source_from_device(
    device_index: u32,
    config: &AcquisitionConfig,
) -> Result<Box<dyn VideoSource>, SourceOpenError> {
    Ok(Box::new(CameraSource::open(device_index, config)?))
}

/// Enumerate available capture devices.
///
/// Probes device indices `0..range` and keeps those whose device node can
/// be opened.
pub fn list_video_devices(range: u32) -> Vec<u32> {
    let mut devices = Vec::new();
    for index in 0..range {
        let node = camera::device_node(index);
        match std::fs::File::open(&node) {
            Ok(_) => devices.push(index),
            Err(e) => debug!("Device probe {}: {}", node.display(), e),
        }
    }
    devices
}
