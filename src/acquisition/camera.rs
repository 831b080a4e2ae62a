// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Video acquisition from capture devices
//!
//! Live capture is read from V4L2 device nodes through an `ffmpeg` child
//! process emitting raw grayscale frames, at the geometry requested in the
//! acquisition configuration. The device handle is owned exclusively by the
//! source and released when the source is dropped.

use super::{SourceOpenError, VideoFrame, VideoSource};
use crate::config::AcquisitionConfig;
use anyhow::Result;
use log::{info, warn};
use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Path of the V4L2 device node for a given device index.
pub(super) fn device_node(index: u32) -> PathBuf {
    PathBuf::from(format!("/dev/video{}", index))
}

/// Video source that captures from a live device.
pub struct CameraSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    device_index: u32,
}

impl CameraSource {
    /// Open the capture device with the given index.
    ///
    /// The device frame rate is taken from the configuration fallback; V4L2
    /// devices that report their own rate drive the cadence through the
    /// blocking reads regardless.
    pub fn open(device_index: u32, config: &AcquisitionConfig) -> Result<Self, SourceOpenError> {
        let node = device_node(device_index);
        if !node.exists() {
            return Err(SourceOpenError::DeviceNotFound(device_index));
        }

        let width = config.capture_width;
        let height = config.capture_height;
        let fps = config.fallback_fps;

        let mut child = Command::new("ffmpeg")
            .arg("-v")
            .arg("error")
            .arg("-f")
            .arg("v4l2")
            .arg("-video_size")
            .arg(format!("{}x{}", width, height))
            .arg("-i")
            .arg(&node)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("gray")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    SourceOpenError::DecoderMissing("ffmpeg")
                } else {
                    SourceOpenError::SpawnFailed(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| SourceOpenError::ProbeFailed {
                path: node.clone(),
                reason: "capture produced no output pipe".to_string(),
            })?;

        info!(
            "Opened capture device {} ({}x{} @ {:.0} fps nominal)",
            node.display(),
            width,
            height,
            fps
        );

        Ok(Self {
            child,
            stdout,
            width,
            height,
            fps,
            device_index,
        })
    }

    /// Index of the device this source captures from.
    pub fn device_index(&self) -> u32 {
        self.device_index
    }
}

impl VideoSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        let frame_len = (self.width * self.height) as usize;
        let mut data = vec![0u8; frame_len];
        let mut filled = 0;

        while filled < frame_len {
            match self.stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            // The capture process exited (device unplugged or killed).
            warn!("Capture device {} stopped producing frames", self.device_index);
            return Ok(None);
        }
        if filled < frame_len {
            warn!(
                "Discarding truncated capture frame ({} of {} bytes)",
                filled, frame_len
            );
            return Ok(None);
        }

        Ok(Some(VideoFrame::gray(data, self.width, self.height)))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
