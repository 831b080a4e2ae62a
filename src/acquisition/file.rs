// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Video acquisition from files
//!
//! This module decodes finite video files (any container `ffmpeg` can read)
//! into raw 8-bit grayscale frames. The container is probed with `ffprobe`
//! first so the pipeline knows the frame rate and total frame count up
//! front; frames are then streamed from an `ffmpeg` child process.

use super::{SourceOpenError, VideoFrame, VideoSource};
use crate::config::AcquisitionConfig;
use anyhow::Result;
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Metadata of a finite video container, as reported by `ffprobe`.
#[derive(Debug, Clone, Copy)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Video source that reads from a finite file via an `ffmpeg` child process.
pub struct FileSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    metadata: VideoMetadata,
    frames_read: u64,
    path: PathBuf,
}

impl FileSource {
    /// Open the given video file.
    ///
    /// Probes the container, validates that it has a video stream, and
    /// spawns the decoder. All failure modes are typed [`SourceOpenError`]s.
    pub fn open(path: &Path, config: &AcquisitionConfig) -> Result<Self, SourceOpenError> {
        if !path.exists() {
            return Err(SourceOpenError::FileNotFound(path.to_path_buf()));
        }

        let metadata = probe_video(path, config.fallback_fps)?;
        info!("Opened video file: {}", path.display());
        info!("  Geometry: {}x{}", metadata.width, metadata.height);
        info!("  Frame rate: {:.2} fps", metadata.fps);
        info!("  Total frames: {}", metadata.total_frames);

        let mut child = Command::new("ffmpeg")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
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
                path: path.to_path_buf(),
                reason: "decoder produced no output pipe".to_string(),
            })?;

        Ok(Self {
            child,
            stdout,
            metadata,
            frames_read: 0,
            path: path.to_path_buf(),
        })
    }

    /// Metadata probed from the container at open time.
    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }
}

impl VideoSource for FileSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        let frame_len = (self.metadata.width * self.metadata.height) as usize;
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
            debug!(
                "Reached end of {} after {} frames",
                self.path.display(),
                self.frames_read
            );
            return Ok(None);
        }
        if filled < frame_len {
            warn!(
                "Discarding truncated trailing frame ({} of {} bytes)",
                filled, frame_len
            );
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Some(VideoFrame::gray(
            data,
            self.metadata.width,
            self.metadata.height,
        )))
    }

    fn fps(&self) -> f64 {
        self.metadata.fps
    }

    fn total_frames(&self) -> Option<u64> {
        // Zero means the container reported neither nb_frames nor duration.
        if self.metadata.total_frames > 0 {
            Some(self.metadata.total_frames)
        } else {
            None
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        // The decoder is owned exclusively by this source; reap it on every
        // exit path so no zombie child outlives a stopped pipeline.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Probe a container with `ffprobe` and extract the first video stream.
fn probe_video(path: &Path, fallback_fps: f64) -> Result<VideoMetadata, SourceOpenError> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,avg_frame_rate,nb_frames,duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SourceOpenError::DecoderMissing("ffprobe")
            } else {
                SourceOpenError::SpawnFailed(e)
            }
        })?;

    if !output.status.success() {
        return Err(SourceOpenError::ProbeFailed {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let probe: ProbeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| SourceOpenError::ProbeFailed {
            path: path.to_path_buf(),
            reason: format!("unparseable ffprobe output: {}", e),
        })?;

    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| SourceOpenError::NoVideoStream(path.to_path_buf()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(SourceOpenError::NoVideoStream(path.to_path_buf())),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(fallback_fps);

    // nb_frames is absent from some containers; fall back to duration * fps.
    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .or_else(|| {
            stream
                .duration
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .map(|d| (d * fps).round() as u64)
        })
        .unwrap_or(0);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        total_frames,
    })
}

/// Parse an ffprobe rational frame rate such as `"30000/1001"`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let mut parts = rate.splitn(2, '/');
    let num: f64 = parts.next()?.trim().parse().ok()?;
    let den: f64 = match parts.next() {
        Some(d) => d.trim().parse().ok()?,
        None => 1.0,
    };
    if num > 0.0 && den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}
