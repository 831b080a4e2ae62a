// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Analysis processing module
//!
//! This module contains the oscillation-analysis engine: peak detection over
//! smoothed brightness traces, derived growth metrics, the shared analysis
//! state with its persisted forms, and the batch and live pipelines that
//! drive a video source end to end.

pub mod batch;
pub mod codec;
pub mod live;
pub mod metrics;
pub mod peaks;
pub mod state;
pub mod stream;

pub use batch::BatchAnalysisPipeline;
pub use codec::{export_csv, export_json, import_json, CodecError, PersistedState};
pub use live::{LiveAnalysisPipeline, LiveControl};
pub use metrics::DerivedMetrics;
pub use peaks::PeakDetector;
pub use state::{AnalysisState, RunMode, SharedAnalysisState, StateError};
pub use stream::{AnalysisEvent, EventStreamConsumer, SharedEventStream};
