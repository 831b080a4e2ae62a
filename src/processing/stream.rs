// Copyright (c) 2025 Hume Nano
// This file is part of the rust-rheed project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Analysis event stream
//!
//! Pipelines publish [`AnalysisEvent`]s into a bounded broadcast channel;
//! any number of subscribers (terminal progress display, future UIs) can
//! attach and detach at any time. Publishing never blocks the pipeline:
//! a slow subscriber lags and skips ahead rather than applying
//! backpressure to acquisition.

use log::{debug, warn};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default broadcast capacity. Old events are dropped for lagging
/// subscribers once the ring is full.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// One event on the analysis stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// A new sample was appended to the series.
    DataPoint { time_seconds: f64, brightness: f64 },
    /// Batch progress in percent, clamped to 0..=100.
    Progress(u8),
    /// The active run finished, normally or by stop request.
    Completed,
}

/// Counters describing stream activity.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Total events published since creation.
    pub total_events: u64,
    /// Subscriber count at the last publish.
    pub active_subscribers: usize,
    /// Unix timestamp of the last publish, in seconds.
    pub last_update: u64,
}

/// Cloneable publish handle with shared statistics.
#[derive(Debug, Clone)]
pub struct SharedEventStream {
    sender: broadcast::Sender<AnalysisEvent>,
    stats: Arc<RwLock<StreamStats>>,
}

impl Default for SharedEventStream {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedEventStream {
    /// Create a stream with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a stream with an explicit ring capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: Arc::new(RwLock::new(StreamStats::default())),
        }
    }

    /// Attach a new subscriber. It receives events published after this
    /// call only.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }

    /// Publish one event. Returns the number of subscribers that will
    /// see it; zero subscribers is not an error.
    pub async fn publish(&self, event: AnalysisEvent) -> usize {
        let receivers = self.sender.send(event).unwrap_or(0);
        let mut stats = self.stats.write().await;
        stats.total_events += 1;
        stats.active_subscribers = receivers;
        stats.last_update = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        receivers
    }

    /// Snapshot the stream counters.
    pub async fn stats(&self) -> StreamStats {
        self.stats.read().await.clone()
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving side that tolerates lag.
///
/// When the subscriber falls behind the ring capacity, the skipped
/// events are logged and reception continues from the oldest retained
/// event instead of failing.
pub struct EventStreamConsumer {
    receiver: broadcast::Receiver<AnalysisEvent>,
}

impl EventStreamConsumer {
    pub fn new(stream: &SharedEventStream) -> Self {
        Self {
            receiver: stream.subscribe(),
        }
    }

    /// Receive the next event, skipping over any lag gap. Returns `None`
    /// once the stream is closed and drained.
    pub async fn next_event(&mut self) -> Option<AnalysisEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event stream closed");
                    return None;
                }
            }
        }
    }
}
