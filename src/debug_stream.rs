//! Live debug stream of raw samples.
//!
//! Batches raw samples for an external visualizer. The stream is purely
//! observational: it copies samples out and never feeds anything back into
//! recognition.
//!
//! Message format (one JSON object per batch):
//! `{"seq":3,"device":"watch-1","samples":[{"t":..,"ax":..,..}]}`

use serde::{Deserialize, Serialize};

use crate::types::MotionSample;

/// One batch of raw samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugBatch {
    /// Monotonic batch counter, starting at 1.
    pub seq: u64,
    pub device: String,
    pub samples: Vec<MotionSample>,
}

impl DebugBatch {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Timestamp of the first sample in the batch.
    pub fn start_ms(&self) -> Option<u64> {
        self.samples.first().map(|s| s.t)
    }
}

/// Accumulates samples and cuts a batch every `batch_size` samples.
#[derive(Debug, Clone)]
pub struct DebugStreamer {
    batch_size: usize,
    sequence: u64,
    device: String,
    pending: Vec<MotionSample>,
}

impl DebugStreamer {
    /// A `batch_size` of zero disables the stream.
    pub fn new(device: &str, batch_size: usize) -> Self {
        Self {
            batch_size,
            sequence: 0,
            device: device.to_string(),
            pending: Vec::with_capacity(batch_size),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.batch_size > 0
    }

    /// Adds a sample; returns a batch when one fills up.
    pub fn push(&mut self, sample: MotionSample) -> Option<DebugBatch> {
        if !self.is_enabled() {
            return None;
        }
        self.pending.push(sample);
        if self.pending.len() >= self.batch_size {
            self.cut()
        } else {
            None
        }
    }

    /// Emits whatever is pending, even a short batch.
    pub fn flush(&mut self) -> Option<DebugBatch> {
        if self.pending.is_empty() {
            None
        } else {
            self.cut()
        }
    }

    /// Drops pending samples without emitting them. The sequence keeps
    /// counting so consumers can see the gap.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn cut(&mut self) -> Option<DebugBatch> {
        self.sequence += 1;
        Some(DebugBatch {
            seq: self.sequence,
            device: self.device.clone(),
            samples: std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size)),
        })
    }
}
