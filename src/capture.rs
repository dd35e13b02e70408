//! Capture primitive shared by training and custom-mode matching.
//!
//! A `RecordingBuffer` accumulates samples for one capture window. The
//! window is bounded by time (or an external stop), not by sample count, so
//! its length follows the sensor rate. Peak energy is tracked on the way in
//! for gross-motor calibration.

use crate::types::MotionSample;

/// Samples accumulated during one capture window.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuffer {
    samples: Vec<MotionSample>,
    started_ms: Option<u64>,
    peak_energy: f32,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a capture window. Clears anything left over.
    pub fn begin(&mut self, now_ms: u64) {
        self.clear();
        self.started_ms = Some(now_ms);
    }

    /// Appends a sample. Readings with a non-finite axis are dropped and
    /// `false` is returned; they can neither be matched nor persisted.
    pub fn push(&mut self, sample: MotionSample) -> bool {
        if !sample.is_finite() {
            return false;
        }
        if self.started_ms.is_none() {
            self.started_ms = Some(sample.t);
        }
        self.peak_energy = self.peak_energy.max(sample.energy());
        self.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    /// Whether a window is open.
    pub fn is_active(&self) -> bool {
        self.started_ms.is_some()
    }

    pub fn started_ms(&self) -> Option<u64> {
        self.started_ms
    }

    /// Time since the window opened, as of `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.started_ms.map_or(0, |start| now_ms.saturating_sub(start))
    }

    /// Largest `|ax|+|ay|+|az|` seen in this window (0 when empty).
    pub fn peak_energy(&self) -> f32 {
        self.peak_energy
    }

    /// Hands the samples over and closes the window.
    pub fn take(&mut self) -> Vec<MotionSample> {
        self.started_ms = None;
        self.peak_energy = 0.0;
        std::mem::take(&mut self.samples)
    }

    /// Drops the samples and closes the window.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.started_ms = None;
        self.peak_energy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_energy_tracks_maximum() {
        let mut buffer = RecordingBuffer::new();
        buffer.begin(100);
        buffer.push(MotionSample::accel_only(100, [1.0, 2.0, 9.8]));
        buffer.push(MotionSample::accel_only(120, [-15.0, 12.0, 20.0]));
        buffer.push(MotionSample::accel_only(140, [0.0, 0.0, 9.8]));
        assert_eq!(buffer.len(), 3);
        assert!((buffer.peak_energy() - 47.0).abs() < 1e-4);
        assert_eq!(buffer.elapsed_ms(600), 500);
    }

    #[test]
    fn test_take_empties_and_closes() {
        let mut buffer = RecordingBuffer::new();
        buffer.begin(0);
        buffer.push(MotionSample::accel_only(10, [1.0, 1.0, 1.0]));
        let samples = buffer.take();
        assert_eq!(samples.len(), 1);
        assert!(buffer.is_empty());
        assert!(!buffer.is_active());
        assert_eq!(buffer.peak_energy(), 0.0);
    }

    #[test]
    fn test_begin_clears_previous_window() {
        let mut buffer = RecordingBuffer::new();
        buffer.push(MotionSample::accel_only(5, [1.0, 1.0, 1.0]));
        assert_eq!(buffer.started_ms(), Some(5));
        buffer.begin(50);
        assert!(buffer.is_empty());
        assert_eq!(buffer.started_ms(), Some(50));
        assert_eq!(buffer.elapsed_ms(10), 0);
    }

    #[test]
    fn test_non_finite_samples_dropped() {
        let mut buffer = RecordingBuffer::new();
        buffer.begin(0);
        assert!(buffer.push(MotionSample::accel_only(0, [1.0, 2.0, 9.8])));
        assert!(!buffer.push(MotionSample::accel_only(20, [f32::NAN, 0.0, 9.8])));
        assert!(!buffer.push(MotionSample::accel_only(40, [f32::INFINITY, 0.0, 9.8])));
        assert!(!buffer.push(MotionSample::new(60, [0.0, 0.0, 9.8], [0.0, f32::NEG_INFINITY, 0.0])));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.peak_energy().is_finite());
        assert!((buffer.peak_energy() - 12.8).abs() < 1e-4);
    }
}
