//! Gross-motor panic alarm.
//!
//! Watches per-sample energy (`|ax|+|ay|+|az|`) against the profile's
//! calibrated panic threshold. An alarm is raised when a sample reaches the
//! threshold, then suppressed for a cooldown so one violent movement raises
//! one alarm. A threshold of zero or less disables the monitor.

use tracing::info;

use crate::types::MotionSample;

/// Energy alarm with a fixed re-arm cooldown.
#[derive(Debug, Clone)]
pub struct PanicMonitor {
    threshold: f32,
    cooldown_ms: u64,
    last_alarm_ms: Option<u64>,
}

impl PanicMonitor {
    pub fn new(threshold: f32, cooldown_ms: u64) -> Self {
        Self {
            threshold,
            cooldown_ms,
            last_alarm_ms: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Adopts a recalibrated threshold. The cooldown state is kept.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0.0 && self.threshold.is_finite()
    }

    /// Returns the sample's energy if it raises an alarm.
    pub fn observe(&mut self, sample: &MotionSample) -> Option<f32> {
        if !self.is_enabled() {
            return None;
        }
        let energy = sample.energy();
        if !energy.is_finite() || energy < self.threshold {
            return None;
        }
        if let Some(last) = self.last_alarm_ms {
            if sample.t.saturating_sub(last) < self.cooldown_ms {
                return None;
            }
        }
        self.last_alarm_ms = Some(sample.t);
        info!(energy, threshold = self.threshold, "panic motion detected");
        Some(energy)
    }

    pub fn reset(&mut self) {
        self.last_alarm_ms = None;
    }
}
