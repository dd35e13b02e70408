//! Tunable thresholds for the gesture engine.
//!
//! Every constant the classifier and matcher depend on lives here with a
//! calibrated default. Axis cutoffs and dwell durations were tuned
//! empirically on one wrist-worn device; treat them as starting points to
//! re-calibrate per device. A JSON file may override any subset of fields.
//!
//! Units: acceleration in m/s², rotation in rad/s, durations in ms.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pose::Pose;

/// Thresholds and timing windows for the physics state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum single-sample change in `ay` that counts as an unlock twist.
    pub unlock_twist_delta: f32,
    /// Twists required to unlock.
    pub unlock_twist_count: u32,
    /// Inactivity gap after which the twist counter resets.
    pub twist_timeout_ms: u64,
    /// `|ax|` above this means the arm is hanging; twist counting is suppressed.
    pub hang_axis_limit: f32,

    /// Settle dwell after unlocking, before pose classification begins.
    pub unlock_dwell_ms: u64,
    /// Settle dwell after a pose is detected, before modifiers count.
    pub pose_dwell_ms: u64,
    /// How long LISTENING waits for a pose.
    pub listening_window_ms: u64,

    /// `ax` above this: arm raised.
    pub arm_up_min_ax: f32,
    /// `ay` above this (with small `|ax|`): palm forward.
    pub palm_forward_min_ay: f32,
    /// `ax` below this: arm pointing down.
    pub arm_down_max_ax: f32,
    /// `ay` below this (with small `|ax|`): sideways handshake orientation.
    pub handshake_max_ay: f32,
    /// Cross-axis ceiling shared by the palm-forward and handshake poses.
    pub cross_axis_limit: f32,

    /// Continuous handshake hold that auto-fires the default command.
    pub handshake_hold_ms: u64,
    /// `|az|` spike on the opposing axis that interrupts a handshake hold.
    pub handshake_interrupt_az: f32,

    /// Dominant-axis rotation rate that counts as a modifier twist.
    pub modifier_gyro_threshold: f32,
    /// Rotation rate below which the modifier detector re-arms.
    pub modifier_rearm_threshold: f32,
    /// Minimum pose hold past the last modifier before resolving.
    pub evaluation_min_hold_ms: u64,
    /// Quiet gap required after the last modifier before resolving.
    pub modifier_settle_ms: u64,
    /// How long EVALUATING may run without resolving.
    pub evaluation_window_ms: u64,

    /// Dwell after a command fires.
    pub cooldown_ms: u64,
    /// Conversation mode: after a command, wait for the limb to return to
    /// neutral and listen again instead of cooling down.
    pub conversation_mode: bool,
    /// How long CHAINING_WAIT waits for the limb to return to neutral.
    pub chaining_window_ms: u64,
    /// Neutral test for raised arm: `ax` below this.
    pub neutral_arm_up_max_ax: f32,
    /// Neutral test for palm forward: `ay` below this.
    pub neutral_palm_max_ay: f32,
    /// Neutral test for arm down: `ax` above this.
    pub neutral_arm_down_min_ax: f32,
    /// Neutral test for handshake: `ay` above this.
    pub neutral_handshake_min_ay: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            unlock_twist_delta: 7.0,
            unlock_twist_count: 3,
            twist_timeout_ms: 800,
            hang_axis_limit: 8.0,

            unlock_dwell_ms: 550,
            pose_dwell_ms: 500,
            listening_window_ms: 5500,

            arm_up_min_ax: 6.5,
            palm_forward_min_ay: 7.0,
            arm_down_max_ax: -6.5,
            handshake_max_ay: -7.0,
            cross_axis_limit: 5.0,

            handshake_hold_ms: 1200,
            handshake_interrupt_az: 6.0,

            modifier_gyro_threshold: 3.0,
            modifier_rearm_threshold: 1.5,
            evaluation_min_hold_ms: 750,
            modifier_settle_ms: 450,
            evaluation_window_ms: 6000,

            cooldown_ms: 2000,
            conversation_mode: false,
            chaining_window_ms: 5000,
            neutral_arm_up_max_ax: 3.0,
            neutral_palm_max_ay: 3.0,
            neutral_arm_down_min_ax: -3.0,
            neutral_handshake_min_ay: -3.0,
        }
    }
}

impl ClassifierConfig {
    /// Checks that the pose regions are disjoint and the timing is coherent.
    ///
    /// Overlapping pose regions are a configuration defect: at runtime the
    /// first pose in evaluation order still wins deterministically.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unlock_twist_count == 0 {
            return Err(ConfigError::Invalid("unlock_twist_count must be at least 1".into()));
        }
        if self.modifier_rearm_threshold >= self.modifier_gyro_threshold {
            return Err(ConfigError::Invalid(
                "modifier_rearm_threshold must be below modifier_gyro_threshold".into(),
            ));
        }
        if self.cross_axis_limit > self.arm_up_min_ax || -self.cross_axis_limit < self.arm_down_max_ax {
            return Err(ConfigError::PoseOverlap(
                "cross_axis_limit reaches into the arm-up/arm-down regions".into(),
            ));
        }
        if self.handshake_max_ay >= self.palm_forward_min_ay {
            return Err(ConfigError::PoseOverlap(
                "handshake ay ceiling reaches into the palm-forward region".into(),
            ));
        }

        // Probe a coarse grid for any point claimed by two poses.
        let step = 0.5_f32;
        let steps = (20.0 / step) as i32;
        for i in -steps..=steps {
            for j in -steps..=steps {
                for k in -steps..=steps {
                    let accel = [i as f32 * step, j as f32 * step, k as f32 * step];
                    let hits = Pose::EVALUATION_ORDER
                        .iter()
                        .filter(|pose| pose.is_held(accel, self))
                        .count();
                    if hits > 1 {
                        let matches = Pose::matching(accel, self);
                        return Err(ConfigError::PoseOverlap(format!(
                            "{:?} and {:?} both match {:?}",
                            matches[0], matches[1], accel
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parameters for the DTW matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Exemplars whose length differs from the candidate by more than this
    /// fraction of the exemplar length are skipped.
    pub max_length_ratio: f32,
    /// Minimum half-width of the warping band.
    pub min_band: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_length_ratio: 0.5,
            min_band: 10,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub matcher: MatcherConfig,
    /// Length of a custom-mode capture window.
    pub custom_capture_window_ms: u64,
    /// Samples per live debug batch (0 disables the stream).
    pub debug_batch_size: usize,
    /// Minimum spacing between panic alarms.
    pub panic_cooldown_ms: u64,
    /// Key identifying the device/user in the profile store.
    pub device_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            matcher: MatcherConfig::default(),
            custom_capture_window_ms: 2500,
            debug_batch_size: 10,
            panic_cooldown_ms: 3000,
            device_key: "default".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.classifier.validate()?;
        Ok(config)
    }

    /// Loads a (possibly partial) JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
