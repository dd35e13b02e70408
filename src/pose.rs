//! Static arm poses and the pose/modifier command table.
//!
//! A pose is classified from a single accelerometer reading. The pose tests
//! run in a fixed order and the first match wins; the regions are meant to
//! be disjoint, so an overlap is a configuration bug caught by
//! [`ClassifierConfig::validate`], not something resolved at runtime.

use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::types::Command;

/// Base arm/wrist orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pose {
    /// Arm raised, gravity along +x.
    ArmUp,
    /// Palm facing forward ("stop"), gravity along +y.
    PalmForward,
    /// Arm pointing down, gravity along -x.
    ArmDown,
    /// Sideways handshake orientation, gravity along -y.
    Handshake,
}

impl Pose {
    /// Fixed evaluation order.
    pub const EVALUATION_ORDER: [Pose; 4] = [Pose::ArmUp, Pose::PalmForward, Pose::ArmDown, Pose::Handshake];

    /// Classifies a reading. First match in [`Pose::EVALUATION_ORDER`] wins.
    pub fn classify(accel: [f32; 3], config: &ClassifierConfig) -> Option<Pose> {
        Self::EVALUATION_ORDER
            .iter()
            .copied()
            .find(|pose| pose.is_held(accel, config))
    }

    /// Every pose whose region contains the reading. More than one entry
    /// means the configuration overlaps.
    pub fn matching(accel: [f32; 3], config: &ClassifierConfig) -> Vec<Pose> {
        Self::EVALUATION_ORDER
            .iter()
            .copied()
            .filter(|pose| pose.is_held(accel, config))
            .collect()
    }

    /// The pose predicate.
    pub fn is_held(&self, accel: [f32; 3], config: &ClassifierConfig) -> bool {
        let [ax, ay, _] = accel;
        match self {
            Pose::ArmUp => ax > config.arm_up_min_ax,
            Pose::PalmForward => ay > config.palm_forward_min_ay && ax.abs() < config.cross_axis_limit,
            Pose::ArmDown => ax < config.arm_down_max_ax,
            Pose::Handshake => ay < config.handshake_max_ay && ax.abs() < config.cross_axis_limit,
        }
    }

    /// Whether the limb has visibly returned to neutral after this pose.
    pub fn is_neutral(&self, accel: [f32; 3], config: &ClassifierConfig) -> bool {
        let [ax, ay, _] = accel;
        match self {
            Pose::ArmUp => ax < config.neutral_arm_up_max_ax,
            Pose::PalmForward => ay < config.neutral_palm_max_ay,
            Pose::ArmDown => ax > config.neutral_arm_down_min_ax,
            Pose::Handshake => ay > config.neutral_handshake_min_ay,
        }
    }

    /// Whether holding this pose auto-fires its default command.
    pub fn auto_fires(&self) -> bool {
        matches!(self, Pose::Handshake)
    }

    /// Resolves `(pose, modifier count)` to a command.
    ///
    /// Counts beyond the table are reserved and resolve to nothing.
    pub fn command(&self, modifiers: u32) -> Option<Command> {
        match (self, modifiers) {
            (Pose::ArmUp, 0) => Some(Command::Wave),
            (Pose::ArmUp, 1) => Some(Command::Thumbsup),
            (Pose::ArmUp, 2) => Some(Command::Thanks),
            (Pose::ArmUp, 3) => Some(Command::Same),

            (Pose::PalmForward, 0) => Some(Command::Stop),
            (Pose::PalmForward, 1) => Some(Command::Wait),
            (Pose::PalmForward, 2) => Some(Command::Break),
            (Pose::PalmForward, 3) => Some(Command::LeaveAlone),

            (Pose::ArmDown, 0) => Some(Command::No),
            (Pose::ArmDown, 1) => Some(Command::SorryWait),
            (Pose::ArmDown, 2) => Some(Command::Name),
            (Pose::ArmDown, 3) => Some(Command::AskName),

            (Pose::Handshake, 0) => Some(Command::MeetPleasure),
            (Pose::Handshake, 1) => Some(Command::Nice),
            (Pose::Handshake, 2) => Some(Command::MeetVeryNice),
            (Pose::Handshake, 3) => None,

            (_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn corpus() -> Vec<[f32; 3]> {
        // Resting, raised, forward, down, sideways, and deliberately awkward
        // in-between orientations.
        let mut readings = vec![
            [0.0, 0.0, 9.8],
            [9.8, 0.0, 0.0],
            [0.0, 9.8, 0.0],
            [-9.8, 0.0, 0.0],
            [0.0, 0.0, -9.8],
            [6.6, 7.1, 0.0],
            [4.9, 7.1, 7.1],
            [-6.6, 4.9, 7.1],
            [4.9, 4.9, 7.1],
            [6.5, 7.0, 7.0],
            [-4.9, -7.1, -7.1],
            [4.9, -7.5, 0.0],
        ];
        for ax in [-10.0, -6.0, -2.0, 0.0, 2.0, 6.0, 10.0] {
            for ay in [-10.0, -6.0, -2.0, 0.0, 2.0, 6.0, 8.0, 10.0] {
                for az in [-10.0, -7.5, 0.0, 7.5, 10.0] {
                    readings.push([ax, ay, az]);
                }
            }
        }
        readings
    }

    #[test]
    fn test_pose_predicates_are_disjoint_over_corpus() {
        let config = ClassifierConfig::default();
        for accel in corpus() {
            let matches = Pose::matching(accel, &config);
            assert!(matches.len() <= 1, "{:?} matched {:?}", accel, matches);
        }
    }

    #[test]
    fn test_classify_basic_orientations() {
        let config = ClassifierConfig::default();
        assert_eq!(Pose::classify([9.5, 0.5, 0.5], &config), Some(Pose::ArmUp));
        assert_eq!(Pose::classify([0.5, 9.5, 0.5], &config), Some(Pose::PalmForward));
        assert_eq!(Pose::classify([-9.5, 0.5, 0.5], &config), Some(Pose::ArmDown));
        assert_eq!(Pose::classify([0.5, -9.5, 0.5], &config), Some(Pose::Handshake));
        assert_eq!(Pose::classify([4.0, 4.0, 4.0], &config), None);
        // Flat at rest is not a pose.
        assert_eq!(Pose::classify([0.0, 0.0, 9.8], &config), None);
    }

    #[test]
    fn test_first_match_wins_under_overlapping_config() {
        let mut config = ClassifierConfig::default();
        config.cross_axis_limit = 20.0; // deliberately broken
        let accel = [7.0, 8.0, 0.0];
        assert_eq!(Pose::matching(accel, &config), vec![Pose::ArmUp, Pose::PalmForward]);
        assert_eq!(Pose::classify(accel, &config), Some(Pose::ArmUp));
    }

    #[test]
    fn test_command_table_covers_vocabulary() {
        let mut produced = HashSet::new();
        for pose in Pose::EVALUATION_ORDER {
            for modifiers in 0..=3 {
                if let Some(command) = pose.command(modifiers) {
                    assert!(produced.insert(command), "{:?} mapped twice", command);
                }
            }
            assert_eq!(pose.command(4), None);
            assert_eq!(pose.command(u32::MAX), None);
        }
        assert_eq!(produced.len(), Command::ALL.len());
    }

    #[test]
    fn test_neutral_tests() {
        let config = ClassifierConfig::default();
        assert!(!Pose::ArmUp.is_neutral([9.0, 0.0, 0.0], &config));
        assert!(Pose::ArmUp.is_neutral([1.0, 0.0, 9.0], &config));
        assert!(Pose::ArmDown.is_neutral([0.0, 0.0, 9.0], &config));
        assert!(!Pose::Handshake.is_neutral([0.0, -9.0, 0.0], &config));
        assert!(Pose::Handshake.is_neutral([0.0, 0.0, 9.8], &config));
        assert!(Pose::PalmForward.is_neutral([0.0, 1.0, 9.0], &config));
    }

    #[test]
    fn test_only_handshake_auto_fires() {
        assert!(Pose::Handshake.auto_fires());
        assert!(!Pose::ArmUp.auto_fires());
    }
}
