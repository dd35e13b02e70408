//! Error types for the gesture engine.
//!
//! Only genuine faults are errors. Timeouts, an empty profile, and a winning
//! NOISE exemplar are ordinary outcomes and never surface here.

use std::io;

use thiserror::Error;

use crate::profile::MotionProfile;
use crate::trainer::TrainingMode;
use crate::types::SensorKind;

/// Configuration could not be loaded or is self-contradictory.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("pose regions overlap: {0}")]
    PoseOverlap(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Motion profile storage failures.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("profile serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sensitivity must be a positive finite number, got {0}")]
    InvalidSensitivity(f32),
    #[error("panic threshold must be finite, got {0}")]
    InvalidPanicThreshold(f32),
    #[error("exemplar {id:?} sample {index} has a non-finite axis")]
    NonFiniteSample { id: String, index: usize },
}

/// Training request and session failures.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("{0:?} training requires a label")]
    MissingLabel(TrainingMode),
    #[error("label {0:?} is not in the command vocabulary")]
    UnknownLabel(String),
    #[error("a training session is already recording")]
    SessionActive,
    #[error("no training session is recording")]
    NoSession,
    #[error("capture finished without any samples")]
    EmptyCapture,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    /// The in-memory profile was updated but could not be written. The
    /// updated profile is carried so the caller can retry persistence; until
    /// then durable and in-memory state have diverged.
    #[error("profile updated in memory but not persisted: {source}")]
    Persist {
        #[source]
        source: ProfileError,
        retained: Box<MotionProfile>,
    },
}

/// Top-level engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("required sensor unavailable: {0}")]
    SensorUnavailable(SensorKind),
    #[error("engine is in {actual} mode, operation requires {expected} mode")]
    WrongMode {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("no capture is active")]
    CaptureInactive,
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
