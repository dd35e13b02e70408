//! Motion Gesture Engine Library
//!
//! Turns a wrist-worn IMU stream into commands from a fixed vocabulary,
//! using one of two interchangeable recognition strategies:
//!
//! - **Standard mode**: a deterministic physics state machine. Unlock with
//!   three wrist twists, hold a base pose, add 0–3 modifier twists.
//! - **Custom mode**: Dynamic Time Warping against exemplars the user
//!   recorded with the trainer, persisted per device as a motion profile.
//!
//! # Design Philosophy
//!
//! - **Confirm, never trust one sample**: every transition that matters waits
//!   out a dwell or a settle gap.
//! - **Pure core**: the classifier is a pure `transition` over an explicit
//!   state value; the engine is a thin sequential driver around it.
//! - **Wholesale profiles**: the motion profile is an immutable value that is
//!   replaced and persisted in full on every update.
//! - **Outcomes are not errors**: timeouts, empty profiles and NOISE wins are
//!   ordinary results.
//!
//! # Example
//!
//! ```ignore
//! use motion_gesture::{EngineConfig, EngineMode, GestureEngine, MemoryProfileStore, SensorEvent, SensorSet};
//!
//! let mut engine = GestureEngine::new(EngineConfig::default(), EngineMode::Standard, MemoryProfileStore::new())?;
//! engine.start(&SensorSet::full())?;
//! for output in engine.process(&SensorEvent::Accelerometer { timestamp_ms: 0, accel: [0.0, 0.0, 9.8] }) {
//!     println!("{:?}", output);
//! }
//! ```

pub mod capture;
pub mod classifier;
pub mod config;
pub mod debug_stream;
pub mod dtw;
pub mod engine;
pub mod error;
pub mod panic_monitor;
pub mod pose;
pub mod profile;
pub mod trainer;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use classifier::{transition, ClassifierState, Phase, PhysicsClassifier};
pub use config::{ClassifierConfig, EngineConfig, MatcherConfig};
pub use dtw::{calculate_dtw, match_buffer, MatchOutcome};
pub use engine::{CustomPhase, EngineMode, EngineOutput, GestureEngine, SampleSource, SensorSet};
pub use error::{ConfigError, EngineError, ProfileError, TrainingError};
pub use pose::Pose;
pub use profile::{FileProfileStore, GestureExemplar, MemoryProfileStore, MotionProfile, ProfileStore};
pub use trainer::{GestureTrainer, TrainingMode, TrainingRequest, TrainingResult, TrainingSummary};
pub use types::{Command, Feedback, MotionSample, SamplingRate, SensorEvent, SensorKind, NOISE_LABEL};
