//! Core data types for the motion gesture engine.
//!
//! This module defines the values that flow between the sensor adapter, the
//! physics classifier, the DTW matcher and the trainer. Both recognition
//! strategies consume the same `MotionSample` stream and produce values from
//! the same closed `Command` vocabulary.
//!
//! Design principle: if a concept crosses a module boundary it gets a type.
//! Raw tuples and free-form strings stop at the edges (JSON and the CLI).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for negative ("noise") exemplars.
///
/// The matcher treats it like any other label; the engine maps a NOISE win
/// to "no actionable command".
pub const NOISE_LABEL: &str = "NOISE";

/// A single six-axis inertial sample.
///
/// This is the input contract shared by every component: three-axis
/// accelerometer, three-axis gyroscope and a monotonic timestamp. Samples are
/// immutable once created.
///
/// The field names double as the persisted JSON layout
/// (`{"t":..,"ax":..,"ay":..,"az":..,"gx":..,"gy":..,"gz":..}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Monotonic timestamp in milliseconds.
    pub t: u64,
    /// Accelerometer x (m/s²).
    pub ax: f32,
    /// Accelerometer y (m/s²).
    pub ay: f32,
    /// Accelerometer z (m/s²).
    pub az: f32,
    /// Gyroscope x (rad/s).
    #[serde(default)]
    pub gx: f32,
    /// Gyroscope y (rad/s).
    #[serde(default)]
    pub gy: f32,
    /// Gyroscope z (rad/s).
    #[serde(default)]
    pub gz: f32,
}

impl MotionSample {
    /// Creates a sample from accelerometer and gyroscope triples.
    pub fn new(t: u64, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            t,
            ax: accel[0],
            ay: accel[1],
            az: accel[2],
            gx: gyro[0],
            gy: gyro[1],
            gz: gyro[2],
        }
    }

    /// Creates an accelerometer-only sample (gyroscope axes zeroed).
    ///
    /// Training captures record this shape.
    pub fn accel_only(t: u64, accel: [f32; 3]) -> Self {
        Self::new(t, accel, [0.0; 3])
    }

    /// Accelerometer triple.
    pub fn accel(&self) -> [f32; 3] {
        [self.ax, self.ay, self.az]
    }

    /// Gyroscope triple.
    pub fn gyro(&self) -> [f32; 3] {
        [self.gx, self.gy, self.gz]
    }

    /// Gross-motor energy: `|ax| + |ay| + |az|`.
    pub fn energy(&self) -> f32 {
        self.ax.abs() + self.ay.abs() + self.az.abs()
    }

    /// Euclidean distance over the accelerometer axes only.
    ///
    /// Gyroscope axes are ignored so rotation-rate noise does not dominate
    /// template matching.
    pub fn accel_distance(&self, other: &MotionSample) -> f32 {
        let dx = self.ax - other.ax;
        let dy = self.ay - other.ay;
        let dz = self.az - other.az;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether every axis holds a finite reading.
    pub fn is_finite(&self) -> bool {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Which physical sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Accelerometer => f.write_str("accelerometer"),
            SensorKind::Gyroscope => f.write_str("gyroscope"),
        }
    }
}

/// One sensor callback as delivered by the platform adapter.
///
/// Accelerometer and gyroscope readings may arrive as separate events. Only
/// accelerometer-bearing events drive state transitions; gyroscope events
/// refresh a cached rotation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Accelerometer reading (m/s²).
    Accelerometer { timestamp_ms: u64, accel: [f32; 3] },
    /// Gyroscope reading (rad/s).
    Gyroscope { timestamp_ms: u64, gyro: [f32; 3] },
    /// Fused six-axis sample. Updates the gyro cache, then drives a transition.
    Sample(MotionSample),
}

impl SensorEvent {
    /// Monotonic timestamp of this event in milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            SensorEvent::Accelerometer { timestamp_ms, .. } => *timestamp_ms,
            SensorEvent::Gyroscope { timestamp_ms, .. } => *timestamp_ms,
            SensorEvent::Sample(sample) => sample.t,
        }
    }

    /// Returns true if this event carries accelerometer data.
    pub fn drives_transition(&self) -> bool {
        !matches!(self, SensorEvent::Gyroscope { .. })
    }
}

impl From<MotionSample> for SensorEvent {
    fn from(sample: MotionSample) -> Self {
        SensorEvent::Sample(sample)
    }
}

/// The fixed command vocabulary shared by both recognition strategies.
///
/// External systems map these identifiers to phrases. Nothing outside this
/// set may leave the engine as a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Wave,
    Thumbsup,
    Stop,
    No,
    Wait,
    Break,
    LeaveAlone,
    Name,
    AskName,
    Nice,
    MeetVeryNice,
    SorryWait,
    MeetPleasure,
    Thanks,
    Same,
}

impl Command {
    /// Every command, in vocabulary order.
    pub const ALL: [Command; 15] = [
        Command::Wave,
        Command::Thumbsup,
        Command::Stop,
        Command::No,
        Command::Wait,
        Command::Break,
        Command::LeaveAlone,
        Command::Name,
        Command::AskName,
        Command::Nice,
        Command::MeetVeryNice,
        Command::SorryWait,
        Command::MeetPleasure,
        Command::Thanks,
        Command::Same,
    ];

    /// Stable wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Wave => "wave",
            Command::Thumbsup => "thumbsup",
            Command::Stop => "stop",
            Command::No => "no",
            Command::Wait => "wait",
            Command::Break => "break",
            Command::LeaveAlone => "leave_alone",
            Command::Name => "name",
            Command::AskName => "ask_name",
            Command::Nice => "nice",
            Command::MeetVeryNice => "meet_very_nice",
            Command::SorryWait => "sorry_wait",
            Command::MeetPleasure => "meet_pleasure",
            Command::Thanks => "thanks",
            Command::Same => "same",
        }
    }

    /// Looks up a vocabulary identifier. Returns `None` for anything outside
    /// the vocabulary, including [`NOISE_LABEL`].
    pub fn from_id(id: &str) -> Option<Command> {
        Command::ALL.iter().copied().find(|c| c.as_str() == id)
    }

    /// Message path used by the off-device transport.
    pub fn message_path(&self) -> String {
        format!("/gesture/{}", self.as_str())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Haptic/audio feedback class handed to the output emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// Gate unlocked; the engine is now listening.
    Unlocked,
    /// A base pose was recognized.
    PoseDetected,
    /// A command was resolved and sent.
    CommandSent,
    /// A training capture started.
    Recording,
    /// A training capture was saved.
    Saved,
}

impl Feedback {
    /// Vibration pulse pattern in milliseconds.
    pub fn pulses_ms(&self) -> &'static [u64] {
        match self {
            Feedback::Unlocked => &[100],
            Feedback::PoseDetected => &[50],
            Feedback::CommandSent => &[300],
            Feedback::Recording => &[200],
            Feedback::Saved => &[50, 50],
        }
    }
}

/// Requested sensor delivery rate.
///
/// The engine lowers the rate while locked and raises it once activity
/// begins, so the sensor adapter only needs a two-position toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingRate {
    /// Locked/idle: enough to see an unlock twist.
    Low,
    /// Active recognition or capture.
    High,
}

impl SamplingRate {
    /// Nominal delivery rate in Hz.
    pub fn nominal_hz(&self) -> f32 {
        match self {
            SamplingRate::Low => 16.0,
            SamplingRate::High => 50.0,
        }
    }
}
