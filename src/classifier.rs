//! Physics state machine for rule-based gesture recognition.
//!
//! The classifier turns a stream of sensor events into vocabulary commands
//! using fixed axis thresholds and timing windows:
//!
//! ```text
//! IDLE ──3 twists──▶ GATE_UNLOCK ──dwell──▶ LISTENING ──pose──▶ GATE_POSE ──dwell──▶ EVALUATING
//!                                              │                    ▲                  │
//!                                              └─handshake─▶ HANDSHAKE_HOLD ─spike─┘   │
//!                                                                   │ hold            │ resolve
//!                                                                   ▼                  ▼
//!                                                  COOLDOWN / CHAINING_WAIT ◀── command fired
//! ```
//!
//! # Architecture
//! - Every transition that matters is confirmed by a dwell or a settle gap,
//!   never by a single sample.
//! - [`transition`] is a pure function of `(state, event, clock)`, so every
//!   path is testable without a live sensor. [`PhysicsClassifier`] is the
//!   thin stateful wrapper the engine drives.
//! - The clock is read once per event. There are no background timers; a gap
//!   in sensor delivery only delays a pending timeout.
//! - Gyroscope events refresh a cached rotation vector and never drive a
//!   transition on their own.

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::ClassifierConfig;
use crate::pose::Pose;
use crate::types::{Command, SensorEvent};

/// State-machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Locked; counting unlock twists.
    Idle,
    /// Unlocked; waiting for the unlock twist to settle.
    GateUnlock,
    /// Waiting for a base pose.
    Listening,
    /// Pose detected; waiting for it to settle.
    GatePose,
    /// Handshake pose held; auto-fires if held long enough.
    HandshakeHold,
    /// Counting modifiers while the pose is held.
    Evaluating,
    /// A command fired; absorbing motion noise.
    Cooldown,
    /// Conversation mode: waiting for the limb to return to neutral.
    ChainingWait,
}

impl Phase {
    /// Stable lowercase name for logs and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::GateUnlock => "gate_unlock",
            Phase::Listening => "listening",
            Phase::GatePose => "gate_pose",
            Phase::HandshakeHold => "handshake_hold",
            Phase::Evaluating => "evaluating",
            Phase::Cooldown => "cooldown",
            Phase::ChainingWait => "chaining_wait",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debounced counter for large single-axis accelerometer swings.
///
/// A twist is a change in `ay` larger than the configured delta between two
/// consecutive readings. The counter resets after an inactivity gap, and a
/// hanging arm (large resting `|ax|`) suppresses counting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwistCounter {
    count: u32,
    last_twist_ms: u64,
    last_ay: Option<f32>,
}

impl TwistCounter {
    /// Feeds one reading. Returns true once the required twist count is reached.
    pub fn observe(&mut self, accel: [f32; 3], now_ms: u64, config: &ClassifierConfig) -> bool {
        let [ax, ay, _] = accel;

        if now_ms.saturating_sub(self.last_twist_ms) > config.twist_timeout_ms {
            self.count = 0;
        }

        if ax.abs() > config.hang_axis_limit {
            self.count = 0;
            self.last_ay = None;
            return false;
        }

        if let Some(last_ay) = self.last_ay {
            if (ay - last_ay).abs() > config.unlock_twist_delta {
                self.count += 1;
                self.last_twist_ms = now_ms;
                debug!(count = self.count, "unlock twist");
            }
        }
        self.last_ay = Some(ay);

        self.count >= config.unlock_twist_count
    }

    /// Twists counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Rising-edge counter for modifier twists on the dominant gyroscope axis.
///
/// One physical twist counts once: after a count the detector stays disarmed
/// until the rotation rate drops below the re-arm threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierCounter {
    count: u32,
    last_modifier_ms: Option<u64>,
    armed: bool,
}

impl Default for ModifierCounter {
    fn default() -> Self {
        Self {
            count: 0,
            last_modifier_ms: None,
            armed: true,
        }
    }
}

impl ModifierCounter {
    /// Feeds the cached gyroscope vector. Returns true if a new modifier was counted.
    pub fn observe(&mut self, gyro: [f32; 3], now_ms: u64, config: &ClassifierConfig) -> bool {
        let dominant = gyro.iter().fold(0.0_f32, |acc, g| acc.max(g.abs()));

        if self.armed && dominant > config.modifier_gyro_threshold {
            self.armed = false;
            self.count += 1;
            self.last_modifier_ms = Some(now_ms);
            return true;
        }
        if !self.armed && dominant < config.modifier_rearm_threshold {
            self.armed = true;
        }
        false
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_modifier_ms(&self) -> Option<u64> {
        self.last_modifier_ms
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Complete classifier state. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierState {
    /// Current phase.
    pub phase: Phase,
    /// Clock reading when the current phase was entered.
    pub entered_ms: u64,
    /// Pose detected for the current sequence.
    pub pose: Option<Pose>,
    /// Unlock twist counter (IDLE).
    pub twists: TwistCounter,
    /// Modifier counter (EVALUATING).
    pub modifiers: ModifierCounter,
    /// Running maximum of `ax` for the current sequence.
    pub max_ax: f32,
    /// When LISTENING was entered from an unlock or a chain reset.
    pub listening_since_ms: u64,
    /// Start of the current uninterrupted pose hold in EVALUATING.
    pub pose_held_since_ms: Option<u64>,
    /// Most recent gyroscope reading.
    pub gyro: [f32; 3],
    /// Clock reading of the last event, for regression detection.
    pub last_event_ms: Option<u64>,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self::initial()
    }
}

impl ClassifierState {
    /// Locked state with every counter cleared.
    pub fn initial() -> Self {
        Self {
            phase: Phase::Idle,
            entered_ms: 0,
            pose: None,
            twists: TwistCounter::default(),
            modifiers: ModifierCounter::default(),
            max_ax: f32::MIN,
            listening_since_ms: 0,
            pose_held_since_ms: None,
            gyro: [0.0; 3],
            last_event_ms: None,
        }
    }

    /// Manual abort: back to IDLE with all counters cleared.
    ///
    /// The gyroscope cache is a sensor reading, not a counter, and survives.
    pub fn reset(&mut self) {
        let gyro = self.gyro;
        let last_event_ms = self.last_event_ms;
        *self = Self::initial();
        self.gyro = gyro;
        self.last_event_ms = last_event_ms;
    }

    fn enter(&mut self, phase: Phase, now_ms: u64) {
        debug!(from = %self.phase, to = %phase, at_ms = now_ms, "phase change");
        self.phase = phase;
        self.entered_ms = now_ms;
    }

    fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }

    fn back_to_idle(&mut self, now_ms: u64) {
        self.enter(Phase::Idle, now_ms);
        self.clear_sequence();
        self.twists.reset();
    }

    fn clear_sequence(&mut self) {
        self.pose = None;
        self.modifiers.reset();
        self.max_ax = f32::MIN;
        self.pose_held_since_ms = None;
    }
}

/// Advances the state machine by one event.
///
/// Returns the new state and the command fired by this event, if any.
pub fn transition(
    mut state: ClassifierState,
    event: &SensorEvent,
    now_ms: u64,
    config: &ClassifierConfig,
) -> (ClassifierState, Option<Command>) {
    if let Some(last) = state.last_event_ms {
        if now_ms < last {
            warn!(now_ms, last_ms = last, "clock went backwards; timing windows saturate");
        }
    }
    state.last_event_ms = Some(now_ms);

    let accel = match *event {
        SensorEvent::Gyroscope { gyro, .. } => {
            state.gyro = gyro;
            return (state, None);
        }
        SensorEvent::Accelerometer { accel, .. } => accel,
        SensorEvent::Sample(sample) => {
            state.gyro = sample.gyro();
            sample.accel()
        }
    };

    let command = step(&mut state, accel, now_ms, config);
    (state, command)
}

fn step(state: &mut ClassifierState, accel: [f32; 3], now_ms: u64, config: &ClassifierConfig) -> Option<Command> {
    let [ax, _, az] = accel;

    match state.phase {
        Phase::Idle => {
            if state.twists.observe(accel, now_ms, config) {
                info!(at_ms = now_ms, "gate unlocked");
                state.twists.reset();
                state.enter(Phase::GateUnlock, now_ms);
            }
            None
        }

        Phase::GateUnlock => {
            if state.elapsed(now_ms) >= config.unlock_dwell_ms {
                state.enter(Phase::Listening, now_ms);
                state.listening_since_ms = now_ms;
            }
            None
        }

        Phase::Listening => {
            if now_ms.saturating_sub(state.listening_since_ms) > config.listening_window_ms {
                debug!("listening window expired");
                state.back_to_idle(now_ms);
                return None;
            }
            if let Some(pose) = Pose::classify(accel, config) {
                debug!(?pose, "pose detected");
                state.pose = Some(pose);
                state.max_ax = ax;
                if pose.auto_fires() {
                    state.enter(Phase::HandshakeHold, now_ms);
                } else {
                    state.enter(Phase::GatePose, now_ms);
                }
            }
            None
        }

        Phase::GatePose => {
            state.max_ax = state.max_ax.max(ax);
            if state.elapsed(now_ms) < config.pose_dwell_ms {
                return None;
            }
            match state.pose {
                Some(pose) if pose.is_held(accel, config) => {
                    state.modifiers.reset();
                    state.pose_held_since_ms = Some(now_ms);
                    state.enter(Phase::Evaluating, now_ms);
                }
                _ => {
                    debug!("pose lost during settle");
                    state.clear_sequence();
                    state.enter(Phase::Listening, now_ms);
                }
            }
            None
        }

        Phase::HandshakeHold => {
            state.max_ax = state.max_ax.max(ax);
            if az.abs() > config.handshake_interrupt_az {
                debug!(az, "handshake hold interrupted");
                state.pose = Some(Pose::Handshake);
                state.enter(Phase::GatePose, now_ms);
                return None;
            }
            if !Pose::Handshake.is_held(accel, config) {
                state.clear_sequence();
                state.enter(Phase::Listening, now_ms);
                return None;
            }
            if state.elapsed(now_ms) >= config.handshake_hold_ms {
                return Pose::Handshake
                    .command(0)
                    .map(|command| fire(state, command, now_ms, config));
            }
            None
        }

        Phase::Evaluating => {
            if state.elapsed(now_ms) > config.evaluation_window_ms {
                debug!(modifiers = state.modifiers.count(), "evaluation window expired");
                state.back_to_idle(now_ms);
                return None;
            }
            state.max_ax = state.max_ax.max(ax);

            let Some(pose) = state.pose else {
                state.back_to_idle(now_ms);
                return None;
            };

            let gyro = state.gyro;
            if state.modifiers.observe(gyro, now_ms, config) {
                debug!(count = state.modifiers.count(), ?pose, "modifier twist");
            }

            if !pose.is_held(accel, config) {
                state.pose_held_since_ms = None;
                return None;
            }
            let held_since = *state.pose_held_since_ms.get_or_insert(now_ms);

            let last_modifier = state.modifiers.last_modifier_ms();
            let anchor = held_since.max(last_modifier.unwrap_or(0));
            let held_long_enough = now_ms.saturating_sub(anchor) >= config.evaluation_min_hold_ms;
            let settled = last_modifier
                .map_or(true, |t| now_ms.saturating_sub(t) >= config.modifier_settle_ms);

            if held_long_enough && settled {
                if let Some(command) = pose.command(state.modifiers.count()) {
                    return Some(fire(state, command, now_ms, config));
                }
            }
            None
        }

        Phase::Cooldown => {
            if state.elapsed(now_ms) >= config.cooldown_ms {
                state.back_to_idle(now_ms);
            }
            None
        }

        Phase::ChainingWait => {
            if state.elapsed(now_ms) > config.chaining_window_ms {
                debug!("chaining window expired");
                state.back_to_idle(now_ms);
                return None;
            }
            let neutral = state.pose.map_or(true, |pose| pose.is_neutral(accel, config));
            if neutral {
                state.clear_sequence();
                state.listening_since_ms = now_ms;
                state.enter(Phase::Listening, now_ms);
            }
            None
        }
    }
}

fn fire(state: &mut ClassifierState, command: Command, now_ms: u64, config: &ClassifierConfig) -> Command {
    info!(
        %command,
        pose = ?state.pose,
        modifiers = state.modifiers.count(),
        max_ax = state.max_ax,
        "command fired"
    );
    state.modifiers.reset();
    state.pose_held_since_ms = None;
    if config.conversation_mode {
        // Keep the pose: its neutral test decides when to listen again.
        state.enter(Phase::ChainingWait, now_ms);
    } else {
        state.pose = None;
        state.max_ax = f32::MIN;
        state.enter(Phase::Cooldown, now_ms);
    }
    command
}

/// Stateful wrapper around [`transition`].
#[derive(Debug, Clone)]
pub struct PhysicsClassifier {
    config: ClassifierConfig,
    state: ClassifierState,
}

impl PhysicsClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: ClassifierState::initial(),
        }
    }

    /// Processes one event using its own timestamp as the clock.
    pub fn process(&mut self, event: &SensorEvent) -> Option<Command> {
        self.process_at(event, event.timestamp_ms())
    }

    /// Processes one event against an explicit clock reading.
    pub fn process_at(&mut self, event: &SensorEvent, now_ms: u64) -> Option<Command> {
        let state = std::mem::take(&mut self.state);
        let (next, command) = transition(state, event, now_ms, &self.config);
        self.state = next;
        command
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Manual abort.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
