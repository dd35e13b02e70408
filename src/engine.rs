//! Gesture engine: the single sequential entry point for sensor events.
//!
//! # Architecture
//! - One call to [`GestureEngine::process`] per sensor callback. Each event
//!   is processed to completion before the next one is accepted; nothing runs
//!   in the background.
//! - Standard mode drives the physics classifier. Custom mode runs the
//!   capture cycle (unlock gate → settle → capture → DTW match → cooldown)
//!   against the trained motion profile.
//! - Training sessions suspend recognition and route samples to the trainer.
//! - Side channels observe the stream without steering it: the panic
//!   monitor, the debug stream and the sampling-rate toggle.
//!
//! The profile used by the matcher is swapped in whenever the trainer's
//! generation moves, but never in the middle of a capture.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::RecordingBuffer;
use crate::classifier::{Phase, PhysicsClassifier, TwistCounter};
use crate::config::EngineConfig;
use crate::debug_stream::{DebugBatch, DebugStreamer};
use crate::dtw::{match_buffer, MatchOutcome};
use crate::error::{EngineError, TrainingError};
use crate::panic_monitor::PanicMonitor;
use crate::profile::{MotionProfile, ProfileStore};
use crate::trainer::{GestureTrainer, TrainingRequest, TrainingSummary};
use crate::types::{Command, Feedback, MotionSample, SamplingRate, SensorEvent, SensorKind, NOISE_LABEL};

/// Which recognition strategy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Rule-based physics classifier.
    Standard,
    /// DTW matching against trained exemplars.
    Custom,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Standard => "standard",
            EngineMode::Custom => "custom",
        }
    }

    /// Sensors this mode cannot run without.
    pub fn required_sensors(&self) -> &'static [SensorKind] {
        match self {
            EngineMode::Standard => &[SensorKind::Accelerometer, SensorKind::Gyroscope],
            EngineMode::Custom => &[SensorKind::Accelerometer],
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform sensor adapter, as seen at startup.
pub trait SampleSource {
    fn has_sensor(&self, kind: SensorKind) -> bool;
}

/// Fixed sensor availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSet {
    pub accelerometer: bool,
    pub gyroscope: bool,
}

impl SensorSet {
    pub fn full() -> Self {
        Self {
            accelerometer: true,
            gyroscope: true,
        }
    }
}

impl SampleSource for SensorSet {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Accelerometer => self.accelerometer,
            SensorKind::Gyroscope => self.gyroscope,
        }
    }
}

/// Everything the engine hands to the output emitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineOutput {
    /// A vocabulary command was recognized.
    Command { command: Command, feedback: Feedback },
    /// Haptic/audio cue with no command attached.
    Feedback(Feedback),
    /// A custom capture finished without an actionable match. `distance` is
    /// the closest exemplar's, if any was compared.
    NoMatch { distance: Option<f32> },
    /// Gross-motor alarm.
    Panic { energy: f32 },
    /// The engine wants a different sensor delivery rate.
    RateChange(SamplingRate),
    /// Raw samples for the live debug stream.
    DebugBatch(DebugBatch),
}

impl EngineOutput {
    pub fn command(&self) -> Option<Command> {
        match self {
            EngineOutput::Command { command, .. } => Some(*command),
            _ => None,
        }
    }
}

/// Stage of the custom-mode capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomPhase {
    /// Counting unlock twists.
    Locked,
    /// Unlock dwell before the capture opens.
    Settling,
    /// Recording into the capture buffer.
    Capturing,
    /// Absorbing motion after a match attempt.
    Cooldown,
}

#[derive(Debug, Clone)]
struct CustomCycle {
    phase: CustomPhase,
    entered_ms: u64,
    twists: TwistCounter,
}

impl CustomCycle {
    fn new() -> Self {
        Self {
            phase: CustomPhase::Locked,
            entered_ms: 0,
            twists: TwistCounter::default(),
        }
    }

    fn enter(&mut self, phase: CustomPhase, now_ms: u64) {
        debug!(from = ?self.phase, to = ?phase, "custom cycle");
        self.phase = phase;
        self.entered_ms = now_ms;
    }

    fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }
}

/// The recognition engine for one device.
pub struct GestureEngine<S: ProfileStore> {
    config: EngineConfig,
    mode: EngineMode,
    started: bool,

    classifier: PhysicsClassifier,
    custom: CustomCycle,
    capture: RecordingBuffer,

    trainer: GestureTrainer<S>,
    profile: MotionProfile,
    profile_generation: u64,

    panic: PanicMonitor,
    debug_stream: DebugStreamer,
    rate: SamplingRate,
    gyro: [f32; 3],
}

impl<S: ProfileStore> GestureEngine<S> {
    /// Builds an engine and loads the device's profile from `store`.
    pub fn new(config: EngineConfig, mode: EngineMode, store: S) -> Result<Self, EngineError> {
        let trainer = GestureTrainer::new(store, config.device_key.clone())?;
        let profile = trainer.profile().clone();
        Ok(Self {
            classifier: PhysicsClassifier::new(config.classifier.clone()),
            custom: CustomCycle::new(),
            capture: RecordingBuffer::new(),
            profile_generation: trainer.generation(),
            panic: PanicMonitor::new(profile.panic_threshold(), config.panic_cooldown_ms),
            debug_stream: DebugStreamer::new(&config.device_key, config.debug_batch_size),
            rate: SamplingRate::Low,
            gyro: [0.0; 3],
            trainer,
            profile,
            config,
            mode,
            started: false,
        })
    }

    /// Checks the sensors this mode needs. Must succeed before events are
    /// processed; returns the initial sampling rate.
    pub fn start(&mut self, source: &dyn SampleSource) -> Result<SamplingRate, EngineError> {
        for &kind in self.mode.required_sensors() {
            if !source.has_sensor(kind) {
                warn!(mode = %self.mode, sensor = %kind, "required sensor unavailable");
                return Err(EngineError::SensorUnavailable(kind));
            }
        }
        self.started = true;
        info!(mode = %self.mode, device = %self.config.device_key, exemplars = self.profile.exemplars().len(), "engine started");
        Ok(self.rate)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classifier phase (standard mode).
    pub fn phase(&self) -> Phase {
        self.classifier.phase()
    }

    /// Capture cycle stage (custom mode).
    pub fn custom_phase(&self) -> CustomPhase {
        self.custom.phase
    }

    pub fn rate(&self) -> SamplingRate {
        self.rate
    }

    /// Profile the matcher currently uses.
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    pub fn trainer(&self) -> &GestureTrainer<S> {
        &self.trainer
    }

    /// Direct trainer access (listeners, sensitivity, label maintenance).
    /// Changes reach the matcher before its next capture.
    pub fn trainer_mut(&mut self) -> &mut GestureTrainer<S> {
        &mut self.trainer
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    pub fn is_training(&self) -> bool {
        self.trainer.is_recording()
    }

    /// Processes one sensor event to completion.
    pub fn process(&mut self, event: &SensorEvent) -> Vec<EngineOutput> {
        let mut outputs = Vec::new();
        if !self.started {
            debug!("event dropped: engine not started");
            return outputs;
        }

        let now_ms = event.timestamp_ms();
        let sample = match *event {
            SensorEvent::Gyroscope { gyro, .. } => {
                self.gyro = gyro;
                if self.mode == EngineMode::Standard && !self.trainer.is_recording() {
                    self.classifier.process(event);
                }
                return outputs;
            }
            SensorEvent::Accelerometer { timestamp_ms, accel } => MotionSample::new(timestamp_ms, accel, self.gyro),
            SensorEvent::Sample(sample) => {
                self.gyro = sample.gyro();
                sample
            }
        };

        if let Some(batch) = self.debug_stream.push(sample) {
            outputs.push(EngineOutput::DebugBatch(batch));
        }

        if self.trainer.is_recording() {
            if let Err(e) = self.trainer.record(sample) {
                warn!(error = %e, "training sample dropped");
            }
        } else {
            self.sync_profile();
            if let Some(energy) = self.panic.observe(&sample) {
                outputs.push(EngineOutput::Panic { energy });
            }
            match self.mode {
                EngineMode::Standard => self.step_standard(event, &mut outputs),
                EngineMode::Custom => self.step_custom(sample, now_ms, &mut outputs),
            }
        }

        self.update_rate(&mut outputs);
        outputs
    }

    /// Opens a custom capture immediately, skipping the unlock gate.
    pub fn begin_capture(&mut self, now_ms: u64) -> Result<Vec<EngineOutput>, EngineError> {
        self.require_mode(EngineMode::Custom)?;
        if self.trainer.is_recording() {
            return Err(TrainingError::SessionActive.into());
        }
        self.sync_profile();
        self.capture.begin(now_ms);
        self.custom.twists.reset();
        self.custom.enter(CustomPhase::Capturing, now_ms);

        let mut outputs = vec![EngineOutput::Feedback(Feedback::Recording)];
        self.update_rate(&mut outputs);
        Ok(outputs)
    }

    /// Closes the open custom capture and matches it.
    pub fn end_capture(&mut self, now_ms: u64) -> Result<Vec<EngineOutput>, EngineError> {
        self.require_mode(EngineMode::Custom)?;
        if !self.capture.is_active() {
            return Err(EngineError::CaptureInactive);
        }
        let mut outputs = vec![self.finish_capture(now_ms)];
        self.update_rate(&mut outputs);
        Ok(outputs)
    }

    /// Starts a training session. Recognition is suspended until it ends.
    ///
    /// A malformed request is rejected before any state changes.
    pub fn start_training(&mut self, request: &TrainingRequest, now_ms: u64) -> Result<Vec<EngineOutput>, EngineError> {
        let feedback = self.trainer.start(request, now_ms)?;
        self.reset_recognition();
        let mut outputs = vec![EngineOutput::Feedback(feedback)];
        self.update_rate(&mut outputs);
        Ok(outputs)
    }

    /// Ends the training session, persists the profile and swaps it in.
    ///
    /// The caller plays [`Feedback::Saved`] on success.
    pub fn finish_training(&mut self, now_ms: u64) -> Result<TrainingSummary, EngineError> {
        let summary = self.trainer.finish(now_ms)?;
        self.sync_profile();
        Ok(summary)
    }

    /// Abandons the training session, if any.
    pub fn cancel_training(&mut self) -> bool {
        self.trainer.cancel()
    }

    /// Manual abort: back to the initial state with every counter and buffer
    /// cleared, including samples waiting in the debug stream. The next event
    /// starts from scratch.
    pub fn reset(&mut self) {
        self.reset_recognition();
        self.trainer.cancel();
        self.panic.reset();
        self.debug_stream.discard();
        info!("engine reset");
    }

    /// Emits any partial debug batch.
    pub fn flush_debug(&mut self) -> Option<DebugBatch> {
        self.debug_stream.flush()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_mode(&self, expected: EngineMode) -> Result<(), EngineError> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(EngineError::WrongMode {
                expected: expected.as_str(),
                actual: self.mode.as_str(),
            })
        }
    }

    fn reset_recognition(&mut self) {
        self.classifier.reset();
        self.custom = CustomCycle::new();
        self.capture.clear();
    }

    fn sync_profile(&mut self) {
        let generation = self.trainer.generation();
        if generation == self.profile_generation || self.capture.is_active() {
            return;
        }
        self.profile = self.trainer.profile().clone();
        self.profile_generation = generation;
        self.panic.set_threshold(self.profile.panic_threshold());
        debug!(
            generation,
            exemplars = self.profile.exemplars().len(),
            sensitivity = self.profile.sensitivity(),
            "matcher profile reloaded"
        );
    }

    fn step_standard(&mut self, event: &SensorEvent, outputs: &mut Vec<EngineOutput>) {
        let before = self.classifier.phase();
        let command = self.classifier.process(event);
        let after = self.classifier.phase();

        match (before, after) {
            (Phase::Idle, Phase::GateUnlock) => outputs.push(EngineOutput::Feedback(Feedback::Unlocked)),
            (Phase::Listening, Phase::GatePose | Phase::HandshakeHold) => {
                outputs.push(EngineOutput::Feedback(Feedback::PoseDetected))
            }
            _ => {}
        }
        if let Some(command) = command {
            outputs.push(EngineOutput::Command {
                command,
                feedback: Feedback::CommandSent,
            });
        }
    }

    fn step_custom(&mut self, sample: MotionSample, now_ms: u64, outputs: &mut Vec<EngineOutput>) {
        let unlock_dwell_ms = self.config.classifier.unlock_dwell_ms;
        let cooldown_ms = self.config.classifier.cooldown_ms;
        match self.custom.phase {
            CustomPhase::Locked => {
                if self.custom.twists.observe(sample.accel(), now_ms, &self.config.classifier) {
                    info!(at_ms = now_ms, "custom gate unlocked");
                    self.custom.twists.reset();
                    self.custom.enter(CustomPhase::Settling, now_ms);
                    outputs.push(EngineOutput::Feedback(Feedback::Unlocked));
                }
            }
            CustomPhase::Settling => {
                if self.custom.elapsed(now_ms) >= unlock_dwell_ms {
                    self.sync_profile();
                    self.capture.begin(now_ms);
                    self.capture.push(sample);
                    self.custom.enter(CustomPhase::Capturing, now_ms);
                    outputs.push(EngineOutput::Feedback(Feedback::Recording));
                }
            }
            CustomPhase::Capturing => {
                self.capture.push(sample);
                if self.capture.elapsed_ms(now_ms) >= self.config.custom_capture_window_ms {
                    outputs.push(self.finish_capture(now_ms));
                }
            }
            CustomPhase::Cooldown => {
                if self.custom.elapsed(now_ms) >= cooldown_ms {
                    self.custom.enter(CustomPhase::Locked, now_ms);
                }
            }
        }
    }

    fn finish_capture(&mut self, now_ms: u64) -> EngineOutput {
        let samples = self.capture.take();
        let outcome = match_buffer(&samples, &self.profile, &self.config.matcher);
        self.custom.enter(CustomPhase::Cooldown, now_ms);

        match outcome {
            MatchOutcome::Matched { id, distance } if id == NOISE_LABEL => {
                debug!(distance, "capture matched noise");
                EngineOutput::NoMatch { distance: Some(distance) }
            }
            MatchOutcome::Matched { id, distance } => match Command::from_id(&id) {
                Some(command) => {
                    info!(%command, distance, samples = samples.len(), "custom gesture matched");
                    EngineOutput::Command {
                        command,
                        feedback: Feedback::CommandSent,
                    }
                }
                None => {
                    warn!(%id, distance, "exemplar id outside the command vocabulary");
                    EngineOutput::NoMatch { distance: Some(distance) }
                }
            },
            MatchOutcome::NoMatch { best } => {
                debug!(best = ?best, samples = samples.len(), "capture not matched");
                EngineOutput::NoMatch {
                    distance: best.map(|(_, d)| d),
                }
            }
        }
    }

    fn desired_rate(&self) -> SamplingRate {
        let idle = match self.mode {
            EngineMode::Standard => self.classifier.phase() == Phase::Idle,
            EngineMode::Custom => self.custom.phase == CustomPhase::Locked,
        };
        if idle && !self.capture.is_active() && !self.trainer.is_recording() {
            SamplingRate::Low
        } else {
            SamplingRate::High
        }
    }

    fn update_rate(&mut self, outputs: &mut Vec<EngineOutput>) {
        let desired = self.desired_rate();
        if desired != self.rate {
            debug!(from = ?self.rate, to = ?desired, hz = desired.nominal_hz(), "sampling rate change");
            self.rate = desired;
            outputs.push(EngineOutput::RateChange(desired));
        }
    }
}

impl<S: ProfileStore + fmt::Debug> fmt::Debug for GestureEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureEngine")
            .field("mode", &self.mode)
            .field("started", &self.started)
            .field("phase", &self.classifier.phase())
            .field("custom_phase", &self.custom.phase)
            .field("rate", &self.rate)
            .field("profile_generation", &self.profile_generation)
            .field("trainer", &self.trainer)
            .finish()
    }
}
