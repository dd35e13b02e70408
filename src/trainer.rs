//! Training sessions that grow the motion profile.
//!
//! # Architecture
//! - A `TrainingRequest` is validated before anything is recorded, so a bad
//!   request never leaves a half-open session behind.
//! - All three modes share one capture primitive (`RecordingBuffer`). The
//!   caller ends the capture; gesture length is not known in advance.
//! - Finalizers are mode specific:
//!   - GESTURE appends `(label, samples)`.
//!   - NOISE appends `("NOISE", samples)`.
//!   - GROSS_MOTOR stores no samples and overwrites the panic threshold with
//!     the window's peak energy.
//! - The updated profile is persisted in full before `finish` returns. Only
//!   a durable profile bumps the generation and reaches listeners.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::RecordingBuffer;
use crate::error::{ProfileError, TrainingError};
use crate::profile::{GestureExemplar, MotionProfile, ProfileStore};
use crate::types::{Command, Feedback, MotionSample, NOISE_LABEL};

/// What a training capture produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingMode {
    /// A positive exemplar for a vocabulary command.
    Gesture,
    /// A negative exemplar that suppresses false triggers.
    Noise,
    /// Calibrates the panic threshold from peak energy.
    GrossMotor,
}

impl TrainingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingMode::Gesture => "GESTURE",
            TrainingMode::Noise => "NOISE",
            TrainingMode::GrossMotor => "GROSS_MOTOR",
        }
    }
}

impl fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request from the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub mode: TrainingMode,
    /// Required for GESTURE and NOISE, ignored for GROSS_MOTOR.
    #[serde(default)]
    pub label: Option<String>,
}

impl TrainingRequest {
    pub fn gesture(label: impl Into<String>) -> Self {
        Self {
            mode: TrainingMode::Gesture,
            label: Some(label.into()),
        }
    }

    pub fn noise(label: impl Into<String>) -> Self {
        Self {
            mode: TrainingMode::Noise,
            label: Some(label.into()),
        }
    }

    pub fn gross_motor() -> Self {
        Self {
            mode: TrainingMode::GrossMotor,
            label: None,
        }
    }

    /// Resolves the exemplar id this request will store.
    ///
    /// Returns `None` for GROSS_MOTOR, which stores no exemplar.
    pub fn exemplar_id(&self) -> Result<Option<String>, TrainingError> {
        let label = self.label.as_deref().map(str::trim).filter(|l| !l.is_empty());
        match self.mode {
            TrainingMode::GrossMotor => Ok(None),
            TrainingMode::Gesture => {
                let label = label.ok_or(TrainingError::MissingLabel(self.mode))?;
                match Command::from_id(label) {
                    Some(command) => Ok(Some(command.as_str().to_string())),
                    None => Err(TrainingError::UnknownLabel(label.to_string())),
                }
            }
            TrainingMode::Noise => {
                label.ok_or(TrainingError::MissingLabel(self.mode))?;
                Ok(Some(NOISE_LABEL.to_string()))
            }
        }
    }
}

/// What a successful session changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub mode: TrainingMode,
    /// Stored exemplar id (absent for GROSS_MOTOR).
    pub exemplar_id: Option<String>,
    pub samples: usize,
    pub duration_ms: u64,
    /// New panic threshold (GROSS_MOTOR only).
    pub panic_threshold: Option<f32>,
    /// Profile generation after the update.
    pub generation: u64,
}

/// Outbound success/failure signal, emitted once per finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TrainingResult {
    Success(TrainingSummary),
    Failure { reason: String, persisted: bool },
}

impl TrainingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TrainingResult::Success(_))
    }
}

impl From<&Result<TrainingSummary, TrainingError>> for TrainingResult {
    fn from(result: &Result<TrainingSummary, TrainingError>) -> Self {
        match result {
            Ok(summary) => TrainingResult::Success(summary.clone()),
            Err(e) => TrainingResult::Failure {
                reason: e.to_string(),
                persisted: false,
            },
        }
    }
}

/// Called with the new profile after each durable update.
pub type ProfileListener = Box<dyn FnMut(&MotionProfile)>;

#[derive(Debug)]
struct Session {
    mode: TrainingMode,
    exemplar_id: Option<String>,
    buffer: RecordingBuffer,
}

/// Owns the profile for one device key and runs training sessions on it.
pub struct GestureTrainer<S: ProfileStore> {
    store: S,
    key: String,
    profile: MotionProfile,
    generation: u64,
    dirty: bool,
    session: Option<Session>,
    listeners: Vec<ProfileListener>,
}

impl<S: ProfileStore> GestureTrainer<S> {
    /// Loads the profile for `key` from `store`.
    pub fn new(store: S, key: impl Into<String>) -> Result<Self, ProfileError> {
        let key = key.into();
        let profile = store.load(&key)?;
        Ok(Self {
            store,
            key,
            profile,
            generation: 0,
            dirty: false,
            session: None,
            listeners: Vec::new(),
        })
    }

    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Incremented after every durable profile update.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the in-memory profile has changes the store does not have.
    pub fn has_unpersisted_changes(&self) -> bool {
        self.dirty
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Mode of the open session.
    pub fn recording_mode(&self) -> Option<TrainingMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Registers a profile change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&MotionProfile) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Validates the request and opens a capture session.
    pub fn start(&mut self, request: &TrainingRequest, now_ms: u64) -> Result<Feedback, TrainingError> {
        if self.session.is_some() {
            warn!(mode = %request.mode, "training request rejected: session already recording");
            return Err(TrainingError::SessionActive);
        }
        let exemplar_id = request.exemplar_id().map_err(|e| {
            warn!(mode = %request.mode, label = ?request.label, error = %e, "training request rejected");
            e
        })?;

        let mut buffer = RecordingBuffer::new();
        buffer.begin(now_ms);
        info!(mode = %request.mode, label = ?request.label, "training capture started");
        self.session = Some(Session {
            mode: request.mode,
            exemplar_id,
            buffer,
        });
        Ok(Feedback::Recording)
    }

    /// Appends a sample to the open session. Samples with a non-finite axis
    /// are dropped.
    pub fn record(&mut self, sample: MotionSample) -> Result<(), TrainingError> {
        let session = self.session.as_mut().ok_or(TrainingError::NoSession)?;
        if !session.buffer.push(sample) {
            debug!(t = sample.t, "non-finite training sample dropped");
        }
        Ok(())
    }

    /// Number of samples recorded so far.
    pub fn recorded_len(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.buffer.len())
    }

    /// Drops the open session without touching the profile.
    pub fn cancel(&mut self) -> bool {
        let had_session = self.session.take().is_some();
        if had_session {
            info!("training capture cancelled");
        }
        had_session
    }

    /// Ends the capture, runs the finalizer and persists the profile.
    pub fn finish(&mut self, now_ms: u64) -> Result<TrainingSummary, TrainingError> {
        let mut session = self.session.take().ok_or(TrainingError::NoSession)?;
        if session.buffer.is_empty() {
            warn!(mode = %session.mode, "training capture finished empty");
            return Err(TrainingError::EmptyCapture);
        }

        let duration_ms = session.buffer.elapsed_ms(now_ms);
        let peak = session.buffer.peak_energy();
        let samples = session.buffer.take();
        let sample_count = samples.len();

        let (updated, panic_threshold) = match (session.mode, session.exemplar_id.clone()) {
            (TrainingMode::GrossMotor, _) => (self.profile.with_panic_threshold(peak)?, Some(peak)),
            (_, Some(id)) => (self.profile.with_exemplar(GestureExemplar::new(id, samples)), None),
            // Unreachable after validation; treat as missing label.
            (mode, None) => return Err(TrainingError::MissingLabel(mode)),
        };

        self.commit(updated)?;
        info!(
            mode = %session.mode,
            exemplar = ?session.exemplar_id,
            samples = sample_count,
            duration_ms,
            generation = self.generation,
            "training capture saved"
        );
        Ok(TrainingSummary {
            mode: session.mode,
            exemplar_id: session.exemplar_id,
            samples: sample_count,
            duration_ms,
            panic_threshold,
            generation: self.generation,
        })
    }

    /// Replaces the matcher ceiling and persists.
    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<(), TrainingError> {
        let updated = self.profile.with_sensitivity(sensitivity)?;
        self.commit(updated)
    }

    /// Removes every exemplar of `id` and persists. Returns how many went.
    pub fn forget_label(&mut self, id: &str) -> Result<usize, TrainingError> {
        let removed = self.profile.exemplar_count(id);
        if removed > 0 {
            let updated = self.profile.without_label(id);
            self.commit(updated)?;
        }
        Ok(removed)
    }

    /// Retries a failed persist of the in-memory profile.
    pub fn retry_persist(&mut self) -> Result<(), TrainingError> {
        if !self.dirty {
            return Ok(());
        }
        let profile = self.profile.clone();
        self.commit(profile)
    }

    fn commit(&mut self, updated: MotionProfile) -> Result<(), TrainingError> {
        self.profile = updated;
        self.dirty = true;
        if let Err(source) = self.store.save(&self.key, &self.profile) {
            warn!(key = %self.key, error = %source, "profile persist failed; in-memory profile retained");
            return Err(TrainingError::Persist {
                source,
                retained: Box::new(self.profile.clone()),
            });
        }
        self.dirty = false;
        self.generation += 1;
        for listener in &mut self.listeners {
            listener(&self.profile);
        }
        Ok(())
    }
}

impl<S: ProfileStore + fmt::Debug> fmt::Debug for GestureTrainer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureTrainer")
            .field("store", &self.store)
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("dirty", &self.dirty)
            .field("session", &self.session)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
