//! Motion profile: trained exemplars plus matcher and panic thresholds.
//!
//! # Architecture
//! - `MotionProfile` is an immutable value. Every mutation (append exemplar,
//!   change a threshold, drop a label) returns a new profile; callers swap
//!   the whole value in.
//! - `ProfileStore` is the persistence seam. `FileProfileStore` keeps one
//!   JSON record per device key and overwrites it wholesale through a temp
//!   file and rename. `MemoryProfileStore` backs tests and the demos.
//!
//! Persisted layout:
//! `{"exemplars":[{"id":..,"samples":[..]}],"sensitivity":..,"panicThreshold":..}`

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProfileError;
use crate::types::MotionSample;

/// Default DTW acceptance ceiling (normalized distance, m/s²).
pub const DEFAULT_SENSITIVITY: f32 = 3.5;

/// Default gross-motor energy ceiling (`|ax|+|ay|+|az|`, m/s²).
pub const DEFAULT_PANIC_THRESHOLD: f32 = 40.0;

/// One trained gesture (or NOISE negative) recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureExemplar {
    /// Command id, or `NOISE`.
    pub id: String,
    /// Captured samples in arrival order.
    pub samples: Vec<MotionSample>,
}

impl GestureExemplar {
    pub fn new(id: impl Into<String>, samples: Vec<MotionSample>) -> Self {
        Self {
            id: id.into(),
            samples,
        }
    }
}

/// Everything the custom-mode matcher and panic monitor need for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    #[serde(default)]
    exemplars: Vec<GestureExemplar>,
    #[serde(default = "default_sensitivity")]
    sensitivity: f32,
    #[serde(rename = "panicThreshold", default = "default_panic_threshold")]
    panic_threshold: f32,
}

fn default_sensitivity() -> f32 {
    DEFAULT_SENSITIVITY
}

fn default_panic_threshold() -> f32 {
    DEFAULT_PANIC_THRESHOLD
}

fn check_sensitivity(sensitivity: f32) -> Result<f32, ProfileError> {
    if sensitivity.is_finite() && sensitivity > 0.0 {
        Ok(sensitivity)
    } else {
        Err(ProfileError::InvalidSensitivity(sensitivity))
    }
}

fn check_panic_threshold(panic_threshold: f32) -> Result<f32, ProfileError> {
    if panic_threshold.is_finite() {
        Ok(panic_threshold)
    } else {
        Err(ProfileError::InvalidPanicThreshold(panic_threshold))
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            exemplars: Vec::new(),
            sensitivity: DEFAULT_SENSITIVITY,
            panic_threshold: DEFAULT_PANIC_THRESHOLD,
        }
    }
}

impl MotionProfile {
    /// Builds a profile. Sensitivity must be positive and finite, the panic
    /// threshold finite.
    pub fn new(
        exemplars: Vec<GestureExemplar>,
        sensitivity: f32,
        panic_threshold: f32,
    ) -> Result<Self, ProfileError> {
        Ok(Self {
            exemplars,
            sensitivity: check_sensitivity(sensitivity)?,
            panic_threshold: check_panic_threshold(panic_threshold)?,
        })
    }

    /// Parses the persisted JSON layout.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: MotionProfile = serde_json::from_str(json)?;
        check_sensitivity(profile.sensitivity)?;
        Ok(profile)
    }

    /// Serializes to the persisted JSON layout.
    ///
    /// JSON has no encoding for NaN or infinity, so a profile holding one
    /// is refused here rather than written in a form that cannot be read back.
    pub fn to_json(&self) -> Result<String, ProfileError> {
        self.check_finite()?;
        Ok(serde_json::to_string(self)?)
    }

    fn check_finite(&self) -> Result<(), ProfileError> {
        check_sensitivity(self.sensitivity)?;
        check_panic_threshold(self.panic_threshold)?;
        for exemplar in &self.exemplars {
            if let Some(index) = exemplar.samples.iter().position(|s| !s.is_finite()) {
                return Err(ProfileError::NonFiniteSample {
                    id: exemplar.id.clone(),
                    index,
                });
            }
        }
        Ok(())
    }

    pub fn exemplars(&self) -> &[GestureExemplar] {
        &self.exemplars
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn panic_threshold(&self) -> f32 {
        self.panic_threshold
    }

    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    /// Returns a copy with one more exemplar.
    pub fn with_exemplar(&self, exemplar: GestureExemplar) -> Self {
        let mut next = self.clone();
        next.exemplars.push(exemplar);
        next
    }

    /// Returns a copy with a new matcher ceiling.
    pub fn with_sensitivity(&self, sensitivity: f32) -> Result<Self, ProfileError> {
        let mut next = self.clone();
        next.sensitivity = check_sensitivity(sensitivity)?;
        Ok(next)
    }

    /// Returns a copy with a new panic ceiling. Must be finite; zero or less
    /// disables the alarm.
    pub fn with_panic_threshold(&self, panic_threshold: f32) -> Result<Self, ProfileError> {
        let mut next = self.clone();
        next.panic_threshold = check_panic_threshold(panic_threshold)?;
        Ok(next)
    }

    /// Returns a copy with every exemplar of `id` removed.
    pub fn without_label(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.exemplars.retain(|e| e.id != id);
        next
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.exemplars.iter().map(|e| e.id.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Number of exemplars stored under `id`.
    pub fn exemplar_count(&self, id: &str) -> usize {
        self.exemplars.iter().filter(|e| e.id == id).count()
    }

    /// Exemplar counts keyed by label.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for exemplar in &self.exemplars {
            *counts.entry(exemplar.id.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Durable home for motion profiles, keyed by device/user.
///
/// `save` is synchronous: when it returns `Ok` the record is durable.
pub trait ProfileStore {
    /// Loads the profile for `key`. A key never saved yields the default.
    fn load(&self, key: &str) -> Result<MotionProfile, ProfileError>;

    /// Overwrites the record for `key` wholesale.
    fn save(&mut self, key: &str, profile: &MotionProfile) -> Result<(), ProfileError>;
}

/// JSON files under one directory, one per key.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<key>.motion_profile.json`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.motion_profile.json", key))
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self, key: &str) -> Result<MotionProfile, ProfileError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let profile = MotionProfile::from_json(&text)?;
                debug!(path = %path.display(), exemplars = profile.exemplars.len(), "profile loaded");
                Ok(profile)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stored profile, using defaults");
                Ok(MotionProfile::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, profile: &MotionProfile) -> Result<(), ProfileError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        let json = profile.to_json()?;

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        info!(
            path = %path.display(),
            exemplars = profile.exemplars.len(),
            sensitivity = profile.sensitivity,
            "profile persisted"
        );
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    records: HashMap<String, MotionProfile>,
    saves: usize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, key: &str) -> Result<MotionProfile, ProfileError> {
        Ok(self.records.get(key).cloned().unwrap_or_default())
    }

    fn save(&mut self, key: &str, profile: &MotionProfile) -> Result<(), ProfileError> {
        profile.check_finite()?;
        self.records.insert(key.to_string(), profile.clone());
        self.saves += 1;
        Ok(())
    }
}
