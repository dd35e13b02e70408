//! motion-gesture command-line tool
//!
//! Drives the gesture engine offline over JSON-lines sample files (one
//! `{"t":..,"ax":..,"ay":..,"az":..,"gx":..,"gy":..,"gz":..}` object per
//! line): replay a recording through the physics classifier, train or match
//! against a stored motion profile, and inspect or tune that profile.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use motion_gesture::{
    match_buffer, EngineConfig, EngineMode, EngineOutput, FileProfileStore, GestureEngine, GestureTrainer,
    MemoryProfileStore, MotionSample, ProfileStore, SensorEvent, SensorSet, TrainingMode, TrainingRequest,
    TrainingResult,
};

#[derive(Parser, Debug)]
#[command(name = "motion-gesture", version, about = "Wrist IMU gesture recognition engine")]
struct Cli {
    /// Engine configuration JSON (partial overrides allowed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Feed a recording through the engine and print every output
    Replay {
        /// JSON-lines sample file
        #[arg(long)]
        input: PathBuf,
        /// Chain commands without cooldown
        #[arg(long)]
        conversation: bool,
        /// Run custom (DTW) mode against the stored profile instead
        #[arg(long)]
        custom: bool,
        /// Profile directory (custom mode and panic threshold)
        #[arg(long)]
        profile_dir: Option<PathBuf>,
        /// Device/user key
        #[arg(long)]
        device: Option<String>,
    },
    /// Record a training capture from a file and persist it
    Train {
        #[arg(long)]
        profile_dir: PathBuf,
        #[arg(long)]
        device: Option<String>,
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Command id (gesture) or description (noise)
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        input: PathBuf,
    },
    /// DTW-match one capture against the stored profile
    Match {
        #[arg(long)]
        profile_dir: PathBuf,
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        input: PathBuf,
    },
    /// Show what a stored profile contains
    Inspect {
        #[arg(long)]
        profile_dir: PathBuf,
        #[arg(long)]
        device: Option<String>,
    },
    /// Change the DTW acceptance ceiling
    SetSensitivity {
        #[arg(long)]
        profile_dir: PathBuf,
        #[arg(long)]
        device: Option<String>,
        value: f32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Gesture,
    Noise,
    GrossMotor,
}

impl From<ModeArg> for TrainingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Gesture => TrainingMode::Gesture,
            ModeArg::Noise => TrainingMode::Noise,
            ModeArg::GrossMotor => TrainingMode::GrossMotor,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_gesture=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Cmd::Replay {
            input,
            conversation,
            custom,
            profile_dir,
            device,
        } => {
            if let Some(device) = device {
                config.device_key = device;
            }
            config.classifier.conversation_mode |= conversation;
            let mode = if custom { EngineMode::Custom } else { EngineMode::Standard };
            let samples = read_samples(&input)?;
            match profile_dir {
                Some(dir) => replay(GestureEngine::new(config, mode, FileProfileStore::new(dir))?, &samples),
                None if custom => bail!("--custom needs --profile-dir"),
                None => replay(GestureEngine::new(config, mode, MemoryProfileStore::new())?, &samples),
            }
        }

        Cmd::Train {
            profile_dir,
            device,
            mode,
            label,
            input,
        } => {
            let key = device.unwrap_or(config.device_key);
            let samples = read_samples(&input)?;
            let request = TrainingRequest {
                mode: mode.into(),
                label,
            };
            let mut trainer = GestureTrainer::new(FileProfileStore::new(profile_dir), key)?;
            let start_ms = samples.first().map_or(0, |s| s.t);
            let end_ms = samples.last().map_or(0, |s| s.t);

            trainer.start(&request, start_ms)?;
            for sample in samples {
                trainer.record(sample)?;
            }
            let result = trainer.finish(end_ms);
            println!("{}", serde_json::to_string(&TrainingResult::from(&result))?);
            result?;
            Ok(())
        }

        Cmd::Match {
            profile_dir,
            device,
            input,
        } => {
            let key = device.unwrap_or(config.device_key);
            let profile = FileProfileStore::new(profile_dir).load(&key)?;
            let samples = read_samples(&input)?;
            let outcome = match_buffer(&samples, &profile, &config.matcher);
            match outcome.id() {
                Some(id) => println!("match {} distance={:.4}", id, outcome.best_distance().unwrap_or_default()),
                None => match outcome.best_distance() {
                    Some(d) => println!("no match (closest distance={:.4}, sensitivity={})", d, profile.sensitivity()),
                    None => println!("no match (no comparable exemplars)"),
                },
            }
            Ok(())
        }

        Cmd::Inspect { profile_dir, device } => {
            let key = device.unwrap_or(config.device_key);
            let store = FileProfileStore::new(profile_dir);
            let profile = store.load(&key)?;
            println!("profile: {}", store.path_for(&key).display());
            println!("sensitivity: {}", profile.sensitivity());
            println!("panic threshold: {}", profile.panic_threshold());
            println!("exemplars: {}", profile.exemplars().len());
            for (label, count) in profile.label_counts() {
                println!("  {:<16} {}", label, count);
            }
            Ok(())
        }

        Cmd::SetSensitivity {
            profile_dir,
            device,
            value,
        } => {
            let key = device.unwrap_or(config.device_key);
            let mut trainer = GestureTrainer::new(FileProfileStore::new(profile_dir), key)?;
            trainer.set_sensitivity(value)?;
            info!(sensitivity = value, "sensitivity updated");
            Ok(())
        }
    }
}

fn replay<S: ProfileStore>(mut engine: GestureEngine<S>, samples: &[MotionSample]) -> Result<()> {
    engine.start(&SensorSet::full())?;
    let mut commands = 0usize;
    for sample in samples {
        for output in engine.process(&SensorEvent::Sample(*sample)) {
            if let EngineOutput::Command { .. } = output {
                commands += 1;
            }
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    if let Some(batch) = engine.flush_debug() {
        println!("{}", serde_json::to_string(&EngineOutput::DebugBatch(batch))?);
    }
    info!(samples = samples.len(), commands, "replay finished");
    Ok(())
}

fn read_samples(path: &Path) -> Result<Vec<MotionSample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut samples = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: MotionSample = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed sample", path.display(), index + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}
