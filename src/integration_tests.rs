/// Integration tests for the complete gesture engine
/// Drives realistic wrist motion through `GestureEngine` end to end: unlock,
/// pose, modifiers, cooldown, custom-mode capture cycles, training and
/// profile persistence.

#[cfg(test)]
mod integration_tests {
    use std::path::PathBuf;

    use crate::config::EngineConfig;
    use crate::engine::{CustomPhase, EngineMode, EngineOutput, GestureEngine, SensorSet};
    use crate::classifier::Phase;
    use crate::profile::{FileProfileStore, MemoryProfileStore, MotionProfile, ProfileStore};
    use crate::trainer::TrainingRequest;
    use crate::types::*;

    const REST: [f32; 3] = [0.0, 0.0, 9.8];
    const ARM_UP: [f32; 3] = [9.5, 0.5, 1.0];
    const PALM: [f32; 3] = [0.5, 9.5, 1.0];
    const ARM_DOWN: [f32; 3] = [-9.5, 0.5, 1.0];
    const HANDSHAKE: [f32; 3] = [0.5, -9.5, 1.0];
    const NO_ROTATION: [f32; 3] = [0.0; 3];

    /// Helper: one six-axis sample event
    fn sample(t: u64, accel: [f32; 3], gyro: [f32; 3]) -> SensorEvent {
        SensorEvent::Sample(MotionSample::new(t, accel, gyro))
    }

    /// Helper: steady orientation from `start` to `end` inclusive at 50 Hz
    fn hold(start: u64, end: u64, accel: [f32; 3]) -> Vec<SensorEvent> {
        (start..=end).step_by(20).map(|t| sample(t, accel, NO_ROTATION)).collect()
    }

    /// Helper: three unlock twists, the last landing at `start + 300`
    fn twists(start: u64) -> Vec<SensorEvent> {
        [REST, [0.0, 8.0, 5.0], [0.0, 0.0, 5.0], [0.0, 8.0, 5.0]]
            .iter()
            .enumerate()
            .map(|(i, a)| sample(start + i as u64 * 100, *a, NO_ROTATION))
            .collect()
    }

    /// Helper: a smooth wrist wave (no single-sample ay jump large enough to twist)
    fn wave_motion(t0: u64, n: usize) -> Vec<MotionSample> {
        (0..n)
            .map(|i| {
                let phase = i as f32 * 0.25;
                MotionSample::accel_only(t0 + i as u64 * 20, [phase.sin() * 6.0, 2.0 + phase.cos() * 2.0, 9.0])
            })
            .collect()
    }

    /// Helper: a fast lateral shake, distinct from the wave
    fn shake_motion(t0: u64, n: usize) -> Vec<MotionSample> {
        (0..n)
            .map(|i| {
                let x = if i % 4 < 2 { 4.0 } else { -4.0 };
                MotionSample::accel_only(t0 + i as u64 * 20, [x, -1.0, 8.0])
            })
            .collect()
    }

    fn standard_engine(config: EngineConfig) -> GestureEngine<MemoryProfileStore> {
        let mut engine = GestureEngine::new(config, EngineMode::Standard, MemoryProfileStore::new()).unwrap();
        engine.start(&SensorSet::full()).unwrap();
        engine
    }

    fn quiet_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.debug_batch_size = 0;
        config
    }

    fn feed<S: ProfileStore>(engine: &mut GestureEngine<S>, events: &[SensorEvent]) -> Vec<EngineOutput> {
        events.iter().flat_map(|e| engine.process(e)).collect()
    }

    fn feed_samples<S: ProfileStore>(engine: &mut GestureEngine<S>, samples: &[MotionSample]) -> Vec<EngineOutput> {
        samples.iter().flat_map(|s| engine.process(&SensorEvent::Sample(*s))).collect()
    }

    fn commands(outputs: &[EngineOutput]) -> Vec<Command> {
        outputs.iter().filter_map(|o| o.command()).collect()
    }

    /// Unlocks and settles into LISTENING; returns the last timestamp used.
    fn unlock<S: ProfileStore>(engine: &mut GestureEngine<S>) -> u64 {
        feed(engine, &twists(0));
        assert_eq!(engine.phase(), Phase::GateUnlock);
        feed(engine, &hold(320, 900, REST));
        assert_eq!(engine.phase(), Phase::Listening);
        900
    }

    fn train<S: ProfileStore>(engine: &mut GestureEngine<S>, request: TrainingRequest, samples: &[MotionSample]) {
        let t0 = samples.first().map_or(0, |s| s.t);
        let t1 = samples.last().map_or(0, |s| s.t);
        engine.start_training(&request, t0).unwrap();
        feed_samples(engine, samples);
        engine.finish_training(t1).unwrap();
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("motion_gesture_it_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    // ========================================================================
    // STANDARD MODE
    // ========================================================================

    #[test]
    fn test_scenario_three_twists_unlock_and_gap_restarts_count() {
        let mut engine = standard_engine(quiet_config());
        let outputs = feed(&mut engine, &twists(0));
        assert_eq!(engine.phase(), Phase::GateUnlock);
        assert!(outputs.contains(&EngineOutput::Feedback(Feedback::Unlocked)));

        // Two twists, then a third swing 2 s later.
        let mut engine = standard_engine(quiet_config());
        feed(&mut engine, &twists(0)[..3]);
        engine.process(&sample(2200, [0.0, 8.0, 5.0], NO_ROTATION));
        assert_eq!(engine.phase(), Phase::Idle, "late twist must not complete the old sequence");
        engine.process(&sample(2300, [0.0, 0.0, 5.0], NO_ROTATION));
        assert_eq!(engine.phase(), Phase::Idle);
        engine.process(&sample(2400, [0.0, 8.0, 5.0], NO_ROTATION));
        assert_eq!(engine.phase(), Phase::GateUnlock);
    }

    #[test]
    fn test_scenario_arm_up_held_fires_wave_once() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        let outputs = feed(&mut engine, &hold(t + 20, t + 3000, ARM_UP));

        assert_eq!(commands(&outputs), vec![Command::Wave]);
        assert!(outputs.contains(&EngineOutput::Feedback(Feedback::PoseDetected)));
        assert!(outputs.contains(&EngineOutput::Command {
            command: Command::Wave,
            feedback: Feedback::CommandSent,
        }));
        assert_eq!(engine.phase(), Phase::Cooldown);
    }

    #[test]
    fn test_scenario_cooldown_blocks_new_commands() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        let mut fired = commands(&feed(&mut engine, &hold(t + 20, t + 1400, ARM_UP)));
        assert_eq!(fired, vec![Command::Wave]); // at 2180

        // A complete unlock + pose sequence inside the cooldown is ignored.
        fired.extend(commands(&feed(&mut engine, &twists(2400))));
        fired.extend(commands(&feed(&mut engine, &hold(2720, 4100, ARM_UP))));
        assert_eq!(fired, vec![Command::Wave]);
        assert_eq!(engine.phase(), Phase::Cooldown);

        // Once the dwell has elapsed the engine listens again.
        engine.process(&sample(4200, REST, NO_ROTATION));
        assert_eq!(engine.phase(), Phase::Idle);
        feed(&mut engine, &twists(4300));
        feed(&mut engine, &hold(4620, 5200, REST));
        fired.extend(commands(&feed(&mut engine, &hold(5220, 7000, ARM_UP))));
        assert_eq!(fired, vec![Command::Wave, Command::Wave]);
    }

    #[test]
    fn test_arm_down_with_two_modifiers_fires_name() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        let mut events = hold(t + 20, 1420, ARM_DOWN);
        for ts in (1440..=3000).step_by(20) {
            let gyro = match ts {
                1440..=1500 => [0.0, 0.0, 4.0],
                1600..=1660 => [0.0, -4.5, 0.0],
                _ => NO_ROTATION,
            };
            events.push(sample(ts, ARM_DOWN, gyro));
        }
        let fired = commands(&feed(&mut engine, &events));
        assert_eq!(fired, vec![Command::Name]);
    }

    #[test]
    fn test_split_sensor_callbacks_count_modifiers() {
        // Accelerometer and gyroscope arrive as separate events.
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        let mut fired = Vec::new();
        for ts in (t + 20..=3000).step_by(20) {
            let gyro = if (1440..=1500).contains(&ts) { [4.0, 0.0, 0.0] } else { NO_ROTATION };
            fired.extend(commands(&engine.process(&SensorEvent::Gyroscope { timestamp_ms: ts, gyro })));
            fired.extend(commands(&engine.process(&SensorEvent::Accelerometer {
                timestamp_ms: ts,
                accel: PALM,
            })));
        }
        assert_eq!(fired, vec![Command::Wait]);
    }

    #[test]
    fn test_handshake_hold_auto_fires() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        let fired = commands(&feed(&mut engine, &hold(t + 20, t + 1400, HANDSHAKE)));
        assert_eq!(fired, vec![Command::MeetPleasure]);
    }

    #[test]
    fn test_conversation_mode_chains_without_unlock() {
        let mut config = quiet_config();
        config.classifier.conversation_mode = true;
        let mut engine = standard_engine(config);
        let t = unlock(&mut engine);

        let mut fired = commands(&feed(&mut engine, &hold(t + 20, 2500, ARM_UP)));
        assert_eq!(engine.phase(), Phase::ChainingWait);
        engine.process(&sample(2520, REST, NO_ROTATION));
        assert_eq!(engine.phase(), Phase::Listening);
        fired.extend(commands(&feed(&mut engine, &hold(2540, 4000, PALM))));
        assert_eq!(fired, vec![Command::Wave, Command::Stop]);
    }

    #[test]
    fn test_debounce_property_fewer_than_three_twists() {
        // Pseudo-random bursts of at most two swings, each burst separated by
        // more than the twist timeout, with small jitter in between.
        let mut engine = standard_engine(quiet_config());
        let mut seed: u32 = 0x2545_f491;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u64
        };

        let mut t = 0u64;
        for _ in 0..200 {
            let swings = 1 + next() % 2;
            let mut y = 8.0;
            for _ in 0..swings {
                t += 40 + next() % 200;
                engine.process(&sample(t, [0.0, y, 5.0], NO_ROTATION));
                y = 0.0;
            }
            let quiet_until = t + 850 + next() % 600;
            while t < quiet_until {
                t += 50;
                let jitter = (next() % 600) as f32 / 100.0 - 3.0;
                engine.process(&sample(t, [0.0, jitter, 9.0], NO_ROTATION));
                assert_eq!(engine.phase(), Phase::Idle, "left IDLE at {} ms", t);
            }
        }
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_rate_follows_activity() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        assert_eq!(engine.rate(), SamplingRate::High);
        let outputs = feed(&mut engine, &hold(t + 20, 4400, ARM_UP));
        // Wave at 2180, cooldown ends at 4180.
        assert!(outputs.contains(&EngineOutput::RateChange(SamplingRate::Low)));
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.rate(), SamplingRate::Low);
    }

    #[test]
    fn test_manual_reset_mid_evaluation() {
        let mut engine = standard_engine(quiet_config());
        let t = unlock(&mut engine);
        feed(&mut engine, &hold(t + 20, 1500, PALM));
        assert_eq!(engine.phase(), Phase::Evaluating);
        engine.reset();
        assert_eq!(engine.phase(), Phase::Idle);
        let fired = commands(&feed(&mut engine, &hold(1520, 4000, PALM)));
        assert!(fired.is_empty());
    }

    // ========================================================================
    // CUSTOM MODE + TRAINING
    // ========================================================================

    fn custom_engine<S: ProfileStore>(store: S) -> GestureEngine<S> {
        let mut engine = GestureEngine::new(quiet_config(), EngineMode::Custom, store).unwrap();
        engine.start(&SensorSet::full()).unwrap();
        engine
    }

    #[test]
    fn test_custom_cycle_window_expiry_matches_trained_wave() {
        let mut engine = custom_engine(MemoryProfileStore::new());
        train(&mut engine, TrainingRequest::gesture("wave"), &wave_motion(0, 126));
        train(&mut engine, TrainingRequest::gesture("stop"), &shake_motion(5000, 126));
        assert_eq!(engine.profile().exemplars().len(), 2);

        let base = 20_000;
        let mut outputs = feed(&mut engine, &twists(base));
        assert_eq!(engine.custom_phase(), CustomPhase::Settling);
        outputs.extend(feed(&mut engine, &hold(base + 320, base + 840, REST)));
        assert_eq!(engine.custom_phase(), CustomPhase::Settling);

        // Capture opens on the first sample after the dwell and closes itself
        // 2500 ms later.
        outputs.extend(feed_samples(&mut engine, &wave_motion(base + 900, 126)));
        assert_eq!(engine.custom_phase(), CustomPhase::Cooldown);
        assert_eq!(commands(&outputs), vec![Command::Wave]);
        assert!(outputs.contains(&EngineOutput::Feedback(Feedback::Recording)));

        feed(&mut engine, &hold(base + 3420, base + 5420, REST));
        assert_eq!(engine.custom_phase(), CustomPhase::Locked);
    }

    #[test]
    fn test_scenario_exact_duplicate_matches_any_positive_sensitivity() {
        let mut engine = custom_engine(MemoryProfileStore::new());
        let recording = wave_motion(0, 60);
        train(&mut engine, TrainingRequest::gesture("thanks"), &recording);
        engine.trainer_mut().set_sensitivity(1e-6).unwrap();

        engine.begin_capture(10_000).unwrap();
        feed_samples(&mut engine, &wave_motion(10_000, 60));
        let outputs = engine.end_capture(11_200).unwrap();
        assert_eq!(commands(&outputs), vec![Command::Thanks]);
    }

    #[test]
    fn test_scenario_length_mismatch_never_matches() {
        let mut engine = custom_engine(MemoryProfileStore::new());
        train(&mut engine, TrainingRequest::gesture("wave"), &wave_motion(0, 60));
        engine.trainer_mut().set_sensitivity(f32::MAX).unwrap();

        engine.begin_capture(10_000).unwrap();
        feed_samples(&mut engine, &wave_motion(10_000, 25));
        let outputs = engine.end_capture(10_600).unwrap();
        assert_eq!(outputs[0], EngineOutput::NoMatch { distance: None });
    }

    #[test]
    fn test_noise_exemplar_suppresses_trigger() {
        let mut engine = custom_engine(MemoryProfileStore::new());
        train(&mut engine, TrainingRequest::gesture("wave"), &wave_motion(0, 60));
        train(&mut engine, TrainingRequest::noise("typing shake"), &shake_motion(2000, 60));

        engine.begin_capture(10_000).unwrap();
        feed_samples(&mut engine, &shake_motion(10_000, 60));
        let outputs = engine.end_capture(11_200).unwrap();
        assert_eq!(outputs[0], EngineOutput::NoMatch { distance: Some(0.0) });
        assert!(commands(&outputs).is_empty());
    }

    #[test]
    fn test_gross_motor_training_arms_panic_alarm() {
        let mut engine = standard_engine(quiet_config());
        let violent = MotionSample::accel_only(100, [15.0, 10.0, 6.0]);
        assert!(!engine
            .process(&SensorEvent::Sample(violent))
            .iter()
            .any(|o| matches!(o, EngineOutput::Panic { .. })));

        let calibration = vec![
            MotionSample::accel_only(1000, [1.0, 1.0, 9.8]),
            MotionSample::accel_only(1020, [-12.0, 10.0, 8.0]),
            MotionSample::accel_only(1040, [1.0, 1.0, 9.8]),
        ];
        train(&mut engine, TrainingRequest::gross_motor(), &calibration);
        assert_eq!(engine.profile().panic_threshold(), 30.0);

        let outputs = engine.process(&SensorEvent::Sample(MotionSample::accel_only(5000, [15.0, 10.0, 6.0])));
        assert!(outputs.contains(&EngineOutput::Panic { energy: 31.0 }));
    }

    #[test]
    fn test_profile_swap_waits_for_open_capture() {
        let mut engine = custom_engine(MemoryProfileStore::new());
        engine.begin_capture(0).unwrap();
        feed_samples(&mut engine, &wave_motion(0, 30));

        // Sensitivity change lands mid-capture; the matcher keeps the old profile.
        engine.trainer_mut().set_sensitivity(0.5).unwrap();
        feed_samples(&mut engine, &wave_motion(600, 5));
        assert_eq!(engine.profile().sensitivity(), 3.5);

        engine.end_capture(800).unwrap();
        engine.process(&sample(900, REST, NO_ROTATION));
        assert_eq!(engine.profile().sensitivity(), 0.5);
    }

    #[test]
    fn test_trained_profile_survives_restart_and_persists_idempotently() {
        let dir = temp_dir("restart");
        {
            let mut engine = custom_engine(FileProfileStore::new(&dir));
            train(&mut engine, TrainingRequest::gesture("no"), &shake_motion(0, 40));
            train(&mut engine, TrainingRequest::gesture("wave"), &wave_motion(1000, 50));
            engine.trainer_mut().set_sensitivity(2.0).unwrap();
        }

        let mut engine = custom_engine(FileProfileStore::new(&dir));
        assert_eq!(engine.profile().labels(), vec!["no", "wave"]);
        assert_eq!(engine.profile().sensitivity(), 2.0);

        engine.begin_capture(50_000).unwrap();
        feed_samples(&mut engine, &wave_motion(50_000, 50));
        assert_eq!(commands(&engine.end_capture(51_000).unwrap()), vec![Command::Wave]);

        // Load → persist unchanged → reload.
        let mut store = FileProfileStore::new(&dir);
        let loaded: MotionProfile = store.load("default").unwrap();
        store.save("default", &loaded).unwrap();
        let reloaded = store.load("default").unwrap();
        assert_eq!(reloaded.exemplars(), loaded.exemplars());
        assert_eq!(reloaded.sensitivity(), loaded.sensitivity());
        assert_eq!(reloaded.panic_threshold(), loaded.panic_threshold());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
