/// Custom mode example: train two gestures and a noise exemplar, then
/// recognise a fresh performance through the unlock/capture cycle.
use motion_gesture::{
    EngineConfig, EngineMode, EngineOutput, GestureEngine, MemoryProfileStore, MotionSample, SensorEvent, SensorSet,
    TrainingRequest,
};

fn swing(t0: u64, n: usize, amplitude: f32, speed: f32) -> Vec<MotionSample> {
    (0..n)
        .map(|i| {
            let x = (i as f32 * speed).sin() * amplitude;
            MotionSample::accel_only(t0 + i as u64 * 20, [x, 1.0, 9.8 - x * 0.3])
        })
        .collect()
}

fn train(
    engine: &mut GestureEngine<MemoryProfileStore>,
    request: TrainingRequest,
    samples: &[MotionSample],
) -> anyhow::Result<()> {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Ok(());
    };
    engine.start_training(&request, first.t)?;
    for sample in samples {
        engine.process(&SensorEvent::Sample(*sample));
    }
    let summary = engine.finish_training(last.t)?;
    println!(
        "trained {:<12} {:>3} samples, generation {}",
        summary.exemplar_id.as_deref().unwrap_or("-"),
        summary.samples,
        summary.generation
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    println!("=== Motion Gesture Engine: Custom Training ===\n");

    let config = EngineConfig {
        debug_batch_size: 0,
        ..EngineConfig::default()
    };
    let mut engine = GestureEngine::new(config, EngineMode::Custom, MemoryProfileStore::new())?;
    engine.start(&SensorSet::full())?;

    train(&mut engine, TrainingRequest::gesture("wave"), &swing(0, 125, 4.0, 0.25))?;
    train(&mut engine, TrainingRequest::gesture("stop"), &swing(5_000, 125, 1.5, 0.08))?;
    train(&mut engine, TrainingRequest::noise("scratching"), &swing(10_000, 125, 0.4, 0.9))?;
    println!("\nProfile labels: {:?}\n", engine.trainer().profile().labels());

    // Unlock with three twists, settle, then perform the wave again
    let base = 20_000;
    let mut stream = vec![
        MotionSample::accel_only(base, [0.0, 0.0, 9.8]),
        MotionSample::accel_only(base + 100, [0.0, 8.0, 5.0]),
        MotionSample::accel_only(base + 200, [0.0, 0.0, 5.0]),
        MotionSample::accel_only(base + 300, [0.0, 8.0, 5.0]),
    ];
    stream.extend((base + 320..base + 900).step_by(20).map(|t| MotionSample::accel_only(t, [0.0, 1.0, 9.8])));
    stream.extend(swing(base + 900, 130, 4.0, 0.25));

    for sample in stream {
        for output in engine.process(&SensorEvent::Sample(sample)) {
            match output {
                EngineOutput::Command { command, .. } => println!("[{:>5}ms] recognised {}", sample.t, command),
                EngineOutput::NoMatch { distance } => println!("[{:>5}ms] no match (closest {:?})", sample.t, distance),
                EngineOutput::Feedback(feedback) => println!("[{:>5}ms] feedback {:?}", sample.t, feedback),
                _ => {}
            }
        }
    }

    println!("\nFinal phase: {:?}", engine.custom_phase());
    Ok(())
}
