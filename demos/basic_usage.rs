/// Basic usage example: unlock the gate, hold a pose, get a command
use motion_gesture::{
    EngineConfig, EngineMode, EngineOutput, GestureEngine, MemoryProfileStore, MotionSample, SensorEvent, SensorSet,
};

const REST: [f32; 3] = [0.0, 0.0, 9.8];
const ARM_UP: [f32; 3] = [9.5, 0.5, 1.0];

fn main() -> anyhow::Result<()> {
    println!("=== Motion Gesture Engine: Basic Example ===\n");

    // Standard mode with the debug stream switched off
    let config = EngineConfig {
        debug_batch_size: 0,
        ..EngineConfig::default()
    };
    let mut engine = GestureEngine::new(config, EngineMode::Standard, MemoryProfileStore::new())?;
    let rate = engine.start(&SensorSet::full())?;
    println!("Engine started at {:?} sampling", rate);

    // Three wrist twists, a settle at rest, then the arm raised (Wave)
    let mut stream: Vec<(u64, [f32; 3])> = vec![
        (0, REST),
        (100, [0.0, 8.0, 5.0]),
        (200, [0.0, 0.0, 5.0]),
        (300, [0.0, 8.0, 5.0]),
    ];
    stream.extend((320..=900).step_by(20).map(|t| (t, REST)));
    stream.extend((920..=2600).step_by(20).map(|t| (t, ARM_UP)));

    println!("Processing {} samples...\n", stream.len());

    let mut commands = 0;
    for (t, accel) in stream {
        let event = SensorEvent::Sample(MotionSample::new(t, accel, [0.0; 3]));
        for output in engine.process(&event) {
            if let EngineOutput::Command { .. } = output {
                commands += 1;
            }
            print_output(t, &output);
        }
    }

    println!("\n=== Summary ===");
    println!("Commands fired: {}", commands);
    println!("Final phase: {:?}", engine.phase());
    Ok(())
}

fn print_output(t: u64, output: &EngineOutput) {
    match output {
        EngineOutput::Command { command, feedback } => {
            println!("[{t:>5}ms] COMMAND {} -> {} ({:?})", command, command.message_path(), feedback)
        }
        EngineOutput::Feedback(feedback) => println!("[{t:>5}ms] feedback {:?}", feedback),
        EngineOutput::RateChange(rate) => println!("[{t:>5}ms] rate -> {:?}", rate),
        other => println!("[{t:>5}ms] {:?}", other),
    }
}
