//! # Demo: replay_session
//!
//! Replays a prerecorded push-up through a full device: both sampling loops,
//! the in-process bus, a stdout actuator and a JSON-lines session log.
//!
//! ## Flow
//! ```text
//! ReplayPoseSource ──► FrameLoop ── status/direction ──► RangeLoop ◄── ScriptedRangeSensor
//!                          ▲                                  │
//!                          └────────── posture evidence ──────┘
//!
//! user in view ─► ready posture 1.5s ─► Start ─► one clean rep ─► user leaves ─► End
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=repvisor=debug cargo run --example replay_session --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use repvisor::{
    Config, Frame, JsonFileRecorder, LogActuator, ReplayPoseSource, RuntimeBuilder,
    ScriptedRangeSensor,
};
use tracing_subscriber::EnvFilter;

/// Ready posture, one rep, then the user walks away.
fn recorded_frames() -> Vec<Frame> {
    let mut frames = vec![Frame::with_user(170.0, 60.0, 150.0); 20];
    for elbow in [170.0, 150.0, 120.0, 85.0, 80.0, 95.0, 130.0, 150.0, 160.0] {
        frames.push(Frame::with_user(elbow, 60.0, 150.0));
    }
    frames.extend(vec![Frame::with_user(160.0, 60.0, 150.0); 20]);
    frames.extend(vec![Frame::empty(); 4]);
    frames
}

/// Chest distance: top 40 cm, bottom 5 cm, one descent and ascent.
fn recorded_distances() -> ScriptedRangeSensor {
    ScriptedRangeSensor::new([
        40.0, 5.0, 30.0, 25.0, 20.0, 15.0, 10.0, 8.0, 8.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0,
        38.0, 40.0,
    ])
    .repeat_last()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repvisor=info")),
        )
        .init();

    let log_path = std::env::temp_dir().join("repvisor-sessions.jsonl");
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(2);

    let runtime = RuntimeBuilder::new(cfg)
        .with_range_sensor(recorded_distances())
        .with_pose_source(ReplayPoseSource::new(
            recorded_frames(),
            Duration::from_millis(100),
        ))
        .with_actuator(Arc::new(LogActuator::new().quiet_ticks()))
        .with_recorder(Arc::new(JsonFileRecorder::new(log_path.clone())))
        .build()?;

    // Stops on its own when the replay runs out, or on Ctrl-C.
    runtime.run().await?;

    println!("session log: {}", log_path.display());
    Ok(())
}
