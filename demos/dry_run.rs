//! Dry run of the caster environment without a game
//!
//! Synthetic frames stand in for the screen and every key event is recorded
//! instead of sent, so this runs anywhere. A monitor thread prints the
//! statistics snapshots the control loop publishes.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=hunt_rl=debug cargo run --example dry_run
//! ```

use std::thread;

use anyhow::Result;
use hunt_rl::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing_subscriber::EnvFilter;

const WIDTH: usize = 160;
const HEIGHT: usize = 120;
const STEPS: usize = 12;

/// Noise frames with a yellow goal bar that grows over time
fn synthetic_frames(count: usize, rng: &mut StdRng) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let mut frame = Frame::filled(WIDTH, HEIGHT, [20, 24, 32]);
            for _ in 0..400 {
                let (x, y) = (rng.gen_range(0..WIDTH), rng.gen_range(0..HEIGHT));
                let v = rng.gen_range(0..=255u8);
                frame.set_pixel(x, y, [v, v, v]);
            }
            let fill = (i as u32 * 4).min(100);
            frame.fill_rect(Roi::new(10, 4, fill, 6), [255, 220, 0]);
            frame
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let regions = RegionConfig { goal_bar: Some(Roi::new(0, 0, 120, 14)), ..RegionConfig::default() };
    let config = GameConfig::preset(Preset::Caster).regions(regions).seed(7);

    let (publisher, receiver) = StatsPublisher::bounded(STEPS);
    let monitor = thread::spawn(move || {
        for snapshot in receiver.iter() {
            tracing::info!(
                "[monitor] episode {} step {}: reward {:+.2} (total {:+.2}), stuck {}",
                snapshot.episode,
                snapshot.step,
                snapshot.step_reward,
                snapshot.episode_reward,
                snapshot.stuck_count
            );
        }
    });

    let source = ScriptedFrameSource::new(synthetic_frames(STEPS * 4 + 1, &mut rng));
    let mut env = RealtimeEnv::new(
        config,
        TemplateSet::default(),
        source,
        RecordingInputSink::new(),
        ManualClock::new(),
    )?
    .with_stats(publisher);

    let obs = env.reset()?;
    tracing::info!("observation shape {:?}", obs.shape());

    let cardinality = match env.action_space().dtype {
        SpaceType::Discrete(n) => n as i64,
        SpaceType::Continuous => anyhow::bail!("expected a discrete action space"),
    };

    for _ in 0..STEPS {
        let action = rng.gen_range(0..cardinality);
        let result = env.step(action)?;
        tracing::info!(
            "action {:>2} -> reward {:+.3} [goal {:+.2}, change {:+.2}, sequence {:+.2}, base {:+.2}]",
            action,
            result.reward,
            result.info.breakdown.goal,
            result.info.breakdown.change,
            result.info.breakdown.sequence,
            result.info.breakdown.base
        );
        if result.terminated || result.truncated {
            break;
        }
    }

    env.close()?;
    tracing::info!(
        "{} key events recorded over {:.2}s of simulated time",
        env.input().events().len(),
        env.clock().now().as_secs_f64()
    );

    drop(env);
    if monitor.join().is_err() {
        tracing::warn!("monitor thread panicked");
    }
    Ok(())
}
