//! # Hunt RL
//!
//! Real-time interaction core for screen-driven game agents
//!
//! The crate turns periodic screen captures into stacked grayscale
//! observations, maps discrete action ids to timed key events under
//! per-action cooldowns, scores every step with heuristic pixel-level
//! rewards, and watches for a templated threat that triggers a scripted
//! escape. Capture and input backends are supplied by the caller through
//! [`env::devices::FrameSource`] and [`env::devices::InputSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hunt_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = GameConfig::preset(Preset::Caster);
//! let source = ScriptedFrameSource::constant(Frame::filled(800, 600, [0, 0, 0]));
//! let mut env = RealtimeEnv::new(
//!     config,
//!     TemplateSet::default(),
//!     source,
//!     RecordingInputSink::new(),
//!     SystemClock::new(),
//! )?;
//!
//! let _obs = env.reset()?;
//! let result = env.step(4)?;
//! println!("reward {}", result.reward);
//! env.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Game configuration and presets
pub mod config;

/// Environment traits, components and the real-time environment
pub mod env;

/// Read-only statistics snapshots
pub mod stats;

/// Pixel operations and template matching
pub mod vision;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        config::{GameConfig, Preset, ResetPolicy},
        env::{
            Environment, SpaceInfo, SpaceType, StepInfo, StepResult,
            action::{ActionCategory, ActionId, Direction},
            clock::{Clock, ManualClock, SystemClock},
            devices::{FrameSource, InputSink, Key},
            executor::MovementPolicy,
            mock::{RecordingInputSink, ScriptedFrameSource},
            observation::Observation,
            realtime::{RealtimeEnv, StopSignal},
            reward::{RegionConfig, RewardBreakdown},
            watchdog::{TemplatePaths, TemplateSet, ThreatWatchdog, WatchdogConfig},
        },
        stats::{EpisodeSnapshot, StatsPublisher},
        vision::{Frame, Roi, Template},
    };
}

/// Current version of hunt-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
