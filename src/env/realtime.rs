//! Real-time screen environment
//!
//! [`RealtimeEnv`] drives one game window through its collaborators. Each
//! call to [`Environment::step`] runs `frame_skip` inner iterations:
//!
//! ```text
//! stop? ─▶ execute action ─▶ settle ─▶ capture ─▶ watchdog ─▶ reward ─▶ stack
//! ```
//!
//! Every exit path that ends the interaction (error, step budget, stop
//! signal, [`Environment::close`], drop) releases all held keys.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, bail};

use super::{
    Environment, SpaceInfo, SpaceType, StepInfo, StepResult,
    action::ActionId,
    clock::{Clock, secs},
    devices::{FrameSource, InputSink},
    executor::ActionExecutor,
    observation::{Observation, ObservationBuilder},
    reward::{ActionHistory, RewardBreakdown, RewardEngine},
    watchdog::{TemplateSet, ThreatWatchdog},
};
use crate::{
    config::{EpisodeConfig, GameConfig},
    stats::{EpisodeSnapshot, StatsPublisher},
    vision::Frame,
};

/// Cloneable cancellation flag checked once per inner iteration
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a signal in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return to the running state
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Counters of the current episode
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Episode {
    /// Episode number, starting at 1 after the first reset
    pub number: u64,
    /// Inner iterations executed
    pub steps: usize,
    /// Cumulative reward
    pub reward: f64,
}

/// Environment over a live screen and input device
pub struct RealtimeEnv<F: FrameSource, I: InputSink, C: Clock> {
    episode_config: EpisodeConfig,
    source: F,
    input: I,
    clock: C,
    executor: ActionExecutor,
    reward: RewardEngine,
    watchdog: ThreatWatchdog,
    observations: ObservationBuilder,
    history: ActionHistory,
    episode: Episode,
    last_frame: Option<Frame>,
    action_counts: Vec<u64>,
    stop: StopSignal,
    stats: Option<StatsPublisher>,
}

impl<F: FrameSource, I: InputSink, C: Clock> RealtimeEnv<F, I, C> {
    /// Build an environment from a validated configuration
    pub fn new(
        config: GameConfig,
        templates: TemplateSet,
        source: F,
        input: I,
        clock: C,
    ) -> Result<Self> {
        config.validate()?;
        let profile = config.action_profile()?;
        let categories = profile.category_table();

        tracing::info!(
            "{} environment: {} actions, {:?} movement, frame skip {}, regions [goal: {}, health: {}, player: {}]",
            profile.name(),
            profile.cardinality(),
            config.executor.movement_policy,
            config.episode.frame_skip,
            config.regions.goal_bar.is_some(),
            config.regions.health_bar.is_some(),
            config.regions.player.is_some(),
        );

        Ok(Self {
            executor: ActionExecutor::new(profile, config.executor),
            reward: RewardEngine::new(config.reward, config.regions, categories),
            watchdog: ThreatWatchdog::new(config.watchdog, templates),
            observations: ObservationBuilder::new(config.observation),
            history: ActionHistory::new(config.episode.history),
            episode_config: config.episode,
            source,
            input,
            clock,
            episode: Episode::default(),
            last_frame: None,
            action_counts: vec![0; ActionId::COUNT],
            stop: StopSignal::new(),
            stats: None,
        })
    }

    /// Build an environment whose watchdog templates are read from the image
    /// files named in `config.watchdog.templates`
    pub fn from_config(config: GameConfig, source: F, input: I, clock: C) -> Result<Self> {
        let templates = TemplateSet::load(&config.watchdog.templates);
        Self::new(config, templates, source, input, clock)
    }

    /// Replace the watchdog (e.g. one with a custom matcher)
    pub fn with_watchdog(mut self, watchdog: ThreatWatchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Publish a snapshot after every step
    pub fn with_stats(mut self, publisher: StatsPublisher) -> Self {
        self.stats = Some(publisher);
        self
    }

    /// Use an externally owned stop signal
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for cancelling the running step from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Current episode counters
    pub fn episode(&self) -> Episode {
        self.episode
    }

    /// Actions executed this episode
    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// Input timing and held-key state
    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Reward engine state
    pub fn reward_engine(&self) -> &RewardEngine {
        &self.reward
    }

    /// Threat watchdog state
    pub fn watchdog(&self) -> &ThreatWatchdog {
        &self.watchdog
    }

    /// Input device
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Frame source
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of times each action id was requested
    pub fn action_counts(&self) -> &[u64] {
        &self.action_counts
    }

    /// Copy of the counters for monitoring
    pub fn snapshot(&self, step_reward: f64) -> EpisodeSnapshot {
        EpisodeSnapshot {
            episode: self.episode.number,
            step: self.episode.steps,
            step_reward,
            episode_reward: self.episode.reward,
            action_counts: self.action_counts.clone(),
            threat_triggers: self.watchdog.triggers(),
            escapes: self.watchdog.escapes(),
            stuck_count: self.reward.stuck_count(),
        }
    }

    fn release_all(&mut self) -> usize {
        self.executor.close(&mut self.input)
    }

    fn begin_episode(&mut self) -> Result<Observation> {
        let policy = self.episode_config.reset;
        self.executor.reset(policy.clear_cooldowns);
        if policy.clear_threat_state {
            self.watchdog.reset();
        }
        self.reward.reset();
        self.history.clear();
        self.episode = Episode { number: self.episode.number + 1, steps: 0, reward: 0.0 };

        let frame = self.source.capture()?;
        self.observations.reset(&frame);
        self.last_frame = Some(frame);
        tracing::debug!("episode {} started", self.episode.number);
        Ok(self.observations.get())
    }

    /// Run the inner iterations; returns (breakdown, terminated, truncated, threat)
    fn run_iterations(&mut self, action: Option<ActionId>) -> Result<(RewardBreakdown, bool, bool, bool)> {
        let settle = secs(self.episode_config.settle_secs);
        let mut breakdown = RewardBreakdown::default();
        let mut terminated = self.episode.steps >= self.episode_config.max_steps;
        let mut truncated = false;
        let mut threat = false;

        for _ in 0..self.episode_config.frame_skip {
            if terminated {
                break;
            }
            if self.stop.is_stopped() {
                tracing::info!("stop requested at step {}", self.episode.steps);
                truncated = true;
                break;
            }

            self.executor.execute(action, &mut self.input, &mut self.clock)?;
            self.clock.sleep(settle);
            let frame = self.source.capture()?;

            let check = self.watchdog.check(&frame, &mut self.source, &mut self.input, &mut self.clock);
            threat |= check.triggered();

            let Some(previous) = self.last_frame.as_ref() else {
                bail!("environment not reset");
            };
            breakdown += self.reward.compute(action, previous, &frame, &self.history)?;
            if let Some(id) = action {
                self.history.push(id);
            }

            self.observations.push(&frame);
            self.last_frame = Some(frame);
            self.episode.steps += 1;
            terminated = self.episode.steps >= self.episode_config.max_steps;
        }
        Ok((breakdown, terminated, truncated, threat))
    }
}

impl<F: FrameSource, I: InputSink, C: Clock> Environment for RealtimeEnv<F, I, C> {
    type Observation = Observation;
    type Action = i64;

    fn reset(&mut self) -> Result<Self::Observation> {
        self.release_all();
        self.begin_episode()
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        if self.last_frame.is_none() {
            bail!("step called before reset");
        }
        let id = ActionId::from_raw(action);
        match id {
            Some(id) => self.action_counts[id.index()] += 1,
            None => tracing::debug!("action {} out of range; treated as idle", action),
        }

        let (breakdown, terminated, truncated, threat) = match self.run_iterations(id) {
            Ok(result) => result,
            Err(e) => {
                let released = self.release_all();
                tracing::error!("step failed, released {} held key(s): {:#}", released, e);
                return Err(e);
            }
        };

        let reward = breakdown.total();
        self.episode.reward += reward;
        if terminated || truncated {
            self.release_all();
            tracing::info!(
                "episode {} {} after {} steps, reward {:.2}",
                self.episode.number,
                if terminated { "finished" } else { "stopped" },
                self.episode.steps,
                self.episode.reward
            );
        }

        if self.stats.is_some() {
            let snapshot = self.snapshot(reward);
            if let Some(stats) = self.stats.as_mut() {
                stats.publish(snapshot);
            }
        }

        Ok(StepResult {
            observation: self.observations.get(),
            reward: reward as f32,
            terminated,
            truncated,
            info: StepInfo {
                step: self.episode.steps,
                episode_reward: self.episode.reward,
                episode: self.episode.number,
                breakdown,
                threat,
            },
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: self.observations.config().shape(), dtype: SpaceType::Continuous }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], dtype: SpaceType::Discrete(self.executor.profile().cardinality()) }
    }

    fn close(&mut self) -> Result<()> {
        let released = self.release_all();
        tracing::info!("environment closed, released {} held key(s)", released);
        Ok(())
    }
}

impl<F: FrameSource, I: InputSink, C: Clock> Drop for RealtimeEnv<F, I, C> {
    fn drop(&mut self) {
        self.release_all();
    }
}
