//! Action execution: abstract action ids to timed key events
//!
//! The executor owns the two pieces of input bookkeeping the control loop
//! relies on:
//!
//! - [`HeldKeySet`]: movement keys currently pushed down. Under the
//!   continuous-hold policy a movement key stays down across steps until an
//!   idle action or a different movement action replaces it. At most one
//!   movement key is held at a time.
//! - [`CooldownTable`]: last firing time of every cooldown-gated action.
//!   A gated action with cooldown `C` never fires twice within `C`.
//!
//! Key events go to an [`InputSink`]; dwell times are slept through a
//! [`Clock`], so tests can observe timing without real delays.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use anyhow::{Result, bail};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{
    action::{ActionCategory, ActionId, ActionProfile, Direction},
    clock::{Clock, secs},
    devices::{InputSink, Key},
};

/// How movement actions drive their key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPolicy {
    /// Press once and keep the key down until idle or another direction
    #[default]
    ContinuousHold,
    /// Press, dwell briefly, release on every step
    Tap,
}

/// Timing parameters of the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Movement policy
    pub movement_policy: MovementPolicy,

    /// Dwell of a tapped movement key
    pub movement_tap_secs: f64,

    /// How long the teleport chord is held
    pub teleport_hold_secs: f64,

    /// Dwell used when a tapped action declares no press duration
    pub default_tap_secs: f64,

    /// Random variation of dwell times as a fraction (0 disables)
    pub humanlike_jitter: f64,

    /// Shortest dwell after jitter is applied
    pub min_dwell_secs: f64,

    /// Direction remembered at construction and after reset
    pub initial_direction: Direction,

    /// Seed for the jitter generator (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            movement_policy: MovementPolicy::ContinuousHold,
            movement_tap_secs: 0.05,
            teleport_hold_secs: 0.1,
            default_tap_secs: 0.05,
            humanlike_jitter: 0.0,
            min_dwell_secs: 0.01,
            initial_direction: Direction::Right,
            seed: None,
        }
    }
}

impl ExecutorConfig {
    /// Validate timing parameters
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("movement_tap_secs", self.movement_tap_secs),
            ("teleport_hold_secs", self.teleport_hold_secs),
            ("default_tap_secs", self.default_tap_secs),
            ("min_dwell_secs", self.min_dwell_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number of seconds", name);
            }
        }
        if !(0.0..1.0).contains(&self.humanlike_jitter) {
            bail!("humanlike_jitter must be in [0, 1)");
        }
        Ok(())
    }

    /// Set the movement policy
    pub fn movement_policy(mut self, policy: MovementPolicy) -> Self {
        self.movement_policy = policy;
        self
    }

    /// Set the humanlike jitter fraction
    pub fn humanlike_jitter(mut self, jitter: f64) -> Self {
        self.humanlike_jitter = jitter;
        self
    }

    /// Set the jitter seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Last firing time of each cooldown-gated action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownTable {
    last_fire: BTreeMap<ActionId, Duration>,
}

impl CooldownTable {
    /// Whether `id` may fire at `now` given its `cooldown`
    pub fn ready(&self, id: ActionId, cooldown: Duration, now: Duration) -> bool {
        self.remaining(id, cooldown, now).is_zero()
    }

    /// Time left before `id` may fire again
    pub fn remaining(&self, id: ActionId, cooldown: Duration, now: Duration) -> Duration {
        match self.last_fire.get(&id) {
            Some(&last) => cooldown.saturating_sub(now.saturating_sub(last)),
            None => Duration::ZERO,
        }
    }

    /// Record a firing of `id` at `now`
    pub fn record(&mut self, id: ActionId, now: Duration) {
        self.last_fire.insert(id, now);
    }

    /// Last firing of `id`
    pub fn last_fire(&self, id: ActionId) -> Option<Duration> {
        self.last_fire.get(&id).copied()
    }

    /// Forget every firing
    pub fn clear(&mut self) {
        self.last_fire.clear();
    }
}

/// Movement keys currently held down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldKeySet {
    keys: BTreeSet<Key>,
}

impl HeldKeySet {
    /// Whether `key` is held
    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of held keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Held keys in order
    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    fn insert(&mut self, key: Key) {
        self.keys.insert(key);
    }

    fn remove(&mut self, key: &Key) {
        self.keys.remove(key);
    }

    fn snapshot(&self) -> Vec<Key> {
        self.keys.iter().cloned().collect()
    }
}

/// What a call to [`ActionExecutor::execute`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Id unknown to the profile (or disabled); nothing happened
    Unbound,
    /// Held movement keys were released
    Idle {
        /// Number of keys released
        released: usize,
    },
    /// A movement key was pushed and is now held
    MoveHeld {
        /// Newly held key
        key: Key,
        /// Key released to make room for it
        replaced: Option<Key>,
    },
    /// The requested movement key was already held
    MoveAlreadyHeld,
    /// A movement key was tapped
    MoveTapped,
    /// Attack key pressed, held for its dwell, released
    Attack,
    /// Direction + teleport chord
    Teleport {
        /// Direction used for the chord
        direction: Direction,
    },
    /// Gated or plain tap fired
    Tapped,
    /// Gated action still cooling down; nothing happened
    OnCooldown {
        /// Time left before it may fire
        remaining: Duration,
    },
}

impl Execution {
    /// Whether no input event was emitted
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Execution::Unbound
                | Execution::MoveAlreadyHeld
                | Execution::OnCooldown { .. }
                | Execution::Idle { released: 0 }
        )
    }
}

/// Translates action ids into key events for one profile
#[derive(Debug)]
pub struct ActionExecutor {
    profile: ActionProfile,
    config: ExecutorConfig,
    held: HeldKeySet,
    cooldowns: CooldownTable,
    last_direction: Direction,
    rng: StdRng,
}

impl ActionExecutor {
    /// Create an executor for `profile`
    pub fn new(profile: ActionProfile, config: ExecutorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let last_direction = config.initial_direction;
        Self {
            profile,
            config,
            held: HeldKeySet::default(),
            cooldowns: CooldownTable::default(),
            last_direction,
            rng,
        }
    }

    /// Action table in use
    pub fn profile(&self) -> &ActionProfile {
        &self.profile
    }

    /// Keys currently held
    pub fn held(&self) -> &HeldKeySet {
        &self.held
    }

    /// Cooldown bookkeeping
    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Direction a teleport will use
    pub fn last_direction(&self) -> Direction {
        self.last_direction
    }

    /// Execute `action` (a `None` id is treated as unbound).
    ///
    /// On an input error any key pressed by this call is released before the
    /// error is returned; keys held from earlier steps stay in the held set
    /// for [`close`](Self::close) to release.
    pub fn execute(
        &mut self,
        action: Option<ActionId>,
        input: &mut dyn InputSink,
        clock: &mut dyn Clock,
    ) -> Result<Execution> {
        let Some(binding) = action.and_then(|id| self.profile.get(id)).cloned() else {
            return Ok(Execution::Unbound);
        };

        match binding.category {
            ActionCategory::Idle => Ok(Execution::Idle { released: self.release_held(input)? }),
            ActionCategory::Movement => {
                let (Some(key), Some(direction)) = (binding.key, binding.direction) else {
                    return Ok(Execution::Unbound);
                };
                self.last_direction = direction;
                match self.config.movement_policy {
                    MovementPolicy::ContinuousHold => self.hold_movement(key, input),
                    MovementPolicy::Tap => {
                        self.release_held(input)?;
                        let dwell = self.dwell(secs(self.config.movement_tap_secs));
                        tap_chord(&[key], dwell, input, clock)?;
                        Ok(Execution::MoveTapped)
                    }
                }
            }
            ActionCategory::Attack => {
                let Some(key) = binding.key else { return Ok(Execution::Unbound) };
                let dwell = self.dwell(self.or_default_tap(binding.press));
                tap_chord(&[key], dwell, input, clock)?;
                Ok(Execution::Attack)
            }
            ActionCategory::Teleport => {
                let Some(key) = binding.key else { return Ok(Execution::Unbound) };
                self.teleport(key, input, clock)
            }
            ActionCategory::Buff => {
                let Some(key) = binding.key else { return Ok(Execution::Unbound) };
                let now = clock.now();
                let remaining = self.cooldowns.remaining(binding.id, binding.cooldown, now);
                if !remaining.is_zero() {
                    tracing::debug!(
                        "{} on cooldown for another {:.1}s",
                        binding.name,
                        remaining.as_secs_f64()
                    );
                    return Ok(Execution::OnCooldown { remaining });
                }
                let dwell = self.dwell(self.or_default_tap(binding.press));
                tap_chord(&[key], dwell, input, clock)?;
                self.cooldowns.record(binding.id, now);
                tracing::debug!("{} fired", binding.name);
                Ok(Execution::Tapped)
            }
            ActionCategory::Jump => {
                let Some(key) = binding.key else { return Ok(Execution::Unbound) };
                let dwell = self.dwell(self.or_default_tap(binding.press));
                tap_chord(&[key], dwell, input, clock)?;
                Ok(Execution::Tapped)
            }
        }
    }

    /// Release every held key.
    ///
    /// Release failures are logged and do not stop the remaining releases.
    /// A key whose release failed stays in the held set so the next teardown
    /// tries it again. Returns the number of keys released.
    pub fn close(&mut self, input: &mut dyn InputSink) -> usize {
        let mut released = 0;
        for key in self.held.snapshot() {
            match input.release(&key) {
                Ok(()) => {
                    self.held.remove(&key);
                    released += 1;
                }
                Err(e) => tracing::warn!("failed to release '{}' during teardown: {}", key, e),
            }
        }
        if released > 0 {
            tracing::debug!("released {} held key(s)", released);
        }
        released
    }

    /// Restore the remembered direction and optionally forget cooldowns.
    ///
    /// Held keys are not touched; call [`close`](Self::close) first.
    pub fn reset(&mut self, clear_cooldowns: bool) {
        self.last_direction = self.config.initial_direction;
        if clear_cooldowns {
            self.cooldowns.clear();
        }
    }

    fn hold_movement(&mut self, key: Key, input: &mut dyn InputSink) -> Result<Execution> {
        if self.held.contains(&key) {
            return Ok(Execution::MoveAlreadyHeld);
        }
        let mut replaced = None;
        for old in self.held.snapshot() {
            input.release(&old)?;
            self.held.remove(&old);
            replaced = Some(old);
        }
        input.press(&key)?;
        self.held.insert(key.clone());
        Ok(Execution::MoveHeld { key, replaced })
    }

    fn teleport(
        &mut self,
        key: Key,
        input: &mut dyn InputSink,
        clock: &mut dyn Clock,
    ) -> Result<Execution> {
        let direction = self.last_direction;
        let dwell = self.dwell(secs(self.config.teleport_hold_secs));
        match self.profile.movement_key(direction).cloned() {
            // Direction already held: only the teleport key needs a tap
            Some(dir_key) if self.held.contains(&dir_key) => tap_chord(&[key], dwell, input, clock)?,
            Some(dir_key) => tap_chord(&[dir_key, key], dwell, input, clock)?,
            None => {
                tracing::warn!("no movement key bound for {:?}; teleporting in place", direction);
                tap_chord(&[key], dwell, input, clock)?;
            }
        }
        Ok(Execution::Teleport { direction })
    }

    fn release_held(&mut self, input: &mut dyn InputSink) -> Result<usize> {
        let mut released = 0;
        let mut first_err = None;
        for key in self.held.snapshot() {
            match input.release(&key) {
                Ok(()) => {
                    self.held.remove(&key);
                    released += 1;
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(released),
        }
    }

    fn or_default_tap(&self, press: Duration) -> Duration {
        if press.is_zero() { secs(self.config.default_tap_secs) } else { press }
    }

    /// Apply humanlike variation; very short dwells are left untouched
    fn dwell(&mut self, base: Duration) -> Duration {
        let jitter = self.config.humanlike_jitter;
        if jitter <= 0.0 || base < Duration::from_millis(50) {
            return base;
        }
        let factor = 1.0 + self.rng.gen_range(-jitter..jitter);
        secs((base.as_secs_f64() * factor).max(self.config.min_dwell_secs))
    }
}

/// Press `keys` in order, hold for `dwell`, release in reverse order.
///
/// If a press fails, the keys already pressed are released before the error
/// is returned. Every release is attempted even if an earlier one fails.
fn tap_chord(
    keys: &[Key],
    dwell: Duration,
    input: &mut dyn InputSink,
    clock: &mut dyn Clock,
) -> Result<()> {
    for (i, key) in keys.iter().enumerate() {
        if let Err(e) = input.press(key) {
            for pressed in keys[..i].iter().rev() {
                if let Err(release_err) = input.release(pressed) {
                    tracing::warn!("failed to release '{}': {}", pressed, release_err);
                }
            }
            return Err(e);
        }
    }
    clock.sleep(dwell);
    let mut first_err = None;
    for key in keys.iter().rev() {
        if let Err(e) = input.release(key) {
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
