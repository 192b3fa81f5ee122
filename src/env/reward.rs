//! Heuristic reward from frame deltas, region colors and action patterns
//!
//! Each step's reward is the sum of five independent terms:
//!
//! | term     | signal                                                    |
//! |----------|-----------------------------------------------------------|
//! | goal     | growth of the goal bar's colored pixel count              |
//! | change   | mean frame difference: stuck, impact, static screen       |
//! | sequence | action-pair combos and a monotony penalty                 |
//! | base     | fixed constant per action category                        |
//! | damage   | red pixels lost from the health bar or flashing on player |
//!
//! Terms read disjoint parts of the engine state, so evaluation order has no
//! effect on the total.

use std::{
    collections::VecDeque,
    ops::{Add, AddAssign},
};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::action::{ActionCategory, ActionId};
use crate::vision::{Frame, HsvRange, Roi, count_in_ranges, mean_abs_diff};

/// Default number of remembered actions
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded, insertion-ordered record of recently executed actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHistory {
    entries: VecDeque<ActionId>,
    capacity: usize,
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ActionHistory {
    /// Create an empty history holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append an action, evicting the oldest entry when full
    pub fn push(&mut self, action: ActionId) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(action);
    }

    /// Most recent action
    pub fn last(&self) -> Option<ActionId> {
        self.entries.back().copied()
    }

    /// Up to `n` most recent actions, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = ActionId> + '_ {
        self.entries.iter().skip(self.entries.len().saturating_sub(n)).copied()
    }

    /// All entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.entries.iter().copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Screen regions read by the reward terms; an absent region disables the
/// terms that read it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Bar that grows when the goal signal (experience) increases
    pub goal_bar: Option<Roi>,
    /// Health bar
    pub health_bar: Option<Roi>,
    /// Area around the player character
    pub player: Option<Roi>,
}

/// Goal-signal term parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSignalConfig {
    /// Colors counted in the goal bar
    pub ranges: Vec<HsvRange>,
    /// Pixel increase above which the large bonus applies
    pub large_increase: i64,
    /// Large bonus
    pub large_bonus: f64,
    /// Pixel increase above which the small bonus applies
    pub small_increase: i64,
    /// Small bonus
    pub small_bonus: f64,
}

impl Default for GoalSignalConfig {
    fn default() -> Self {
        Self {
            ranges: vec![HsvRange::new([20, 100, 100], [30, 255, 255])],
            large_increase: 10,
            large_bonus: 2.0,
            small_increase: 5,
            small_bonus: 0.5,
        }
    }
}

/// Change-magnitude term parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeConfig {
    /// Categories whose lack of visual change counts as stuck
    pub stuck_categories: Vec<ActionCategory>,
    /// Change below which a stuck-eligible action is stuck
    pub stuck_threshold: f64,
    /// Penalty for every stuck frame
    pub stuck_penalty: f64,
    /// Stuck count above which the escalation penalty is added
    pub stuck_escalation_after: u32,
    /// Extra penalty once escalated
    pub stuck_escalation_penalty: f64,
    /// Change above which an attack landed
    pub impact_threshold: f64,
    /// Bonus for a landed attack
    pub impact_bonus: f64,
    /// Change above which a teleport moved the view
    pub teleport_threshold: f64,
    /// Bonus for a successful teleport
    pub teleport_bonus: f64,
    /// Change below which the screen is static
    pub static_threshold: f64,
    /// Penalty for a static screen outside attacks
    pub static_penalty: f64,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            stuck_categories: vec![ActionCategory::Movement, ActionCategory::Teleport],
            stuck_threshold: 0.03,
            stuck_penalty: -0.8,
            stuck_escalation_after: 2,
            stuck_escalation_penalty: -1.2,
            impact_threshold: 0.1,
            impact_bonus: 0.4,
            teleport_threshold: 0.2,
            teleport_bonus: 0.3,
            static_threshold: 0.05,
            static_penalty: -0.1,
        }
    }
}

/// Bonus for one category transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboRule {
    /// Category of the previous action
    pub from: ActionCategory,
    /// Category of the current action
    pub to: ActionCategory,
    /// Bonus awarded
    pub bonus: f64,
}

impl ComboRule {
    /// Create a rule
    pub fn new(from: ActionCategory, to: ActionCategory, bonus: f64) -> Self {
        Self { from, to, bonus }
    }
}

/// Sequence term parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Transition bonuses; the first matching rule wins
    pub combos: Vec<ComboRule>,
    /// History length required before the term applies
    pub min_history: usize,
    /// Number of recent actions inspected for monotony
    pub monotony_window: usize,
    /// Penalty for repeating the same action over the whole window
    pub monotony_penalty: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        use ActionCategory::*;
        Self {
            combos: vec![
                ComboRule::new(Teleport, Attack, 0.8),
                ComboRule::new(Movement, Attack, 0.3),
                ComboRule::new(Attack, Movement, 0.2),
                ComboRule::new(Attack, Teleport, 0.2),
            ],
            min_history: 2,
            monotony_window: 5,
            monotony_penalty: -0.15,
        }
    }
}

/// Fixed reward per action category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseRewardConfig {
    /// Idle
    pub idle: f64,
    /// Movement
    pub movement: f64,
    /// Attack or skill
    pub attack: f64,
    /// Teleport
    pub teleport: f64,
    /// Cooldown-gated tap
    pub buff: f64,
    /// Jump
    pub jump: f64,
}

impl Default for BaseRewardConfig {
    fn default() -> Self {
        Self { idle: -0.3, movement: 0.08, attack: 0.6, teleport: 0.2, buff: 0.0, jump: 0.0 }
    }
}

impl BaseRewardConfig {
    /// Constant for `category`
    pub fn for_category(&self, category: ActionCategory) -> f64 {
        match category {
            ActionCategory::Idle => self.idle,
            ActionCategory::Movement => self.movement,
            ActionCategory::Attack => self.attack,
            ActionCategory::Teleport => self.teleport,
            ActionCategory::Buff => self.buff,
            ActionCategory::Jump => self.jump,
        }
    }
}

/// Damage term parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Colors of a filled health bar
    pub health_ranges: Vec<HsvRange>,
    /// Pixel drop above which damage was taken
    pub drop_threshold: i64,
    /// Penalty for a health drop
    pub drop_penalty: f64,
    /// Remaining pixels below which health is critical
    pub low_threshold: u64,
    /// Penalty while health is critical
    pub low_penalty: f64,
    /// Colors of a hit flash on the player
    pub flash_ranges: Vec<HsvRange>,
    /// Flash pixels above which the player was hit
    pub flash_threshold: u64,
    /// Penalty for a hit flash
    pub flash_penalty: f64,
}

impl Default for DamageConfig {
    fn default() -> Self {
        let low_red = HsvRange::new([0, 100, 100], [10, 255, 255]);
        Self {
            health_ranges: vec![low_red, HsvRange::new([170, 100, 100], [180, 255, 255])],
            drop_threshold: 50,
            drop_penalty: -0.5,
            low_threshold: 100,
            low_penalty: -1.0,
            flash_ranges: vec![low_red],
            flash_threshold: 100,
            flash_penalty: -0.5,
        }
    }
}

/// Complete reward parameter set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Goal-signal term
    pub goal: GoalSignalConfig,
    /// Change-magnitude term
    pub change: ChangeConfig,
    /// Sequence term
    pub sequence: SequenceConfig,
    /// Base term
    pub base: BaseRewardConfig,
    /// Damage term
    pub damage: DamageConfig,
}

impl RewardConfig {
    /// Calibration for the caster profile (the default)
    pub fn caster() -> Self {
        Self::default()
    }

    /// Calibration for the melee profile
    pub fn melee() -> Self {
        use ActionCategory::*;
        Self {
            change: ChangeConfig {
                stuck_categories: vec![Movement],
                stuck_penalty: -0.5,
                stuck_escalation_after: 3,
                stuck_escalation_penalty: -0.8,
                impact_bonus: 0.3,
                teleport_bonus: 0.0,
                static_penalty: -0.08,
                ..ChangeConfig::default()
            },
            sequence: SequenceConfig {
                combos: vec![ComboRule::new(Movement, Attack, 0.4), ComboRule::new(Attack, Movement, 0.2)],
                monotony_penalty: -0.12,
                ..SequenceConfig::default()
            },
            base: BaseRewardConfig { idle: -0.25, movement: 0.1, attack: 0.5, teleport: 0.0, buff: 0.0, jump: 0.05 },
            ..Self::default()
        }
    }

    /// Check thresholds and windows
    pub fn validate(&self) -> Result<()> {
        let c = &self.change;
        for (name, value) in [
            ("stuck_threshold", c.stuck_threshold),
            ("impact_threshold", c.impact_threshold),
            ("teleport_threshold", c.teleport_threshold),
            ("static_threshold", c.static_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("reward.change.{} must be in [0, 1], got {}", name, value);
            }
        }
        if self.goal.small_increase > self.goal.large_increase {
            bail!("reward.goal.small_increase must not exceed large_increase");
        }
        if self.sequence.monotony_window == 0 {
            bail!("reward.sequence.monotony_window must be at least 1");
        }
        Ok(())
    }
}

/// Per-term reward contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Goal-signal term
    pub goal: f64,
    /// Change-magnitude term
    pub change: f64,
    /// Sequence term
    pub sequence: f64,
    /// Base term
    pub base: f64,
    /// Damage term
    pub damage: f64,
}

impl RewardBreakdown {
    /// Sum of all terms
    pub fn total(&self) -> f64 {
        self.goal + self.change + self.sequence + self.base + self.damage
    }
}

impl Add for RewardBreakdown {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for RewardBreakdown {
    fn add_assign(&mut self, rhs: Self) {
        self.goal += rhs.goal;
        self.change += rhs.change;
        self.sequence += rhs.sequence;
        self.base += rhs.base;
        self.damage += rhs.damage;
    }
}

/// Stateful reward computation for one profile
#[derive(Debug, Clone)]
pub struct RewardEngine {
    config: RewardConfig,
    regions: RegionConfig,
    categories: Vec<Option<ActionCategory>>,
    stuck_count: u32,
    last_goal_pixels: Option<u64>,
    last_health_pixels: Option<u64>,
}

impl RewardEngine {
    /// Create an engine. `categories` maps action index to category (see
    /// [`ActionProfile::category_table`](super::action::ActionProfile::category_table)).
    pub fn new(
        config: RewardConfig,
        regions: RegionConfig,
        categories: Vec<Option<ActionCategory>>,
    ) -> Self {
        if regions.goal_bar.is_none() {
            tracing::info!("no goal_bar region configured; goal-signal reward disabled");
        }
        Self {
            config,
            regions,
            categories,
            stuck_count: 0,
            last_goal_pixels: None,
            last_health_pixels: None,
        }
    }

    /// Parameters in use
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Consecutive stuck frames (decays by one on every other frame)
    pub fn stuck_count(&self) -> u32 {
        self.stuck_count
    }

    /// Forget all rolling state
    pub fn reset(&mut self) {
        self.stuck_count = 0;
        self.last_goal_pixels = None;
        self.last_health_pixels = None;
    }

    /// Reward for executing `action` between `previous` and `current`.
    ///
    /// `history` holds the actions executed before this one; the caller
    /// appends `action` afterwards.
    pub fn compute(
        &mut self,
        action: Option<ActionId>,
        previous: &Frame,
        current: &Frame,
        history: &ActionHistory,
    ) -> Result<RewardBreakdown> {
        let category = self.category(action);
        let change = mean_abs_diff(previous, current)?;
        Ok(RewardBreakdown {
            goal: self.goal_term(current),
            change: self.change_term(category, change),
            sequence: self.sequence_term(action, history),
            base: category.map_or(0.0, |c| self.config.base.for_category(c)),
            damage: self.damage_term(current),
        })
    }

    fn category(&self, action: Option<ActionId>) -> Option<ActionCategory> {
        action.and_then(|id| self.categories.get(id.index()).copied().flatten())
    }

    fn goal_term(&mut self, frame: &Frame) -> f64 {
        let Some(roi) = self.regions.goal_bar else { return 0.0 };
        let cfg = &self.config.goal;
        let pixels = count_in_ranges(frame, roi, &cfg.ranges);
        let previous = self.last_goal_pixels.replace(pixels);
        let Some(previous) = previous else { return 0.0 };

        let increase = pixels as i64 - previous as i64;
        let bonus = if increase > cfg.large_increase {
            cfg.large_bonus
        } else if increase > cfg.small_increase {
            cfg.small_bonus
        } else {
            0.0
        };
        if bonus > 0.0 {
            tracing::info!("goal signal +{} pixels, bonus {:.2}", increase, bonus);
        }
        bonus
    }

    fn change_term(&mut self, category: Option<ActionCategory>, change: f64) -> f64 {
        let cfg = &self.config.change;
        let mut reward = 0.0;

        let stuck_eligible = category.is_some_and(|c| cfg.stuck_categories.contains(&c));
        if stuck_eligible && change < cfg.stuck_threshold {
            self.stuck_count += 1;
            reward += cfg.stuck_penalty;
            if self.stuck_count > cfg.stuck_escalation_after {
                reward += cfg.stuck_escalation_penalty;
            }
            tracing::debug!("stuck ({} in a row, change {:.4})", self.stuck_count, change);
        } else {
            self.stuck_count = self.stuck_count.saturating_sub(1);
        }

        match category {
            Some(ActionCategory::Attack) if change > cfg.impact_threshold => reward += cfg.impact_bonus,
            Some(ActionCategory::Teleport) if change > cfg.teleport_threshold => {
                reward += cfg.teleport_bonus
            }
            _ => {}
        }

        if change < cfg.static_threshold && category != Some(ActionCategory::Attack) {
            reward += cfg.static_penalty;
        }
        reward
    }

    fn sequence_term(&self, action: Option<ActionId>, history: &ActionHistory) -> f64 {
        let cfg = &self.config.sequence;
        if history.len() < cfg.min_history {
            return 0.0;
        }
        let mut reward = 0.0;

        let previous = self.category(history.last());
        let current = self.category(action);
        if let (Some(from), Some(to)) = (previous, current) {
            if let Some(rule) = cfg.combos.iter().find(|r| r.from == from && r.to == to) {
                tracing::debug!("combo {:?} -> {:?} +{:.2}", from, to, rule.bonus);
                reward += rule.bonus;
            }
        }

        let mut window = history.recent(cfg.monotony_window);
        if let (Some(first), Some(action)) = (window.next(), action) {
            if first == action && window.all(|id| id == first) {
                reward += cfg.monotony_penalty;
            }
        }
        reward
    }

    fn damage_term(&mut self, frame: &Frame) -> f64 {
        let cfg = &self.config.damage;
        let mut reward = 0.0;

        if let Some(roi) = self.regions.health_bar {
            let pixels = count_in_ranges(frame, roi, &cfg.health_ranges);
            if let Some(previous) = self.last_health_pixels.replace(pixels) {
                let change = pixels as i64 - previous as i64;
                if change < -cfg.drop_threshold {
                    tracing::debug!("health dropped by {} pixels", -change);
                    reward += cfg.drop_penalty;
                } else if pixels < cfg.low_threshold {
                    reward += cfg.low_penalty;
                }
            }
        }

        if let Some(roi) = self.regions.player {
            if count_in_ranges(frame, roi, &cfg.flash_ranges) > cfg.flash_threshold {
                reward += cfg.flash_penalty;
            }
        }
        reward
    }
}
