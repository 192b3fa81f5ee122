//! Game configuration: action tables, timings, regions and calibration
//!
//! A [`GameConfig`] is plain data. It is either built from a [`Preset`] or
//! read from JSON, optionally layered:
//!
//! ```text
//! base.json ──deep merge──▶ overlay.json ──▶ GameConfig ──validate()──▶ env
//! ```
//!
//! Objects merge key by key; any other value (including arrays such as the
//! action list) in the overlay replaces the base value. A document may start
//! with `"preset": "melee"` or `"preset": "caster"` to use that preset as the
//! layer underneath it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::env::{
    action::{ActionCategory, ActionProfile, ActionSpec, Direction},
    executor::{ExecutorConfig, MovementPolicy},
    observation::ObservationConfig,
    reward::{RegionConfig, RewardConfig},
    watchdog::WatchdogConfig,
};

/// Built-in game profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Eight actions: four directions, attack, skill, jump
    Melee,
    /// Eleven actions: horizontal movement, teleport, attack, buffs, summon
    Caster,
}

/// Named action table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name used in logs
    pub name: String,
    /// Every action id the policy may emit
    pub actions: Vec<ActionSpec>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self::caster()
    }
}

impl ProfileConfig {
    /// Melee action table
    pub fn melee() -> Self {
        use ActionCategory::*;
        Self {
            name: "melee".to_string(),
            actions: vec![
                ActionSpec::new(0, "idle", Idle),
                ActionSpec::new(1, "move_left", Movement).key("left").direction(Direction::Left),
                ActionSpec::new(2, "move_right", Movement).key("right").direction(Direction::Right),
                ActionSpec::new(3, "move_up", Movement).key("up").direction(Direction::Up),
                ActionSpec::new(4, "move_down", Movement).key("down").direction(Direction::Down),
                ActionSpec::new(5, "attack", Attack).key("ctrl").press_secs(0.2),
                ActionSpec::new(6, "skill", Attack).key("a").press_secs(0.15),
                ActionSpec::new(7, "jump", Jump).key("alt").press_secs(0.1),
            ],
        }
    }

    /// Caster action table. Vertical movement is declared but disabled so
    /// the character never walks into portals.
    pub fn caster() -> Self {
        use ActionCategory::*;
        Self {
            name: "caster".to_string(),
            actions: vec![
                ActionSpec::new(0, "idle", Idle),
                ActionSpec::new(1, "move_left", Movement).key("left").direction(Direction::Left),
                ActionSpec::new(2, "move_right", Movement).key("right").direction(Direction::Right),
                ActionSpec::new(3, "teleport", Teleport).key("v"),
                ActionSpec::new(4, "attack", Attack).key("a").press_secs(0.3),
                ActionSpec::new(5, "buff_holy", Buff).key("d").press_secs(0.05).cooldown_secs(120.0),
                ActionSpec::new(6, "buff_bless", Buff).key("shift").press_secs(0.05).cooldown_secs(180.0),
                ActionSpec::new(7, "buff_invincible", Buff).key("alt").press_secs(0.05).cooldown_secs(300.0),
                ActionSpec::new(8, "move_up", Movement).key("up").direction(Direction::Up).disabled(),
                ActionSpec::new(9, "move_down", Movement).key("down").direction(Direction::Down).disabled(),
                ActionSpec::new(10, "summon", Buff).key("home").press_secs(0.05).cooldown_secs(150.0),
            ],
        }
    }
}

/// What survives an episode reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetPolicy {
    /// Forget cooldown timers
    pub clear_cooldowns: bool,
    /// Forget the watchdog debounce counter and rate limit
    pub clear_threat_state: bool,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self { clear_cooldowns: true, clear_threat_state: false }
    }
}

/// Step loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Inner iterations per step
    pub frame_skip: usize,
    /// Inner iterations after which the episode terminates
    pub max_steps: usize,
    /// Pause between executing an action and capturing its result
    pub settle_secs: f64,
    /// Reset behaviour
    pub reset: ResetPolicy,
    /// Capacity of the action history
    pub history: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self { frame_skip: 4, max_steps: 1000, settle_secs: 0.01, reset: ResetPolicy::default(), history: 10 }
    }
}

/// Everything needed to build an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Action table
    pub profile: ProfileConfig,
    /// Frame stack
    pub observation: ObservationConfig,
    /// Step loop
    pub episode: EpisodeConfig,
    /// Input timing
    pub executor: ExecutorConfig,
    /// Screen regions for the reward terms
    pub regions: RegionConfig,
    /// Reward calibration
    pub reward: RewardConfig,
    /// Threat watchdog
    pub watchdog: WatchdogConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::preset(Preset::Caster)
    }
}

impl GameConfig {
    /// Configuration of a built-in profile
    pub fn preset(preset: Preset) -> Self {
        let (profile, reward) = match preset {
            Preset::Melee => (ProfileConfig::melee(), RewardConfig::melee()),
            Preset::Caster => (ProfileConfig::caster(), RewardConfig::caster()),
        };
        Self {
            profile,
            observation: ObservationConfig::default(),
            episode: EpisodeConfig::default(),
            executor: ExecutorConfig::default(),
            regions: RegionConfig::default(),
            reward,
            watchdog: WatchdogConfig::default(),
        }
    }

    /// Parse a JSON document (see the module docs for `preset`)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("invalid configuration JSON")?;
        Self::from_value(value)
    }

    /// Load `base`, deep-merge `overlay` on top and validate.
    ///
    /// A missing base file is an error; a missing overlay file is logged
    /// and skipped.
    pub fn load<P: AsRef<Path>>(base: P, overlay: Option<P>) -> Result<Self> {
        let base = base.as_ref();
        let mut value = read_json(base)?;

        if let Some(overlay) = overlay {
            let overlay = overlay.as_ref();
            if overlay.exists() {
                merge_json(&mut value, expand_preset(read_json(overlay)?)?);
                tracing::info!("applied config overlay {}", overlay.display());
            } else {
                tracing::warn!("config overlay {} not found; using base only", overlay.display());
            }
        }

        let config = Self::from_value(value)?;
        config.validate().with_context(|| format!("invalid configuration in {}", base.display()))?;
        tracing::info!(
            "loaded profile '{}' ({} actions) from {}",
            config.profile.name,
            config.profile.actions.len(),
            base.display()
        );
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Validated action table
    pub fn action_profile(&self) -> Result<ActionProfile> {
        ActionProfile::from_specs(&self.profile.name, &self.profile.actions, self.executor.initial_direction)
    }

    /// Fail fast on anything the environment could not run with
    pub fn validate(&self) -> Result<()> {
        self.action_profile()?;
        self.observation.validate()?;
        if self.episode.frame_skip == 0 {
            return Err(anyhow!("episode.frame_skip must be positive"));
        }
        if self.episode.max_steps == 0 {
            return Err(anyhow!("episode.max_steps must be positive"));
        }
        if self.episode.history == 0 {
            return Err(anyhow!("episode.history must be positive"));
        }
        if !self.episode.settle_secs.is_finite() || self.episode.settle_secs < 0.0 {
            return Err(anyhow!("episode.settle_secs must be non-negative"));
        }
        self.executor.validate()?;
        self.reward.validate()?;
        self.watchdog.validate()?;
        Ok(())
    }

    /// Set the frame skip
    pub fn frame_skip(mut self, frame_skip: usize) -> Self {
        self.episode.frame_skip = frame_skip;
        self
    }

    /// Set the step budget
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.episode.max_steps = max_steps;
        self
    }

    /// Set the settle delay
    pub fn settle_secs(mut self, secs: f64) -> Self {
        self.episode.settle_secs = secs;
        self
    }

    /// Set the reset policy
    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.episode.reset = policy;
        self
    }

    /// Set the movement policy
    pub fn movement_policy(mut self, policy: MovementPolicy) -> Self {
        self.executor.movement_policy = policy;
        self
    }

    /// Set the reward regions
    pub fn regions(mut self, regions: RegionConfig) -> Self {
        self.regions = regions;
        self
    }

    /// Set the observation geometry
    pub fn observation(mut self, observation: ObservationConfig) -> Self {
        self.observation = observation;
        self
    }

    /// Set the watchdog parameters
    pub fn watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Seed the executor's jitter generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.executor.seed = Some(seed);
        self
    }

    fn from_value(value: Value) -> Result<Self> {
        let value = expand_preset(value)?;
        serde_json::from_value(value).context("configuration does not match the expected schema")
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Replace a top-level `"preset"` key with the preset's full document
fn expand_preset(mut value: Value) -> Result<Value> {
    let Some(object) = value.as_object_mut() else {
        return Err(anyhow!("configuration must be a JSON object"));
    };
    let Some(preset) = object.remove("preset") else {
        return Ok(value);
    };
    let preset: Preset = serde_json::from_value(preset).context("unknown preset")?;
    let mut layered = serde_json::to_value(GameConfig::preset(preset))?;
    merge_json(&mut layered, value);
    Ok(layered)
}

/// Recursively merge `overlay` into `base`
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Conventional location of a game's overlay file next to a base config
pub fn overlay_path(base: &Path, game: &str) -> PathBuf {
    base.with_file_name(format!("{}.json", game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::action::ActionId;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Melee, Preset::Caster] {
            let config = GameConfig::preset(preset);
            config.validate().unwrap();
        }
        assert_eq!(GameConfig::preset(Preset::Melee).action_profile().unwrap().cardinality(), 8);
        assert_eq!(GameConfig::preset(Preset::Caster).action_profile().unwrap().cardinality(), 11);
    }

    #[test]
    fn test_caster_vertical_movement_disabled() {
        let profile = GameConfig::preset(Preset::Caster).action_profile().unwrap();
        assert!(profile.get(ActionId::new(8).unwrap()).is_none());
        assert!(profile.get(ActionId::new(9).unwrap()).is_none());
        assert_eq!(profile.category(ActionId::new(10).unwrap()), Some(ActionCategory::Buff));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = GameConfig::preset(Preset::Melee).frame_skip(2);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(GameConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_preset_key_with_overrides() {
        let config = GameConfig::from_json_str(
            r#"{"preset": "melee", "episode": {"max_steps": 50}, "regions": {"goal_bar": {"x": 1, "y": 2, "w": 3, "h": 4}}}"#,
        )
        .unwrap();
        assert_eq!(config.profile.name, "melee");
        assert_eq!(config.episode.max_steps, 50);
        assert_eq!(config.episode.frame_skip, 4);
        assert_eq!(config.reward, RewardConfig::melee());
        assert_eq!(config.regions.goal_bar.map(|r| r.w), Some(3));
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(GameConfig::from_json_str(r#"{"preset": "archer"}"#).is_err());
        assert!(GameConfig::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn test_merge_json_semantics() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "list": [1, 2, 3], "keep": true});
        merge_json(&mut base, json!({"a": {"y": 20, "z": 30}, "list": [9]}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 20, "z": 30}, "list": [9], "keep": true}));
    }

    #[test]
    fn test_layered_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("base.json");
        GameConfig::preset(Preset::Caster).save_json(&base)?;

        let overlay = overlay_path(&base, "caster_hard");
        let mut file = fs::File::create(&overlay)?;
        write!(file, r#"{{"watchdog": {{"threat_threshold": 0.8}}, "episode": {{"frame_skip": 2}}}}"#)?;

        let config = GameConfig::load(&base, Some(&overlay))?;
        assert_eq!(config.watchdog.threat_threshold, 0.8);
        assert_eq!(config.watchdog.confirmations, 2);
        assert_eq!(config.episode.frame_skip, 2);
        assert_eq!(config.profile.actions.len(), 11);
        Ok(())
    }

    #[test]
    fn test_missing_overlay_is_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("base.json");
        GameConfig::preset(Preset::Melee).save_json(&base)?;
        let missing = dir.path().join("nope.json");

        let config = GameConfig::load(&base, Some(&missing))?;
        assert_eq!(config.profile.name, "melee");
        Ok(())
    }

    #[test]
    fn test_missing_base_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GameConfig::load(dir.path().join("absent.json"), None).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read config"));
    }

    #[test]
    fn test_invalid_overlay_fails_validation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("base.json");
        GameConfig::preset(Preset::Caster).save_json(&base)?;
        let overlay = dir.path().join("bad.json");
        fs::write(&overlay, r#"{"episode": {"frame_skip": 0}}"#)?;

        assert!(GameConfig::load(&base, Some(&overlay)).is_err());
        Ok(())
    }

    #[test]
    fn test_validation_catches_bad_profiles() {
        let mut config = GameConfig::preset(Preset::Caster);
        config.profile.actions[4].key = None;
        assert!(config.validate().is_err());

        let mut config = GameConfig::preset(Preset::Caster);
        config.profile.actions[5].cooldown_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::preset(Preset::Caster);
        config.executor.initial_direction = Direction::Up;
        assert!(config.validate().is_err(), "teleport needs a bound initial direction");

        let mut config = GameConfig::preset(Preset::Melee);
        config.watchdog.confirmations = 0;
        assert!(config.validate().is_err());

        let config = GameConfig::preset(Preset::Melee).max_steps(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_action_spec_json_shape() {
        let config = GameConfig::from_json_str(
            r#"{
                "profile": {
                    "name": "custom",
                    "actions": [
                        {"id": 0, "name": "idle", "category": "idle"},
                        {"id": 1, "name": "left", "category": "movement", "key": "a", "direction": "left"},
                        {"id": 2, "name": "hit", "category": "attack", "key": "j", "press_secs": 0.2}
                    ]
                }
            }"#,
        )
        .unwrap();
        let profile = config.action_profile().unwrap();
        assert_eq!(profile.cardinality(), 3);
        assert_eq!(profile.movement_key(Direction::Left).map(|k| k.as_str()), Some("a"));
    }
}
