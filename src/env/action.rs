//! Action identifiers and per-profile action tables
//!
//! Both game profiles share the id space `0..=10` but bind a different
//! number of ids to physical keys. A profile is declared as a list of
//! [`ActionSpec`]s and validated once into an [`ActionProfile`]; there is no
//! silent fallback binding at execution time.

use std::{collections::BTreeSet, fmt, time::Duration};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::{clock::secs, devices::Key};

/// Identifier of an abstract action (`0..=10`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(u8);

impl ActionId {
    /// Largest id any profile may bind
    pub const MAX: u8 = 10;

    /// Number of ids in the shared id space
    pub const COUNT: usize = Self::MAX as usize + 1;

    /// Create an id, rejecting values above [`ActionId::MAX`]
    pub fn new(id: u8) -> Option<Self> {
        (id <= Self::MAX).then_some(Self(id))
    }

    /// Convert a raw policy output
    pub fn from_raw(raw: i64) -> Option<Self> {
        u8::try_from(raw).ok().and_then(Self::new)
    }

    /// Position in per-id tables
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution and reward class of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Release held movement keys, press nothing
    Idle,
    /// Directional movement
    Movement,
    /// Press-and-dwell attack or skill
    Attack,
    /// Direction key plus teleport key chord
    Teleport,
    /// Cooldown-gated tap (buffs, summons)
    Buff,
    /// Plain tap without cooldown
    Jump,
}

/// Movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Left
    Left,
    /// Right
    Right,
    /// Up
    Up,
    /// Down
    Down,
}

/// Declarative action entry as it appears in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action id
    pub id: ActionId,

    /// Human-readable name used in logs
    pub name: String,

    /// Execution class
    pub category: ActionCategory,

    /// Bound key (required for everything but idle)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,

    /// Direction of a movement action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    /// Dwell between press and release
    #[serde(default)]
    pub press_secs: f64,

    /// Minimum time between two firings (buffs only)
    #[serde(default)]
    pub cooldown_secs: f64,

    /// Declared but never executed
    #[serde(default)]
    pub disabled: bool,
}

impl ActionSpec {
    /// Create an entry with no key, dwell or cooldown
    pub fn new(id: u8, name: &str, category: ActionCategory) -> Self {
        Self {
            id: ActionId(id.min(ActionId::MAX)),
            name: name.to_string(),
            category,
            key: None,
            direction: None,
            press_secs: 0.0,
            cooldown_secs: 0.0,
            disabled: false,
        }
    }

    /// Set the bound key
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(Key::new(key));
        self
    }

    /// Set the movement direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Set the press dwell in seconds
    pub fn press_secs(mut self, secs: f64) -> Self {
        self.press_secs = secs;
        self
    }

    /// Set the cooldown in seconds
    pub fn cooldown_secs(mut self, secs: f64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Mark the action as disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Validated, executable binding of one action id
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    /// Action id
    pub id: ActionId,
    /// Name used in logs
    pub name: String,
    /// Execution class
    pub category: ActionCategory,
    /// Bound key (`None` only for idle)
    pub key: Option<Key>,
    /// Direction of a movement action
    pub direction: Option<Direction>,
    /// Dwell between press and release
    pub press: Duration,
    /// Cooldown (zero when not gated)
    pub cooldown: Duration,
}

/// Exhaustive action table of one game profile
#[derive(Debug, Clone)]
pub struct ActionProfile {
    name: String,
    cardinality: usize,
    bindings: Vec<Option<ActionBinding>>,
}

impl ActionProfile {
    /// Validate `specs` into an executable table.
    ///
    /// Ids must be unique and contiguous from zero. Every enabled non-idle
    /// action needs a key; movement needs a direction; buffs need a positive
    /// cooldown; a teleport needs a movement binding for `initial_direction`.
    pub fn from_specs(
        name: &str,
        specs: &[ActionSpec],
        initial_direction: Direction,
    ) -> Result<Self> {
        if specs.is_empty() {
            bail!("profile '{}' declares no actions", name);
        }
        let mut bindings: Vec<Option<ActionBinding>> = vec![None; ActionId::COUNT];
        let mut seen = BTreeSet::new();

        for spec in specs {
            if spec.id.0 > ActionId::MAX {
                bail!("profile '{}': action id {} out of range 0..={}", name, spec.id, ActionId::MAX);
            }
            if !seen.insert(spec.id) {
                bail!("profile '{}': action id {} declared twice", name, spec.id);
            }
            validate_duration(name, spec, "press_secs", spec.press_secs)?;
            validate_duration(name, spec, "cooldown_secs", spec.cooldown_secs)?;

            if spec.disabled {
                tracing::debug!("profile '{}': action {} ({}) disabled", name, spec.id, spec.name);
                continue;
            }

            let key = match (&spec.key, spec.category) {
                (_, ActionCategory::Idle) => None,
                (Some(key), _) if !key.as_str().trim().is_empty() => Some(key.clone()),
                _ => bail!("profile '{}': action {} ({}) has no key binding", name, spec.id, spec.name),
            };
            if spec.category == ActionCategory::Movement && spec.direction.is_none() {
                bail!("profile '{}': movement action {} ({}) has no direction", name, spec.id, spec.name);
            }
            if spec.category == ActionCategory::Buff && spec.cooldown_secs <= 0.0 {
                bail!(
                    "profile '{}': cooldown-gated action {} ({}) needs a positive cooldown",
                    name,
                    spec.id,
                    spec.name
                );
            }

            bindings[spec.id.index()] = Some(ActionBinding {
                id: spec.id,
                name: spec.name.clone(),
                category: spec.category,
                key,
                direction: spec.direction,
                press: secs(spec.press_secs),
                cooldown: secs(spec.cooldown_secs),
            });
        }

        let cardinality = seen.len();
        if seen.iter().map(|id| id.index()).max() != Some(cardinality - 1) {
            bail!("profile '{}': action ids must be contiguous from 0", name);
        }

        let profile = Self { name: name.to_string(), cardinality, bindings };
        let has_teleport = profile.bindings().any(|b| b.category == ActionCategory::Teleport);
        if has_teleport && profile.movement_key(initial_direction).is_none() {
            bail!(
                "profile '{}': teleport needs a movement binding for the initial direction {:?}",
                name,
                initial_direction
            );
        }
        Ok(profile)
    }

    /// Profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared action ids (the discrete action space size)
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Binding for `id`, if the profile executes it
    pub fn get(&self, id: ActionId) -> Option<&ActionBinding> {
        self.bindings[id.index()].as_ref()
    }

    /// Category of `id`, if bound
    pub fn category(&self, id: ActionId) -> Option<ActionCategory> {
        self.get(id).map(|b| b.category)
    }

    /// All enabled bindings in id order
    pub fn bindings(&self) -> impl Iterator<Item = &ActionBinding> {
        self.bindings.iter().flatten()
    }

    /// Key of the movement action bound to `direction`
    pub fn movement_key(&self, direction: Direction) -> Option<&Key> {
        self.bindings()
            .find(|b| b.category == ActionCategory::Movement && b.direction == Some(direction))
            .and_then(|b| b.key.as_ref())
    }

    /// Category of every id, indexed by [`ActionId::index`]
    pub fn category_table(&self) -> Vec<Option<ActionCategory>> {
        self.bindings.iter().map(|b| b.as_ref().map(|b| b.category)).collect()
    }
}

fn validate_duration(profile: &str, spec: &ActionSpec, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("profile '{}': action {} has invalid {} {}", profile, spec.id, field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ActionSpec> {
        vec![
            ActionSpec::new(0, "idle", ActionCategory::Idle),
            ActionSpec::new(1, "left", ActionCategory::Movement).key("left").direction(Direction::Left),
            ActionSpec::new(2, "right", ActionCategory::Movement).key("right").direction(Direction::Right),
            ActionSpec::new(3, "teleport", ActionCategory::Teleport).key("v").press_secs(0.1),
            ActionSpec::new(4, "buff", ActionCategory::Buff).key("d").cooldown_secs(120.0),
        ]
    }

    #[test]
    fn test_action_id_bounds() {
        assert!(ActionId::new(10).is_some());
        assert!(ActionId::new(11).is_none());
        assert_eq!(ActionId::from_raw(3).map(ActionId::index), Some(3));
        assert!(ActionId::from_raw(-1).is_none());
        assert!(ActionId::from_raw(300).is_none());
    }

    #[test]
    fn test_profile_lookup() {
        let profile = ActionProfile::from_specs("test", &specs(), Direction::Right).unwrap();
        assert_eq!(profile.cardinality(), 5);
        assert_eq!(profile.category(ActionId::new(3).unwrap()), Some(ActionCategory::Teleport));
        assert!(profile.get(ActionId::new(7).unwrap()).is_none());
        assert_eq!(profile.movement_key(Direction::Left), Some(&Key::new("left")));
        assert_eq!(profile.movement_key(Direction::Up), None);
        let buff = profile.get(ActionId::new(4).unwrap()).unwrap();
        assert_eq!(buff.cooldown, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let mut specs = specs();
        specs[1].key = None;
        let err = ActionProfile::from_specs("test", &specs, Direction::Right).unwrap_err();
        assert!(err.to_string().contains("no key binding"));
    }

    #[test]
    fn test_duplicate_and_gap_rejected() {
        let mut dup = specs();
        dup.push(ActionSpec::new(2, "again", ActionCategory::Idle));
        assert!(ActionProfile::from_specs("test", &dup, Direction::Right).is_err());

        let mut gap = specs();
        gap.push(ActionSpec::new(7, "far", ActionCategory::Idle));
        assert!(ActionProfile::from_specs("test", &gap, Direction::Right).is_err());
    }

    #[test]
    fn test_out_of_range_id_from_json_rejected() {
        let spec: ActionSpec = serde_json::from_str(r#"{"id": 42, "name": "x", "category": "idle"}"#).unwrap();
        let err = ActionProfile::from_specs("test", &[spec], Direction::Right).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_buff_without_cooldown_rejected() {
        let mut specs = specs();
        specs[4].cooldown_secs = 0.0;
        assert!(ActionProfile::from_specs("test", &specs, Direction::Right).is_err());
    }

    #[test]
    fn test_teleport_requires_initial_direction_binding() {
        assert!(ActionProfile::from_specs("test", &specs(), Direction::Up).is_err());
    }

    #[test]
    fn test_disabled_action_is_unbound_but_counted() {
        let mut specs = specs();
        specs.push(ActionSpec::new(5, "up", ActionCategory::Movement).key("up").disabled());
        let profile = ActionProfile::from_specs("test", &specs, Direction::Right).unwrap();
        assert_eq!(profile.cardinality(), 6);
        assert!(profile.get(ActionId::new(5).unwrap()).is_none());
    }
}
