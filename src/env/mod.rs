//! Environment traits and the real-time environment
//!
//! This module defines the core environment interface and the components
//! the real-time environment is assembled from.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use self::reward::RewardBreakdown;

/// Core trait for RL environments
pub trait Environment {
    /// Observation type
    type Observation;

    /// Action type
    type Action;

    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Self::Observation>;

    /// Step the environment with an action
    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;

    /// Release any external resources held by the environment
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated (step budget reached)
    pub terminated: bool,

    /// Whether the episode was cut short by a stop request
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

/// Space information for observations and actions
#[derive(Debug, Clone)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: SpaceType,
}

/// Space data types
#[derive(Debug, Clone, Copy)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Additional step information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Inner iterations executed in the episode so far
    pub step: usize,

    /// Cumulative episode reward
    pub episode_reward: f64,

    /// Episode number
    pub episode: u64,

    /// Per-term reward of this step
    pub breakdown: RewardBreakdown,

    /// Whether the threat watchdog fired during this step
    pub threat: bool,
}

pub mod action;
pub mod clock;
pub mod devices;
pub mod executor;
pub mod mock;
pub mod observation;
pub mod realtime;
pub mod reward;
pub mod watchdog;
