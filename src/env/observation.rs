//! Fixed-depth frame stack

use std::collections::VecDeque;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::vision::{Frame, GrayFrame};

/// Preprocessing and stacking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Width of a preprocessed frame
    pub width: usize,
    /// Height of a preprocessed frame
    pub height: usize,
    /// Number of stacked frames
    pub stack: usize,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self { width: 84, height: 84, stack: 4 }
    }
}

impl ObservationConfig {
    /// Reject zero-sized observations
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.stack == 0 {
            bail!(
                "observation must be non-empty, got {}x{}x{}",
                self.stack,
                self.height,
                self.width
            );
        }
        Ok(())
    }

    /// Observation shape `[stack, height, width]`
    pub fn shape(&self) -> Vec<usize> {
        vec![self.stack, self.height, self.width]
    }
}

/// Stack of preprocessed frames, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    frames: Vec<GrayFrame>,
}

impl Observation {
    /// Frames, oldest first
    pub fn frames(&self) -> &[GrayFrame] {
        &self.frames
    }

    /// Shape `[stack, height, width]`
    pub fn shape(&self) -> Vec<usize> {
        let (h, w) = self.frames.first().map_or((0, 0), |f| (f.height(), f.width()));
        vec![self.frames.len(), h, w]
    }

    /// Row-major `[stack, height, width]` intensities scaled to `[0, 1]`
    pub fn to_flat(&self) -> Vec<f32> {
        self.frames
            .iter()
            .flat_map(|f| f.data().iter().map(|&v| v as f32 / 255.0))
            .collect()
    }
}

/// Sliding window over the most recent preprocessed frames
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    config: ObservationConfig,
    frames: VecDeque<GrayFrame>,
}

impl ObservationBuilder {
    /// Create a builder holding `stack` blank frames
    pub fn new(config: ObservationConfig) -> Self {
        let blank = GrayFrame::zeros(config.width, config.height);
        Self { config, frames: std::iter::repeat(blank).take(config.stack).collect() }
    }

    /// Parameters in use
    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    /// Grayscale and resize a captured frame
    pub fn preprocess(&self, frame: &Frame) -> GrayFrame {
        frame.to_gray().resize(self.config.width, self.config.height)
    }

    /// Fill the whole stack with copies of `frame`
    pub fn reset(&mut self, frame: &Frame) {
        let processed = self.preprocess(frame);
        self.frames.clear();
        self.frames.extend(std::iter::repeat(processed).take(self.config.stack));
    }

    /// Append `frame`, evicting the oldest one
    pub fn push(&mut self, frame: &Frame) {
        let processed = self.preprocess(frame);
        self.frames.pop_front();
        self.frames.push_back(processed);
    }

    /// Current stack, oldest first
    pub fn get(&self) -> Observation {
        Observation { frames: self.frames.iter().cloned().collect() }
    }
}
