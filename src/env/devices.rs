//! Collaborator interfaces: screen capture and synthetic input
//!
//! The environment never talks to the operating system directly. A capture
//! backend implements [`FrameSource`]; a keyboard/mouse backend implements
//! [`InputSink`]. Both are blocking calls on the control thread.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::vision::Frame;

/// Physical key name understood by the input backend (e.g. `"left"`, `"ctrl"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Create a key from its backend name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Backend name of the key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Source of full-resolution color frames
pub trait FrameSource {
    /// Grab the current screen contents.
    ///
    /// Failures are not recovered from; they abort the current step.
    fn capture(&mut self) -> Result<Frame>;
}

/// Sink for synthetic keyboard and mouse events
pub trait InputSink {
    /// Push a key down
    fn press(&mut self, key: &Key) -> Result<()>;

    /// Let a key up
    fn release(&mut self, key: &Key) -> Result<()>;

    /// Left-click at screen coordinates
    fn click(&mut self, x: i32, y: i32) -> Result<()>;
}
