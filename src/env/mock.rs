//! In-memory devices for tests and dry runs

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Result, anyhow, bail};

use super::devices::{FrameSource, InputSink, Key};
use crate::vision::{Frame, GrayFrame, MatchResult, Roi, Template, TemplateMatcher};

/// Frame source that replays a queue of frames.
///
/// Once the queue is drained the last frame is repeated, which models a
/// static screen.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFrameSource {
    queue: VecDeque<Frame>,
    last: Option<Frame>,
    captures: usize,
    fail_at: Option<usize>,
}

impl ScriptedFrameSource {
    /// Create a source that will yield `frames` in order
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self { queue: frames.into_iter().collect(), ..Self::default() }
    }

    /// Create a source that always returns the same frame
    pub fn constant(frame: Frame) -> Self {
        Self::new([frame])
    }

    /// Append a frame to the queue
    pub fn push(&mut self, frame: Frame) {
        self.queue.push_back(frame);
    }

    /// Make the capture with the given zero-based index fail
    pub fn fail_at(mut self, capture_index: usize) -> Self {
        self.fail_at = Some(capture_index);
        self
    }

    /// Number of successful and failed captures so far
    pub fn captures(&self) -> usize {
        self.captures
    }
}

impl FrameSource for ScriptedFrameSource {
    fn capture(&mut self) -> Result<Frame> {
        let index = self.captures;
        self.captures += 1;
        if self.fail_at == Some(index) {
            bail!("capture {} failed: display unavailable", index);
        }
        if let Some(frame) = self.queue.pop_front() {
            self.last = Some(frame);
        }
        self.last.clone().ok_or_else(|| anyhow!("no frames scripted"))
    }
}

/// One event delivered to a [`RecordingInputSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Key pushed down
    Press(Key),
    /// Key let up
    Release(Key),
    /// Mouse click
    Click {
        /// Screen x
        x: i32,
        /// Screen y
        y: i32,
    },
}

/// Input sink that records every event and tracks keys currently down
#[derive(Debug, Clone, Default)]
pub struct RecordingInputSink {
    events: Vec<InputEvent>,
    down: BTreeSet<Key>,
    fail_on_press: Option<Key>,
    fail_next_release: Option<Key>,
}

impl RecordingInputSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every press of `key` fail
    pub fn fail_on_press(mut self, key: impl Into<Key>) -> Self {
        self.fail_on_press = Some(key.into());
        self
    }

    /// Make the next release of `key` fail; the key stays down
    pub fn fail_next_release(mut self, key: impl Into<Key>) -> Self {
        self.fail_next_release = Some(key.into());
        self
    }

    /// All events in delivery order
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Keys pressed and not yet released
    pub fn keys_down(&self) -> &BTreeSet<Key> {
        &self.down
    }

    /// Number of presses of `key`
    pub fn press_count(&self, key: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, InputEvent::Press(k) if k.as_str() == key))
            .count()
    }

    /// Recorded clicks
    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Click { x, y } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded events (keys down are kept)
    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl InputSink for RecordingInputSink {
    fn press(&mut self, key: &Key) -> Result<()> {
        if self.fail_on_press.as_ref() == Some(key) {
            bail!("input backend rejected key '{}'", key);
        }
        self.events.push(InputEvent::Press(key.clone()));
        self.down.insert(key.clone());
        Ok(())
    }

    fn release(&mut self, key: &Key) -> Result<()> {
        if self.fail_next_release.as_ref() == Some(key) {
            self.fail_next_release = None;
            bail!("input backend lost key-up for '{}'", key);
        }
        self.events.push(InputEvent::Release(key.clone()));
        self.down.remove(key);
        Ok(())
    }

    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.events.push(InputEvent::Click { x, y });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    scores: BTreeMap<String, VecDeque<f64>>,
    locations: BTreeMap<String, (usize, usize)>,
    calls: BTreeMap<String, usize>,
}

/// Template matcher that replays scripted scores per template name.
///
/// Clones share their script, so a test can keep a handle after moving a
/// clone into the watchdog. A template with no remaining scores matches with
/// score 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedMatcher {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedMatcher {
    /// Create a matcher with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue scores returned for the template called `name`
    pub fn scores(self, name: &str, scores: impl IntoIterator<Item = f64>) -> Self {
        self.lock().scores.entry(name.to_string()).or_default().extend(scores);
        self
    }

    /// Report matches of `name` at the given top-left corner
    pub fn located_at(self, name: &str, x: usize, y: usize) -> Self {
        self.lock().locations.insert(name.to_string(), (x, y));
        self
    }

    /// Number of times `name` was matched
    pub fn calls(&self, name: &str) -> usize {
        self.lock().calls.get(name).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TemplateMatcher for ScriptedMatcher {
    fn best_match(
        &self,
        _frame: &GrayFrame,
        template: &Template,
        region: Option<Roi>,
    ) -> Option<MatchResult> {
        let mut state = self.lock();
        let name = template.name().to_string();
        *state.calls.entry(name.clone()).or_default() += 1;
        let score = state.scores.get_mut(&name).and_then(VecDeque::pop_front).unwrap_or(0.0);
        let (x, y) = state.locations.get(&name).copied().unwrap_or_else(|| {
            region.map(|r| (r.x as usize, r.y as usize)).unwrap_or((0, 0))
        });
        Some(MatchResult { score, x, y, width: template.width(), height: template.height() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_repeats_last_frame() {
        let a = Frame::filled(2, 2, [1, 1, 1]);
        let b = Frame::filled(2, 2, [2, 2, 2]);
        let mut source = ScriptedFrameSource::new([a.clone(), b.clone()]);

        assert_eq!(source.capture().unwrap(), a);
        assert_eq!(source.capture().unwrap(), b);
        assert_eq!(source.capture().unwrap(), b);
        assert_eq!(source.captures(), 3);
    }

    #[test]
    fn test_scripted_source_injected_failure() {
        let mut source = ScriptedFrameSource::constant(Frame::filled(2, 2, [0, 0, 0])).fail_at(1);
        assert!(source.capture().is_ok());
        assert!(source.capture().is_err());
        assert!(source.capture().is_ok());
    }

    #[test]
    fn test_empty_source_errors() {
        let mut source = ScriptedFrameSource::default();
        assert!(source.capture().is_err());
    }

    #[test]
    fn test_recording_sink_tracks_down_keys() {
        let mut sink = RecordingInputSink::new();
        sink.press(&Key::new("left")).unwrap();
        sink.press(&Key::new("a")).unwrap();
        sink.release(&Key::new("a")).unwrap();
        sink.click(5, 6).unwrap();

        assert_eq!(sink.keys_down().len(), 1);
        assert!(sink.keys_down().contains(&Key::new("left")));
        assert_eq!(sink.press_count("a"), 1);
        assert_eq!(sink.clicks(), vec![(5, 6)]);
        assert_eq!(sink.events().len(), 4);
    }

    #[test]
    fn test_scripted_matcher_replays_scores() {
        let template = Template::new("threat", GrayFrame::new(2, 2, vec![0, 255, 255, 0]).unwrap()).unwrap();
        let frame = GrayFrame::zeros(8, 8);
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.1]).located_at("threat", 4, 2);
        let handle = matcher.clone();

        let first = matcher.best_match(&frame, &template, None).unwrap();
        assert_eq!(first.score, 0.9);
        assert_eq!(first.centroid(), (5, 3));
        assert_eq!(matcher.best_match(&frame, &template, None).unwrap().score, 0.1);
        assert_eq!(matcher.best_match(&frame, &template, None).unwrap().score, 0.0);
        assert_eq!(handle.calls("threat"), 3);
        assert_eq!(handle.calls("other"), 0);
    }

    #[test]
    fn test_recording_sink_failure() {
        let mut sink = RecordingInputSink::new().fail_on_press("home");
        assert!(sink.press(&Key::new("home")).is_err());
        assert!(sink.keys_down().is_empty());
    }
}
