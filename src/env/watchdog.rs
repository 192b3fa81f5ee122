//! Threat watchdog: debounced template detection and escape macro
//!
//! ```text
//!  Idle ──score > threshold──▶ Suspect(1) ──score > threshold──▶ Confirmed
//!   ▲                            │                                │
//!   └──────score ≤ threshold─────┘                                │
//!   └──────────────── counter reset, escape macro runs ◀──────────┘
//! ```
//!
//! Checks are rate limited: a check less than `check_interval_secs` after
//! the previous one returns immediately without touching any state. The
//! escape macro runs synchronously on the calling thread:
//!
//! 1. find the interactable target and click its centre
//! 2. wait for the screen to settle, capture again, find the confirmation
//!    target and click its centre
//!
//! Either target missing aborts the macro for this trigger; the main loop
//! carries on.

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::{
    clock::{Clock, secs},
    devices::{FrameSource, InputSink},
};
use crate::vision::{Frame, GrayFrame, NccMatcher, Roi, Template, TemplateMatcher};

/// Watchdog timing and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Minimum time between two threat checks
    pub check_interval_secs: f64,
    /// Score above which a check counts as a threat sighting
    pub threat_threshold: f64,
    /// Consecutive sightings that confirm a threat
    pub confirmations: u32,
    /// Score above which the interactable target is found
    pub interactable_threshold: f64,
    /// Score above which the confirmation target is found
    pub confirmation_threshold: f64,
    /// Wait after clicking the interactable target
    pub settle_secs: f64,
    /// Wait after clicking the confirmation target
    pub post_click_secs: f64,
    /// Area searched for the threat (whole frame when absent)
    pub threat_region: Option<Roi>,
    /// Area searched for the interactable target
    pub interactable_region: Option<Roi>,
    /// Area searched for the confirmation target
    pub confirmation_region: Option<Roi>,
    /// Image files the templates are loaded from
    pub templates: TemplatePaths,
}

/// Template image files; relative paths resolve against the working directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatePaths {
    /// Threat image
    pub threat: Option<PathBuf>,
    /// Interactable target image
    pub interactable: Option<PathBuf>,
    /// Confirmation target image
    pub confirmation: Option<PathBuf>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 1.0,
            threat_threshold: 0.7,
            confirmations: 2,
            interactable_threshold: 0.5,
            confirmation_threshold: 0.5,
            settle_secs: 0.5,
            post_click_secs: 0.5,
            threat_region: None,
            interactable_region: None,
            confirmation_region: None,
            templates: TemplatePaths::default(),
        }
    }
}

impl WatchdogConfig {
    /// Check thresholds and timings
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("threat_threshold", self.threat_threshold),
            ("interactable_threshold", self.interactable_threshold),
            ("confirmation_threshold", self.confirmation_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                bail!("watchdog.{} must be in [-1, 1], got {}", name, value);
            }
        }
        for (name, value) in [
            ("check_interval_secs", self.check_interval_secs),
            ("settle_secs", self.settle_secs),
            ("post_click_secs", self.post_click_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("watchdog.{} must be a non-negative number of seconds", name);
            }
        }
        if self.confirmations == 0 {
            bail!("watchdog.confirmations must be at least 1");
        }
        Ok(())
    }

    /// Set the check interval
    pub fn check_interval_secs(mut self, secs: f64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    /// Set the threat threshold
    pub fn threat_threshold(mut self, threshold: f64) -> Self {
        self.threat_threshold = threshold;
        self
    }

    /// Set the number of consecutive sightings required
    pub fn confirmations(mut self, count: u32) -> Self {
        self.confirmations = count;
        self
    }
}

/// Reference images used by the watchdog; any may be absent
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    /// Threat to watch for
    pub threat: Option<Template>,
    /// First macro target
    pub interactable: Option<Template>,
    /// Second macro target
    pub confirmation: Option<Template>,
}

impl TemplateSet {
    /// Load every configured image.
    ///
    /// A file that is missing or cannot be decoded leaves its slot empty,
    /// which disables the matching detector; the failure is logged once here.
    pub fn load(paths: &TemplatePaths) -> Self {
        let load = |name: &str, path: &Option<PathBuf>| {
            let path = path.as_ref()?;
            match Template::open(name, path) {
                Ok(template) => {
                    tracing::debug!(
                        "loaded {} template {} ({}x{})",
                        name,
                        path.display(),
                        template.width(),
                        template.height()
                    );
                    Some(template)
                }
                Err(e) => {
                    tracing::warn!("{} template unavailable: {:#}", name, e);
                    None
                }
            }
        };
        Self {
            threat: load("threat", &paths.threat),
            interactable: load("interactable", &paths.interactable),
            confirmation: load("confirmation", &paths.confirmation),
        }
    }

    /// Number of templates present
    pub fn loaded(&self) -> usize {
        [&self.threat, &self.interactable, &self.confirmation].iter().filter(|t| t.is_some()).count()
    }
}

/// Debounce state between checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatState {
    /// No recent sighting
    Idle,
    /// Consecutive sightings so far, below the confirmation count
    Suspect {
        /// Sightings in a row
        count: u32,
    },
}

/// Stage of the escape macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStage {
    /// Locating the interactable target
    Interactable,
    /// Locating the confirmation target
    Confirmation,
}

impl fmt::Display for EscapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscapeStage::Interactable => f.write_str("interactable"),
            EscapeStage::Confirmation => f.write_str("confirmation"),
        }
    }
}

/// Result of one escape macro attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EscapeOutcome {
    /// Both targets were found and clicked
    Completed,
    /// A target was not found (`score` is `None` when its template is absent)
    Aborted {
        /// Stage that failed
        stage: EscapeStage,
        /// Best score found
        score: Option<f64>,
    },
    /// Capture or input failed during the macro
    Failed(String),
}

/// Result of [`ThreatWatchdog::check`]
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// No threat template; the watchdog never runs
    Disabled,
    /// Called again before the check interval elapsed
    RateLimited,
    /// Score at or below the threshold; counter reset
    Clear {
        /// Threat score
        score: f64,
    },
    /// Sighting counted, not yet confirmed
    Suspect {
        /// Threat score
        score: f64,
        /// Sightings in a row
        count: u32,
    },
    /// Threat confirmed and the escape macro attempted
    Escaped(EscapeOutcome),
}

impl CheckOutcome {
    /// Whether the escape macro ran
    pub fn triggered(&self) -> bool {
        matches!(self, CheckOutcome::Escaped(_))
    }
}

/// Rate-limited threat detector driving the escape macro
pub struct ThreatWatchdog {
    config: WatchdogConfig,
    templates: TemplateSet,
    matcher: Box<dyn TemplateMatcher>,
    consecutive: u32,
    last_check: Option<Duration>,
    checks: u64,
    triggers: u64,
    escapes: u64,
}

impl fmt::Debug for ThreatWatchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreatWatchdog")
            .field("config", &self.config)
            .field("templates", &self.templates.loaded())
            .field("consecutive", &self.consecutive)
            .field("last_check", &self.last_check)
            .finish_non_exhaustive()
    }
}

impl ThreatWatchdog {
    /// Create a watchdog using normalised cross-correlation
    pub fn new(config: WatchdogConfig, templates: TemplateSet) -> Self {
        Self::with_matcher(config, templates, Box::new(NccMatcher))
    }

    /// Create a watchdog with a custom matcher
    pub fn with_matcher(
        config: WatchdogConfig,
        templates: TemplateSet,
        matcher: Box<dyn TemplateMatcher>,
    ) -> Self {
        if templates.threat.is_none() {
            tracing::warn!("no threat template loaded; threat watchdog disabled");
        } else {
            if templates.interactable.is_none() {
                tracing::warn!("no interactable template loaded; escape macro will always abort");
            } else if templates.confirmation.is_none() {
                tracing::warn!("no confirmation template loaded; escape macro stops after first click");
            }
            tracing::info!("threat watchdog active ({}/3 templates)", templates.loaded());
        }
        Self {
            config,
            templates,
            matcher,
            consecutive: 0,
            last_check: None,
            checks: 0,
            triggers: 0,
            escapes: 0,
        }
    }

    /// Whether a threat template is loaded
    pub fn enabled(&self) -> bool {
        self.templates.threat.is_some()
    }

    /// Debounce state
    pub fn state(&self) -> ThreatState {
        match self.consecutive {
            0 => ThreatState::Idle,
            count => ThreatState::Suspect { count },
        }
    }

    /// Checks that reached the matcher
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Confirmed threats (escape macro attempts)
    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    /// Escape macros that completed
    pub fn escapes(&self) -> u64 {
        self.escapes
    }

    /// Clear the debounce counter and the rate limit
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.last_check = None;
    }

    /// Run one rate-limited check against `frame`.
    ///
    /// `source` is used to recapture the screen between macro clicks.
    pub fn check(
        &mut self,
        frame: &Frame,
        source: &mut dyn FrameSource,
        input: &mut dyn InputSink,
        clock: &mut dyn Clock,
    ) -> CheckOutcome {
        let Some(threat) = self.templates.threat.as_ref() else {
            return CheckOutcome::Disabled;
        };
        let now = clock.now();
        let interval = secs(self.config.check_interval_secs);
        if let Some(last) = self.last_check {
            if now.saturating_sub(last) < interval {
                return CheckOutcome::RateLimited;
            }
        }
        self.last_check = Some(now);
        self.checks += 1;

        let gray = frame.to_gray();
        let score = self
            .matcher
            .best_match(&gray, threat, self.config.threat_region)
            .map_or(0.0, |m| m.score);

        if score <= self.config.threat_threshold {
            if self.consecutive > 0 {
                tracing::debug!("threat cleared (score {:.3})", score);
            }
            self.consecutive = 0;
            return CheckOutcome::Clear { score };
        }

        self.consecutive += 1;
        if self.consecutive < self.config.confirmations {
            tracing::info!("threat suspected (score {:.3}, {} in a row)", score, self.consecutive);
            return CheckOutcome::Suspect { score, count: self.consecutive };
        }

        tracing::warn!("threat confirmed (score {:.3}); running escape macro", score);
        self.consecutive = 0;
        self.triggers += 1;
        let outcome = match self.escape(&gray, source, input, clock) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("escape macro failed: {:#}", e);
                EscapeOutcome::Failed(format!("{:#}", e))
            }
        };
        if outcome == EscapeOutcome::Completed {
            self.escapes += 1;
        }
        CheckOutcome::Escaped(outcome)
    }

    fn escape(
        &self,
        gray: &GrayFrame,
        source: &mut dyn FrameSource,
        input: &mut dyn InputSink,
        clock: &mut dyn Clock,
    ) -> Result<EscapeOutcome> {
        if let Some(aborted) = self.click_target(
            EscapeStage::Interactable,
            gray,
            self.templates.interactable.as_ref(),
            self.config.interactable_threshold,
            self.config.interactable_region,
            input,
        )? {
            return Ok(aborted);
        }
        clock.sleep(secs(self.config.settle_secs));

        let gray = source.capture()?.to_gray();
        if let Some(aborted) = self.click_target(
            EscapeStage::Confirmation,
            &gray,
            self.templates.confirmation.as_ref(),
            self.config.confirmation_threshold,
            self.config.confirmation_region,
            input,
        )? {
            return Ok(aborted);
        }
        clock.sleep(secs(self.config.post_click_secs));

        tracing::info!("escape macro completed");
        Ok(EscapeOutcome::Completed)
    }

    /// Click the centre of `template` if it scores above `threshold`;
    /// otherwise return the abort outcome
    fn click_target(
        &self,
        stage: EscapeStage,
        gray: &GrayFrame,
        template: Option<&Template>,
        threshold: f64,
        region: Option<Roi>,
        input: &mut dyn InputSink,
    ) -> Result<Option<EscapeOutcome>> {
        let Some(template) = template else {
            tracing::warn!("escape aborted: no {} template", stage);
            return Ok(Some(EscapeOutcome::Aborted { stage, score: None }));
        };
        let found = self.matcher.best_match(gray, template, region);
        let score = found.map_or(0.0, |m| m.score);
        match found {
            Some(m) if m.score > threshold => {
                let (x, y) = m.centroid();
                tracing::info!("clicking {} target at ({}, {}) (score {:.3})", stage, x, y, m.score);
                input.click(x, y)?;
                Ok(None)
            }
            _ => {
                tracing::warn!("escape aborted: {} target not found (score {:.3})", stage, score);
                Ok(Some(EscapeOutcome::Aborted { stage, score: Some(score) }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{
        clock::ManualClock,
        mock::{RecordingInputSink, ScriptedFrameSource, ScriptedMatcher},
    };

    fn template(name: &str) -> Template {
        Template::new(name, GrayFrame::new(4, 2, vec![0, 255, 0, 255, 255, 0, 255, 0]).unwrap()).unwrap()
    }

    fn all_templates() -> TemplateSet {
        TemplateSet {
            threat: Some(template("threat")),
            interactable: Some(template("interactable")),
            confirmation: Some(template("confirmation")),
        }
    }

    struct Rig {
        watchdog: ThreatWatchdog,
        matcher: ScriptedMatcher,
        source: ScriptedFrameSource,
        sink: RecordingInputSink,
        clock: ManualClock,
        frame: Frame,
    }

    impl Rig {
        fn new(templates: TemplateSet, matcher: ScriptedMatcher) -> Self {
            let watchdog =
                ThreatWatchdog::with_matcher(WatchdogConfig::default(), templates, Box::new(matcher.clone()));
            let frame = Frame::filled(32, 32, [0, 0, 0]);
            Self {
                watchdog,
                matcher,
                source: ScriptedFrameSource::constant(frame.clone()),
                sink: RecordingInputSink::new(),
                clock: ManualClock::new(),
                frame,
            }
        }

        fn check(&mut self) -> CheckOutcome {
            self.watchdog.check(&self.frame, &mut self.source, &mut self.sink, &mut self.clock)
        }

        fn check_after(&mut self, secs: u64) -> CheckOutcome {
            self.clock.advance(Duration::from_secs(secs));
            self.check()
        }
    }

    #[test]
    fn test_two_consecutive_sightings_fire_once() {
        let matcher = ScriptedMatcher::new()
            .scores("threat", [0.75, 0.72])
            .scores("interactable", [0.9])
            .located_at("interactable", 10, 20)
            .scores("confirmation", [0.8])
            .located_at("confirmation", 2, 4);
        let mut rig = Rig::new(all_templates(), matcher);

        let first = rig.check();
        assert_eq!(first, CheckOutcome::Suspect { score: 0.75, count: 1 });
        assert_eq!(rig.matcher.calls("interactable"), 0);

        let second = rig.check_after(1);
        assert_eq!(second, CheckOutcome::Escaped(EscapeOutcome::Completed));
        assert_eq!(rig.watchdog.state(), ThreatState::Idle);
        assert_eq!(rig.watchdog.triggers(), 1);
        assert_eq!(rig.watchdog.escapes(), 1);
        // Centroids of the 4x2 templates
        assert_eq!(rig.sink.clicks(), vec![(12, 21), (4, 5)]);
        assert_eq!(rig.source.captures(), 1, "one recapture between clicks");
        assert_eq!(rig.clock.total_slept(), Duration::from_secs(1));
    }

    #[test]
    fn test_single_sighting_never_fires() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.75]);
        let mut rig = Rig::new(all_templates(), matcher);

        assert!(!rig.check().triggered());
        assert_eq!(rig.watchdog.state(), ThreatState::Suspect { count: 1 });
        assert_eq!(rig.watchdog.triggers(), 0);
        assert_eq!(rig.matcher.calls("interactable"), 0);
    }

    #[test]
    fn test_intervening_clear_resets_counter() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.75, 0.4, 0.8, 0.7]);
        let mut rig = Rig::new(all_templates(), matcher);

        for secs in [0, 1, 1, 1] {
            assert!(!rig.check_after(secs).triggered());
        }
        // 0.7 is not above the threshold
        assert_eq!(rig.watchdog.state(), ThreatState::Idle);
        assert_eq!(rig.watchdog.triggers(), 0);
    }

    #[test]
    fn test_checks_are_rate_limited() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.75, 0.75]);
        let mut rig = Rig::new(all_templates(), matcher);

        rig.check();
        rig.clock.advance(Duration::from_millis(500));
        assert_eq!(rig.check(), CheckOutcome::RateLimited);
        assert_eq!(rig.matcher.calls("threat"), 1);
        assert_eq!(rig.watchdog.state(), ThreatState::Suspect { count: 1 });

        rig.clock.advance(Duration::from_millis(500));
        assert!(rig.check().triggered());
        assert_eq!(rig.watchdog.checks(), 2);
    }

    #[test]
    fn test_missing_threat_template_disables() {
        let templates = TemplateSet { threat: None, ..all_templates() };
        let matcher = ScriptedMatcher::new().scores("threat", [0.99, 0.99]);
        let mut rig = Rig::new(templates, matcher);

        assert!(!rig.watchdog.enabled());
        for _ in 0..3 {
            assert_eq!(rig.check_after(2), CheckOutcome::Disabled);
        }
        assert_eq!(rig.matcher.calls("threat"), 0);
        assert!(rig.sink.events().is_empty());
    }

    #[test]
    fn test_interactable_not_found_aborts() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.9]).scores("interactable", [0.3]);
        let mut rig = Rig::new(all_templates(), matcher);

        rig.check();
        let outcome = rig.check_after(1);
        assert_eq!(
            outcome,
            CheckOutcome::Escaped(EscapeOutcome::Aborted { stage: EscapeStage::Interactable, score: Some(0.3) })
        );
        assert!(rig.sink.clicks().is_empty());
        assert_eq!(rig.source.captures(), 0);
        assert_eq!(rig.watchdog.state(), ThreatState::Idle);
        assert_eq!(rig.watchdog.escapes(), 0);
    }

    #[test]
    fn test_confirmation_not_found_aborts_after_first_click() {
        let matcher = ScriptedMatcher::new()
            .scores("threat", [0.9, 0.9])
            .scores("interactable", [0.9])
            .scores("confirmation", [0.5]);
        let mut rig = Rig::new(all_templates(), matcher);

        rig.check();
        let outcome = rig.check_after(1);
        assert_eq!(
            outcome,
            CheckOutcome::Escaped(EscapeOutcome::Aborted { stage: EscapeStage::Confirmation, score: Some(0.5) })
        );
        assert_eq!(rig.sink.clicks().len(), 1);
    }

    #[test]
    fn test_missing_macro_template_aborts() {
        let templates = TemplateSet { interactable: None, ..all_templates() };
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.9]);
        let mut rig = Rig::new(templates, matcher);

        rig.check();
        assert_eq!(
            rig.check_after(1),
            CheckOutcome::Escaped(EscapeOutcome::Aborted { stage: EscapeStage::Interactable, score: None })
        );
    }

    #[test]
    fn test_capture_failure_inside_macro_is_contained() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.9]).scores("interactable", [0.9]);
        let mut rig = Rig::new(all_templates(), matcher);
        rig.source = ScriptedFrameSource::constant(rig.frame.clone()).fail_at(0);

        rig.check();
        let outcome = rig.check_after(1);
        assert!(matches!(outcome, CheckOutcome::Escaped(EscapeOutcome::Failed(_))));
        assert_eq!(rig.watchdog.state(), ThreatState::Idle);
        assert_eq!(rig.watchdog.triggers(), 1);
    }

    #[test]
    fn test_counter_resets_after_macro() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.9, 0.9, 0.9]);
        let mut rig = Rig::new(all_templates(), matcher);

        let fired: Vec<bool> = [0, 1, 1, 1].into_iter().map(|s| rig.check_after(s).triggered()).collect();
        assert_eq!(fired, vec![false, true, false, true]);
    }

    #[test]
    fn test_reset_clears_debounce_and_rate_limit() {
        let matcher = ScriptedMatcher::new().scores("threat", [0.9, 0.9]);
        let mut rig = Rig::new(all_templates(), matcher);

        rig.check();
        rig.watchdog.reset();
        assert_eq!(rig.watchdog.state(), ThreatState::Idle);
        // Same instant, but the rate limit was cleared
        assert_eq!(rig.check(), CheckOutcome::Suspect { score: 0.9, count: 1 });
    }

    #[test]
    fn test_config_validation() {
        assert!(WatchdogConfig::default().validate().is_ok());
        assert!(WatchdogConfig::default().confirmations(0).validate().is_err());
        assert!(WatchdogConfig::default().threat_threshold(1.5).validate().is_err());
        assert!(WatchdogConfig::default().check_interval_secs(-1.0).validate().is_err());
    }

    #[test]
    fn test_real_matcher_finds_threat() {
        let mut frame = Frame::filled(40, 30, [20, 20, 20]);
        frame.fill_rect(Roi::new(10, 8, 6, 4), [250, 250, 250]);
        frame.fill_rect(Roi::new(12, 9, 2, 2), [0, 0, 0]);
        let threat = Template::from_frame("threat", &frame.crop(Roi::new(9, 7, 8, 6)).unwrap()).unwrap();
        let templates = TemplateSet { threat: Some(threat), ..TemplateSet::default() };
        let mut watchdog = ThreatWatchdog::new(WatchdogConfig::default(), templates);

        let mut source = ScriptedFrameSource::constant(frame.clone());
        let mut sink = RecordingInputSink::new();
        let mut clock = ManualClock::new();
        match watchdog.check(&frame, &mut source, &mut sink, &mut clock) {
            CheckOutcome::Suspect { score, count } => {
                assert!(score > 0.99);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_template_files_missing_or_broken_disable_slots() {
        let dir = tempfile::tempdir().unwrap();
        let threat_path = dir.path().join("threat.png");
        let pixels = image::GrayImage::from_fn(6, 4, |x, y| image::Luma([((x * 40 + y * 25) % 256) as u8]));
        pixels.save(&threat_path).unwrap();
        let broken_path = dir.path().join("broken.png");
        std::fs::write(&broken_path, b"not a png").unwrap();

        let paths = TemplatePaths {
            threat: Some(threat_path),
            interactable: Some(broken_path),
            confirmation: Some(dir.path().join("missing.png")),
        };
        let templates = TemplateSet::load(&paths);
        assert_eq!(templates.loaded(), 1);
        let threat = templates.threat.as_ref().unwrap();
        assert_eq!((threat.width(), threat.height()), (6, 4));
        assert!(templates.interactable.is_none());
        assert!(templates.confirmation.is_none());

        assert!(ThreatWatchdog::new(WatchdogConfig::default(), templates).enabled());
        assert!(!ThreatWatchdog::new(WatchdogConfig::default(), TemplateSet::load(&TemplatePaths::default())).enabled());
    }
}
