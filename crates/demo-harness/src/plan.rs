//! Verification plans: a scenario plus its phase timing, fields and policy.
//!
//! A plan is plain data. It is loaded from YAML or JSON, validated once,
//! and then handed to [`crate::DemoEngine::run`]. Phase timing lives here
//! rather than in code so it can be recalibrated against the real demo.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::probe::PageProbe;
use crate::result::{HarnessError, HarnessResult};
use crate::scenario::{DemoScenario, FieldSpec, PhaseWindow};
use crate::wait::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_TRANSITION_TIMEOUT_MS};

/// Default pass threshold
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Default largest gap tolerated between consecutive phase windows
pub const DEFAULT_POLL_GRANULARITY_MS: u64 = 1000;

/// Default base URL for relative entry URLs
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Bounds on the two fatal waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Entry page load and network quiescence
    pub navigation_ms: u64,
    /// Post-trigger URL transition
    pub transition_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            transition_ms: DEFAULT_TRANSITION_TIMEOUT_MS,
        }
    }
}

impl Timeouts {
    /// Navigation bound as Duration
    #[must_use]
    pub const fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Transition bound as Duration
    #[must_use]
    pub const fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }
}

/// Instant that phase window offsets are measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAnchor {
    /// The trigger click
    #[default]
    Trigger,
    /// The moment the expected URL matched
    Transition,
}

impl std::fmt::Display for PhaseAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trigger => f.write_str("trigger"),
            Self::Transition => f.write_str("transition"),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_poll_granularity_ms() -> u64 {
    DEFAULT_POLL_GRANULARITY_MS
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Everything one run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationPlan {
    /// Which demo to trigger
    pub scenario: DemoScenario,
    /// Base URL used when the entry URL is relative
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Ordered phase windows
    pub phases: Vec<PhaseWindow>,
    /// Fields to observe, in declaration order
    pub fields: Vec<FieldSpec>,
    /// Minimum success rate for a pass
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Fatal wait bounds
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Phase offset origin
    #[serde(default)]
    pub anchor: PhaseAnchor,
    /// Largest tolerated gap between windows
    #[serde(default = "default_poll_granularity_ms")]
    pub poll_granularity_ms: u64,
    /// Non-scored probes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<PageProbe>,
}

impl VerificationPlan {
    /// Create a plan with default timeouts, anchor and granularity
    #[must_use]
    pub fn new(
        scenario: DemoScenario,
        phases: Vec<PhaseWindow>,
        fields: Vec<FieldSpec>,
        threshold: f64,
    ) -> Self {
        Self {
            scenario,
            base_url: default_base_url(),
            phases,
            fields,
            threshold,
            timeouts: Timeouts::default(),
            anchor: PhaseAnchor::default(),
            poll_granularity_ms: DEFAULT_POLL_GRANULARITY_MS,
            probes: Vec::new(),
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the phase anchor
    #[must_use]
    pub const fn with_anchor(mut self, anchor: PhaseAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Add probes
    #[must_use]
    pub fn with_probes(mut self, probes: impl IntoIterator<Item = PageProbe>) -> Self {
        self.probes.extend(probes);
        self
    }

    /// Absolute entry URL
    #[must_use]
    pub fn entry_url(&self) -> String {
        self.scenario.resolve_entry_url(&self.base_url)
    }

    /// Fields declared for phase `index`, in declaration order
    pub fn fields_in_phase(&self, index: usize) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(move |f| f.phase == index)
    }

    /// End of the last window
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.phases
            .last()
            .map_or(Duration::ZERO, PhaseWindow::end)
    }

    /// Check every precondition of a run
    pub fn validate(&self) -> HarnessResult<()> {
        if self.fields.is_empty() {
            return Err(HarnessError::invalid_plan("no fields declared"));
        }
        if self.phases.is_empty() {
            return Err(HarnessError::invalid_plan("no phase windows declared"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(HarnessError::invalid_plan(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }

        for (i, window) in self.phases.iter().enumerate() {
            if window.duration_ms == 0 {
                return Err(HarnessError::invalid_plan(format!(
                    "phase {} has zero duration",
                    window.label(i)
                )));
            }
        }
        for (i, pair) in self.phases.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start_ms < prev.end_ms() {
                return Err(HarnessError::invalid_plan(format!(
                    "phase {} starts at {}ms, before phase {} ends at {}ms",
                    next.label(i + 1),
                    next.start_ms,
                    prev.label(i),
                    prev.end_ms()
                )));
            }
            let gap = next.start_ms - prev.end_ms();
            if gap > self.poll_granularity_ms {
                return Err(HarnessError::invalid_plan(format!(
                    "{gap}ms gap between phase {} and {} exceeds granularity {}ms",
                    prev.label(i),
                    next.label(i + 1),
                    self.poll_granularity_ms
                )));
            }
        }

        let mut names = HashSet::new();
        let mut last_phase = 0;
        for field in &self.fields {
            if field.phase >= self.phases.len() {
                return Err(HarnessError::invalid_plan(format!(
                    "field '{}' references phase {} but only {} declared",
                    field.name,
                    field.phase,
                    self.phases.len()
                )));
            }
            if field.phase < last_phase {
                return Err(HarnessError::invalid_plan(format!(
                    "field '{}' in phase {} declared after a phase {} field",
                    field.name, field.phase, last_phase
                )));
            }
            last_phase = field.phase;
            if !names.insert(field.name.as_str()) {
                return Err(HarnessError::invalid_plan(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Parse a YAML plan
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a JSON plan
    pub fn from_json_str(json: &str) -> HarnessResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a plan file; `.json` is read as JSON, anything else as YAML
    pub fn from_path(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::locator::Selector;
    use crate::url::UrlPattern;

    fn scenario() -> DemoScenario {
        DemoScenario::new(
            "manufacturing",
            "/demo",
            Selector::css_with_text("button", "Start Demo"),
            UrlPattern::glob("**/shipping"),
        )
    }

    fn plan() -> VerificationPlan {
        VerificationPlan::new(
            scenario(),
            PhaseWindow::uniform(&["origin", "address"], 5000),
            vec![
                FieldSpec::new("origin contact name", Selector::css("#origin-contact-name"), 0),
                FieldSpec::new("origin city", Selector::css("#origin-city"), 1),
            ],
            0.7,
        )
    }

    fn invalid_message(plan: &VerificationPlan) -> String {
        match plan.validate() {
            Err(HarnessError::InvalidPlan { message }) => message,
            other => panic!("expected InvalidPlan, got {other:?}"),
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_valid_plan() {
            plan().validate().unwrap();
        }

        #[test]
        fn test_empty_fields_rejected() {
            let mut p = plan();
            p.fields.clear();
            assert!(invalid_message(&p).contains("no fields"));
        }

        #[test]
        fn test_phase_out_of_range_rejected() {
            let mut p = plan();
            p.fields.push(FieldSpec::new("weight", Selector::css("#w"), 2));
            assert!(invalid_message(&p).contains("phase 2"));
        }

        #[test]
        fn test_threshold_bounds() {
            assert!(plan().with_threshold(1.0).validate().is_ok());
            assert!(plan().with_threshold(0.0).validate().is_ok());
            assert!(invalid_message(&plan().with_threshold(1.01)).contains("threshold"));
            assert!(invalid_message(&plan().with_threshold(-0.1)).contains("threshold"));
            assert!(plan().with_threshold(f64::NAN).validate().is_err());
        }

        #[test]
        fn test_overlapping_windows_rejected() {
            let mut p = plan();
            p.phases[1].start_ms = 4000;
            assert!(invalid_message(&p).contains("before phase"));
        }

        #[test]
        fn test_gap_within_granularity_allowed() {
            let mut p = plan();
            p.phases[1].start_ms = 6000;
            p.validate().unwrap();
            p.phases[1].start_ms = 6001;
            assert!(invalid_message(&p).contains("gap"));
        }

        #[test]
        fn test_zero_duration_rejected() {
            let mut p = plan();
            p.phases[0].duration_ms = 0;
            assert!(invalid_message(&p).contains("zero duration"));
        }

        #[test]
        fn test_decreasing_phase_rejected() {
            let mut p = plan();
            p.fields.reverse();
            assert!(invalid_message(&p).contains("declared after"));
        }

        #[test]
        fn test_duplicate_names_rejected() {
            let mut p = plan();
            p.fields[1].name = p.fields[0].name.clone();
            p.fields[1].phase = 0;
            assert!(invalid_message(&p).contains("duplicate"));
        }
    }

    mod load_tests {
        use super::*;

        const YAML: &str = r##"
scenario:
  name: healthcare
  entry_url: /demo
  trigger: "button:has-text('Start Demo')"
  trigger_index: 1
  expected_url: "**/shipping"
phases:
  - name: origin
    start_ms: 0
    duration_ms: 5000
fields:
  - name: origin company
    locator: "#origin-contact-company"
    phase: 0
"##;

        #[test]
        fn test_yaml_defaults() {
            let p = VerificationPlan::from_yaml_str(YAML).unwrap();
            assert_eq!(p.threshold, DEFAULT_THRESHOLD);
            assert_eq!(p.timeouts, Timeouts::default());
            assert_eq!(p.anchor, PhaseAnchor::Trigger);
            assert_eq!(p.poll_granularity_ms, DEFAULT_POLL_GRANULARITY_MS);
            assert_eq!(p.entry_url(), "http://localhost:3000/demo");
            assert_eq!(p.scenario.trigger_index, 1);
            p.validate().unwrap();
        }

        #[test]
        fn test_partial_timeouts_fill_defaults() {
            let yaml = format!("{YAML}timeouts:\n  transition_ms: 2500\n");
            let p = VerificationPlan::from_yaml_str(&yaml).unwrap();
            assert_eq!(p.timeouts.transition_ms, 2500);
            assert_eq!(p.timeouts.navigation_ms, DEFAULT_NAVIGATION_TIMEOUT_MS);
        }

        #[test]
        fn test_yaml_roundtrip_preserves_plan() {
            let original = plan().with_anchor(PhaseAnchor::Transition);
            let yaml = original.to_yaml().unwrap();
            assert!(yaml.contains("anchor: transition"));
            assert_eq!(VerificationPlan::from_yaml_str(&yaml).unwrap(), original);
        }

        #[test]
        fn test_from_path_by_extension() {
            let dir = tempfile::tempdir().unwrap();
            let json_path = dir.path().join("plan.json");
            std::fs::write(&json_path, serde_json::to_string(&plan()).unwrap()).unwrap();
            assert_eq!(VerificationPlan::from_path(&json_path).unwrap(), plan());

            let yaml_path = dir.path().join("plan.yaml");
            std::fs::write(&yaml_path, YAML).unwrap();
            assert_eq!(
                VerificationPlan::from_path(&yaml_path).unwrap().scenario.name,
                "healthcare"
            );
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = VerificationPlan::from_path("/nonexistent/plan.yaml").unwrap_err();
            assert!(matches!(err, HarnessError::Io(_)));
        }

        #[test]
        fn test_bad_url_regex_is_yaml_error() {
            let yaml = YAML.replace("\"**/shipping\"", "\"re:(\"");
            assert!(matches!(
                VerificationPlan::from_yaml_str(&yaml),
                Err(HarnessError::Yaml(_))
            ));
        }
    }

    #[test]
    fn test_fields_in_phase_and_duration() {
        let p = plan();
        let names: Vec<_> = p.fields_in_phase(1).map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["origin city"]);
        assert_eq!(p.total_duration(), Duration::from_secs(10));
    }
}
