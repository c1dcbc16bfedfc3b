//! Scenario data model: what to trigger, which fields to watch, and when.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::locator::Selector;
use crate::url::UrlPattern;

/// Which demo variant to run
///
/// A catalog page usually lists several "Start Demo" controls; the
/// scenario picks one by index among the trigger selector's matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoScenario {
    /// Human-readable scenario name
    pub name: String,
    /// Entry page: absolute URL or a path joined onto the plan's base URL
    pub entry_url: String,
    /// Selector for the trigger controls
    pub trigger: Selector,
    /// Index of the trigger to click among all matches
    #[serde(default)]
    pub trigger_index: usize,
    /// URL pattern the demo navigates to once triggered
    pub expected_url: UrlPattern,
}

impl DemoScenario {
    /// Create a scenario clicking the first match of `trigger`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        entry_url: impl Into<String>,
        trigger: Selector,
        expected_url: UrlPattern,
    ) -> Self {
        Self {
            name: name.into(),
            entry_url: entry_url.into(),
            trigger,
            trigger_index: 0,
            expected_url,
        }
    }

    /// Select the `index`-th trigger
    #[must_use]
    pub const fn with_trigger_index(mut self, index: usize) -> Self {
        self.trigger_index = index;
        self
    }

    /// Resolve the entry URL against `base_url`
    #[must_use]
    pub fn resolve_entry_url(&self, base_url: &str) -> String {
        if self.entry_url.contains("://") {
            return self.entry_url.clone();
        }
        let base = base_url.trim_end_matches('/');
        let path = self.entry_url.trim_start_matches('/');
        if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// A named field whose value the engine reads once its phase has elapsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Logical name (e.g., "origin contact email")
    pub name: String,
    /// How the driver finds the element
    pub locator: Selector,
    /// Index of the phase window in which it should become non-empty
    pub phase: usize,
}

impl FieldSpec {
    /// Create a field spec
    #[must_use]
    pub fn new(name: impl Into<String>, locator: Selector, phase: usize) -> Self {
        Self {
            name: name.into(),
            locator,
            phase,
        }
    }
}

/// Interval, relative to the phase anchor, in which a group of fields populates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    /// Window name used in logs and reports
    #[serde(default)]
    pub name: String,
    /// Start offset in milliseconds
    pub start_ms: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl PhaseWindow {
    /// Create a window
    #[must_use]
    pub fn new(name: impl Into<String>, start_ms: u64, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            start_ms,
            duration_ms,
        }
    }

    /// One window per name, back to back from zero, all of equal length
    #[must_use]
    pub fn uniform(names: &[&str], duration_ms: u64) -> Vec<Self> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Self::new(*name, i as u64 * duration_ms, duration_ms))
            .collect()
    }

    /// End offset in milliseconds
    #[must_use]
    pub const fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    /// Start offset
    #[must_use]
    pub const fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    /// End offset
    #[must_use]
    pub const fn end(&self) -> Duration {
        Duration::from_millis(self.end_ms())
    }

    /// Display label, falling back to the index when unnamed
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("phase-{index}")
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod scenario_tests {
        use super::*;

        fn scenario(entry: &str) -> DemoScenario {
            DemoScenario::new(
                "manufacturing",
                entry,
                Selector::css_with_text("button", "Start Demo"),
                UrlPattern::glob("**/shipping"),
            )
        }

        #[test]
        fn test_defaults_to_first_trigger() {
            assert_eq!(scenario("/demo").trigger_index, 0);
            assert_eq!(scenario("/demo").with_trigger_index(1).trigger_index, 1);
        }

        #[test]
        fn test_resolve_relative_entry() {
            assert_eq!(
                scenario("/demo").resolve_entry_url("http://localhost:3000/"),
                "http://localhost:3000/demo"
            );
            assert_eq!(
                scenario("demo").resolve_entry_url("http://localhost:3000"),
                "http://localhost:3000/demo"
            );
        }

        #[test]
        fn test_resolve_absolute_entry_ignores_base() {
            assert_eq!(
                scenario("https://staging.example.com/demo")
                    .resolve_entry_url("http://localhost:3000"),
                "https://staging.example.com/demo"
            );
        }

        #[test]
        fn test_trigger_index_defaults_when_deserialized() {
            let yaml = concat!(
                "name: x\n",
                "entry_url: /demo\n",
                "trigger: \"button:has-text('Start Demo')\"\n",
                "expected_url: \"**/shipping\"\n",
            );
            let s: DemoScenario = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(s.trigger_index, 0);
            assert_eq!(s.trigger, Selector::css_with_text("button", "Start Demo"));
        }
    }

    mod phase_window_tests {
        use super::*;

        #[test]
        fn test_end_offset() {
            let w = PhaseWindow::new("contact", 5000, 5000);
            assert_eq!(w.end_ms(), 10_000);
            assert_eq!(w.end(), Duration::from_secs(10));
            assert_eq!(w.start(), Duration::from_secs(5));
        }

        #[test]
        fn test_uniform_windows_are_contiguous() {
            let windows = PhaseWindow::uniform(&["a", "b", "c"], 5000);
            assert_eq!(windows.len(), 3);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end_ms(), pair[1].start_ms);
            }
            assert_eq!(windows[2].end_ms(), 15_000);
        }

        #[test]
        fn test_label_falls_back_to_index() {
            assert_eq!(PhaseWindow::new("", 0, 1).label(3), "phase-3");
            assert_eq!(PhaseWindow::new("origin", 0, 1).label(3), "origin");
        }
    }
}
