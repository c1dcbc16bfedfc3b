//! Page probes: read-only observations that do not affect the verdict.
//!
//! Probes answer questions like "how many Start Demo buttons were there"
//! or "is the demo progress bar visible" so a failing report carries
//! enough context to tell a broken catalog page from a broken autofill.

use serde::{Deserialize, Serialize};

use crate::driver::DemoDriver;
use crate::locator::Selector;

/// When a probe runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStage {
    /// After the entry page reached quiescence
    #[default]
    Entry,
    /// After the post-trigger navigation
    Transition,
}

/// What a probe reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Number of matching elements
    #[default]
    Count,
    /// Text content of the first match
    Text,
    /// Whether anything matches
    Present,
    /// Whether the first match is visible
    Visible,
}

/// A named probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProbe {
    /// Probe name
    pub name: String,
    /// Element selector
    pub selector: Selector,
    /// What to read
    #[serde(default)]
    pub kind: ProbeKind,
    /// When to read it
    #[serde(default)]
    pub stage: ProbeStage,
}

impl PageProbe {
    /// Create a probe
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        selector: Selector,
        kind: ProbeKind,
        stage: ProbeStage,
    ) -> Self {
        Self {
            name: name.into(),
            selector,
            kind,
            stage,
        }
    }
}

/// Value read by a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbeValue {
    /// From [`ProbeKind::Count`]
    Count(usize),
    /// From [`ProbeKind::Present`] and [`ProbeKind::Visible`]
    Flag(bool),
    /// From [`ProbeKind::Text`]
    Text(String),
}

impl std::fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Text(t) => write!(f, "{t:?}"),
        }
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probe name
    pub name: String,
    /// Stage it ran at
    pub stage: ProbeStage,
    /// Value, when the read succeeded
    pub value: Option<ProbeValue>,
    /// Error message, when it did not
    pub error: Option<String>,
}

/// Run every probe registered for `stage`, in declaration order
///
/// Failures are captured per probe; this never aborts.
pub async fn run_probes<D>(driver: &D, probes: &[PageProbe], stage: ProbeStage) -> Vec<ProbeResult>
where
    D: DemoDriver + ?Sized,
{
    let mut results = Vec::new();
    for probe in probes.iter().filter(|p| p.stage == stage) {
        let outcome = match probe.kind {
            ProbeKind::Count => driver.count(&probe.selector).await.map(ProbeValue::Count),
            ProbeKind::Present => driver
                .count(&probe.selector)
                .await
                .map(|n| ProbeValue::Flag(n > 0)),
            ProbeKind::Text => driver
                .text_content(&probe.selector)
                .await
                .map(|t| ProbeValue::Text(t.trim().to_string())),
            ProbeKind::Visible => driver.is_visible(&probe.selector).await.map(ProbeValue::Flag),
        };
        let (value, error) = match outcome {
            Ok(v) => {
                tracing::debug!(probe = %probe.name, value = %v, "probe");
                (Some(v), None)
            }
            Err(e) => {
                tracing::debug!(probe = %probe.name, error = %e, "probe failed");
                (None, Some(e.to_string()))
            }
        };
        results.push(ProbeResult {
            name: probe.name.clone(),
            stage,
            value,
            error,
        });
    }
    results
}
