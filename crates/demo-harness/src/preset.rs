//! Built-in plans for the shipping-form demos.
//!
//! Timings are the empirical 5 s windows measured from the moment the
//! shipping page is reached. They are starting points for calibration,
//! not facts about the application.

use crate::locator::Selector;
use crate::plan::{PhaseAnchor, VerificationPlan};
use crate::probe::{PageProbe, ProbeKind, ProbeStage};
use crate::result::{HarnessError, HarnessResult};
use crate::scenario::{DemoScenario, FieldSpec, PhaseWindow};
use crate::url::UrlPattern;

/// Length of each autofill phase window
pub const PHASE_WINDOW_MS: u64 = 5000;

/// Names accepted by [`preset`]
pub const PRESET_NAMES: [&str; 3] = ["manufacturing", "manufacturing-origin", "healthcare"];

fn start_demo() -> Selector {
    Selector::css_with_text("button", "Start Demo")
}

fn shipping_scenario(name: &str, trigger_index: usize) -> DemoScenario {
    DemoScenario::new(name, "/demo", start_demo(), UrlPattern::glob("**/shipping"))
        .with_trigger_index(trigger_index)
}

fn field(name: &str, css: &str, phase: usize) -> FieldSpec {
    FieldSpec::new(name, Selector::css(css), phase)
}

fn origin_contact(phase: usize) -> Vec<FieldSpec> {
    vec![
        field("origin contact name", "#origin-contact-name", phase),
        field("origin contact company", "#origin-contact-company", phase),
        field("origin contact phone", "#origin-contact-phone", phase),
        field("origin contact email", "#origin-contact-email", phase),
    ]
}

fn origin_address(phase: usize) -> Vec<FieldSpec> {
    vec![
        field("origin address", "#origin-address", phase),
        field("origin city", "#origin-city", phase),
        field("origin state", "#origin-state", phase),
        field("origin zip", "#origin-zip", phase),
    ]
}

/// Probes for catalog and demo-mode UI
#[must_use]
pub fn default_probes() -> Vec<PageProbe> {
    vec![
        PageProbe::new("heading", Selector::css("h1"), ProbeKind::Text, ProbeStage::Entry),
        PageProbe::new(
            "demo cards",
            Selector::css(".grid .card, [class*='card']"),
            ProbeKind::Count,
            ProbeStage::Entry,
        ),
        PageProbe::new("start buttons", start_demo(), ProbeKind::Count, ProbeStage::Entry),
        PageProbe::new(
            "demo in progress",
            Selector::text("Demo in progress"),
            ProbeKind::Present,
            ProbeStage::Transition,
        ),
        PageProbe::new(
            "progress bar",
            Selector::css("[class*='progress'], .fixed.top-0"),
            ProbeKind::Visible,
            ProbeStage::Transition,
        ),
        PageProbe::new(
            "demo controls",
            Selector::css("[class*='demo-control'], .fixed"),
            ProbeKind::Visible,
            ProbeStage::Transition,
        ),
    ]
}

/// Full manufacturing walkthrough: 17 fields over four windows
#[must_use]
pub fn manufacturing() -> VerificationPlan {
    let mut fields = origin_contact(0);
    fields.extend(origin_address(1));
    fields.extend([
        field("destination contact name", "#destination-contact-name", 2),
        field("destination contact company", "#destination-contact-company", 2),
        field("destination address", "#destination-address", 2),
        field("destination city", "#destination-city", 2),
        field("package weight", "#package-weight-value", 3),
        FieldSpec::new("package length", Selector::test_id("dimension-length"), 3),
        FieldSpec::new("package width", Selector::test_id("dimension-width"), 3),
        FieldSpec::new("package height", Selector::test_id("dimension-height"), 3),
        field("package declared value", "#package-declared-value", 3),
    ]);

    VerificationPlan::new(
        shipping_scenario("manufacturing", 0),
        PhaseWindow::uniform(
            &["origin contact", "origin address", "destination", "package"],
            PHASE_WINDOW_MS,
        ),
        fields,
        0.7,
    )
    .with_anchor(PhaseAnchor::Transition)
    .with_probes(default_probes())
}

/// Origin section only, read once at 8 s with a stricter threshold
#[must_use]
pub fn manufacturing_origin() -> VerificationPlan {
    let mut fields = origin_contact(0);
    fields.extend(origin_address(0));
    VerificationPlan::new(
        shipping_scenario("manufacturing-origin", 0),
        vec![PhaseWindow::new("origin", 0, 8000)],
        fields,
        0.8,
    )
    .with_anchor(PhaseAnchor::Transition)
    .with_probes(default_probes())
}

/// Second catalog demo: origin company after the first window
#[must_use]
pub fn healthcare() -> VerificationPlan {
    VerificationPlan::new(
        shipping_scenario("healthcare", 1),
        vec![PhaseWindow::new("origin contact", 0, PHASE_WINDOW_MS)],
        vec![field("origin contact company", "#origin-contact-company", 0)],
        0.7,
    )
    .with_anchor(PhaseAnchor::Transition)
}

/// Look up a preset by name
pub fn preset(name: &str) -> HarnessResult<VerificationPlan> {
    match name {
        "manufacturing" => Ok(manufacturing()),
        "manufacturing-origin" => Ok(manufacturing_origin()),
        "healthcare" => Ok(healthcare()),
        other => Err(HarnessError::invalid_plan(format!(
            "unknown preset '{other}' (available: {})",
            PRESET_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_validates() {
        for name in PRESET_NAMES {
            preset(name).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn test_manufacturing_shape() {
        let plan = manufacturing();
        assert_eq!(plan.fields.len(), 17);
        assert_eq!(plan.phases.len(), 4);
        assert_eq!(plan.total_duration().as_millis(), 20_000);
        let per_phase: Vec<usize> = (0..4).map(|i| plan.fields_in_phase(i).count()).collect();
        assert_eq!(per_phase, vec![4, 4, 4, 5]);
        assert_eq!(plan.scenario.trigger_index, 0);
        assert!(plan.scenario.expected_url.matches("http://localhost:3000/shipping"));
    }

    #[test]
    fn test_healthcare_uses_second_trigger() {
        let plan = healthcare();
        assert_eq!(plan.scenario.trigger_index, 1);
        assert_eq!(plan.fields.len(), 1);
        assert_eq!(plan.phases[0].end_ms(), 5000);
    }

    #[test]
    fn test_unknown_preset() {
        let err = preset("retail").unwrap_err();
        assert!(err.to_string().contains("manufacturing"));
    }

    #[test]
    fn test_preset_yaml_roundtrip() {
        let plan = manufacturing();
        let yaml = plan.to_yaml().unwrap();
        assert!(yaml.contains("testid=dimension-length"));
        assert_eq!(VerificationPlan::from_yaml_str(&yaml).unwrap(), plan);
    }
}
