//! Observations and the scored verdict.
//!
//! Observations are recorded by the engine as each phase elapses and are
//! never modified afterwards. The verdict is computed once from the full
//! observation sequence: a field is populated when its observed value is
//! non-empty, and the success rate is taken over declared fields only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scenario::FieldSpec;

/// The value read from one field at one point in the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Field name
    pub field: String,
    /// Phase index the read belongs to
    pub phase: usize,
    /// Raw value; empty when the read failed
    pub value: String,
    /// Milliseconds since the phase anchor at which the read happened
    pub read_at_ms: u64,
    /// Field-level read failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    /// A successful read
    #[must_use]
    pub fn read(
        field: impl Into<String>,
        phase: usize,
        value: impl Into<String>,
        read_at_ms: u64,
    ) -> Self {
        Self {
            field: field.into(),
            phase,
            value: value.into(),
            read_at_ms,
            error: None,
        }
    }

    /// A failed read, recorded as an empty value
    #[must_use]
    pub fn failed(
        field: impl Into<String>,
        phase: usize,
        error: impl Into<String>,
        read_at_ms: u64,
    ) -> Self {
        Self {
            field: field.into(),
            phase,
            value: String::new(),
            read_at_ms,
            error: Some(error.into()),
        }
    }

    /// Whether the value is non-empty
    #[must_use]
    pub fn is_populated(&self) -> bool {
        !self.value.is_empty()
    }
}

/// Scored result for one declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOutcome {
    /// Field name
    pub name: String,
    /// Declared phase index
    pub phase: usize,
    /// Whether the field held a non-empty value
    pub populated: bool,
    /// Observed value, if the field was observed
    pub value: Option<String>,
}

/// Populated counts for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Phase index
    pub phase: usize,
    /// Populated fields in this phase
    pub populated: usize,
    /// Declared fields in this phase
    pub total: usize,
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// One outcome per declared field, in declaration order
    pub fields: Vec<FieldOutcome>,
    /// Populated field count
    pub populated: usize,
    /// Declared field count
    pub total: usize,
    /// `populated / total`
    pub success_rate: f64,
    /// Threshold the rate was compared against
    pub threshold: f64,
    /// `success_rate >= threshold`
    pub passed: bool,
    /// Non-fatal adapter problems seen during the run
    #[serde(default)]
    pub adapter_failures: Vec<String>,
}

impl Verdict {
    /// Score `observations` against the declared `fields`
    ///
    /// Observations for names that were not declared are ignored. A
    /// declared field with no observation counts as unpopulated. When a
    /// field was observed more than once the last observation wins.
    #[must_use]
    pub fn score(
        fields: &[FieldSpec],
        observations: &[Observation],
        threshold: f64,
        adapter_failures: Vec<String>,
    ) -> Self {
        let latest: HashMap<&str, &Observation> = observations
            .iter()
            .map(|o| (o.field.as_str(), o))
            .collect();

        let outcomes: Vec<FieldOutcome> = fields
            .iter()
            .map(|spec| {
                let observed = latest.get(spec.name.as_str());
                FieldOutcome {
                    name: spec.name.clone(),
                    phase: spec.phase,
                    populated: observed.is_some_and(|o| o.is_populated()),
                    value: observed.map(|o| o.value.clone()),
                }
            })
            .collect();

        let total = outcomes.len();
        let populated = outcomes.iter().filter(|o| o.populated).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            populated as f64 / total as f64
        };

        Self {
            fields: outcomes,
            populated,
            total,
            success_rate,
            threshold,
            passed: success_rate >= threshold,
            adapter_failures,
        }
    }

    /// Fields that were not populated
    pub fn failing_fields(&self) -> impl Iterator<Item = &FieldOutcome> + '_ {
        self.fields.iter().filter(|f| !f.populated)
    }

    /// Populated counts grouped by phase, ascending
    #[must_use]
    pub fn per_phase(&self) -> Vec<PhaseSummary> {
        let mut summaries: Vec<PhaseSummary> = Vec::new();
        for field in &self.fields {
            let idx = match summaries.iter().position(|s| s.phase == field.phase) {
                Some(idx) => idx,
                None => {
                    summaries.push(PhaseSummary {
                        phase: field.phase,
                        populated: 0,
                        total: 0,
                    });
                    summaries.len() - 1
                }
            };
            summaries[idx].total += 1;
            if field.populated {
                summaries[idx].populated += 1;
            }
        }
        summaries.sort_by_key(|s| s.phase);
        summaries
    }

    /// Success rate as a percentage
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.success_rate * 100.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Selector;
    use proptest::prelude::*;

    fn fields(n: usize) -> Vec<FieldSpec> {
        (0..n)
            .map(|i| FieldSpec::new(format!("f{i}"), Selector::css(format!("#f{i}")), i % 4))
            .collect()
    }

    fn observe(fields: &[FieldSpec], empty: &[usize]) -> Vec<Observation> {
        fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let value = if empty.contains(&i) { "" } else { "value" };
                Observation::read(&f.name, f.phase, value, 5000)
            })
            .collect()
    }

    mod score_tests {
        use super::*;

        #[test]
        fn test_all_populated() {
            let f = fields(17);
            let v = Verdict::score(&f, &observe(&f, &[]), 0.7, Vec::new());
            assert_eq!(v.populated, 17);
            assert_eq!(v.success_rate, 1.0);
            assert!(v.passed);
        }

        #[test]
        fn test_twelve_of_seventeen() {
            let f = fields(17);
            let obs = observe(&f, &[1, 4, 7, 10, 13]);
            let at_70 = Verdict::score(&f, &obs, 0.7, Vec::new());
            assert_eq!(at_70.populated, 12);
            assert!((at_70.success_rate - 12.0 / 17.0).abs() < 1e-12);
            assert!(at_70.passed);
            assert!(!Verdict::score(&f, &obs, 0.8, Vec::new()).passed);
        }

        #[test]
        fn test_threshold_is_inclusive() {
            let f = fields(4);
            let v = Verdict::score(&f, &observe(&f, &[0]), 0.75, Vec::new());
            assert!(v.passed);
            let full = Verdict::score(&f, &observe(&f, &[]), 1.0, Vec::new());
            assert!(full.passed);
            let short = Verdict::score(&f, &observe(&f, &[3]), 1.0, Vec::new());
            assert!(!short.passed);
        }

        #[test]
        fn test_undeclared_observations_ignored() {
            let f = fields(2);
            let mut obs = observe(&f, &[1]);
            obs.push(Observation::read("page title", 0, "Demo", 0));
            let v = Verdict::score(&f, &obs, 0.5, Vec::new());
            assert_eq!(v.total, 2);
            assert_eq!(v.populated, 1);
        }

        #[test]
        fn test_missing_observation_is_unpopulated() {
            let f = fields(3);
            let obs = observe(&f[..2], &[]);
            let v = Verdict::score(&f, &obs, 0.5, Vec::new());
            assert_eq!(v.populated, 2);
            assert_eq!(v.fields[2].value, None);
            assert!(!v.fields[2].populated);
        }

        #[test]
        fn test_failed_read_is_unpopulated() {
            let f = fields(1);
            let obs = vec![Observation::failed("f0", 0, "Element not found: #f0", 5000)];
            let v = Verdict::score(&f, &obs, 0.0, Vec::new());
            assert_eq!(v.populated, 0);
            assert_eq!(v.fields[0].value.as_deref(), Some(""));
            assert!(v.passed);
        }

        #[test]
        fn test_adapter_failures_carried() {
            let f = fields(1);
            let v = Verdict::score(&f, &observe(&f, &[]), 0.7, vec!["screenshot failed".into()]);
            assert_eq!(v.adapter_failures, vec!["screenshot failed".to_string()]);
        }
    }

    mod breakdown_tests {
        use super::*;

        #[test]
        fn test_failing_fields_in_order() {
            let f = fields(6);
            let v = Verdict::score(&f, &observe(&f, &[5, 2]), 0.7, Vec::new());
            let names: Vec<_> = v.failing_fields().map(|o| o.name.as_str()).collect();
            assert_eq!(names, vec!["f2", "f5"]);
        }

        #[test]
        fn test_per_phase_counts() {
            let f = fields(8);
            let v = Verdict::score(&f, &observe(&f, &[0, 4, 3]), 0.7, Vec::new());
            let phases = v.per_phase();
            assert_eq!(phases.len(), 4);
            assert_eq!(phases[0], PhaseSummary { phase: 0, populated: 0, total: 2 });
            assert_eq!(phases[1], PhaseSummary { phase: 1, populated: 2, total: 2 });
            assert_eq!(phases[3], PhaseSummary { phase: 3, populated: 1, total: 2 });
        }

        #[test]
        fn test_percent() {
            let f = fields(4);
            let v = Verdict::score(&f, &observe(&f, &[0]), 0.7, Vec::new());
            assert!((v.percent() - 75.0).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn prop_rate_is_populated_over_declared(
            populated in proptest::collection::vec(any::<bool>(), 1..40),
            extra in 0usize..5,
            threshold in 0.0f64..=1.0,
        ) {
            let f = fields(populated.len());
            let mut obs: Vec<Observation> = f
                .iter()
                .zip(&populated)
                .map(|(spec, p)| {
                    Observation::read(&spec.name, spec.phase, if *p { "x" } else { "" }, 0)
                })
                .collect();
            for i in 0..extra {
                obs.push(Observation::read(format!("incidental{i}"), 0, "x", 0));
            }
            let v = Verdict::score(&f, &obs, threshold, Vec::new());
            let expected = populated.iter().filter(|p| **p).count();
            prop_assert_eq!(v.populated, expected);
            prop_assert_eq!(v.total, populated.len());
            prop_assert_eq!(v.success_rate, expected as f64 / populated.len() as f64);
            prop_assert_eq!(v.passed, v.success_rate >= threshold);
        }
    }
}
