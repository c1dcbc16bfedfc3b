//! Demo Verification Engine.
//!
//! One run follows a fixed protocol:
//!
//! 1. load the entry page and wait for network quiescence
//! 2. click the scenario's trigger control
//! 3. wait for the post-trigger URL
//! 4. for each phase window, wait until the window has fully elapsed since
//!    the anchor, then read every field declared for that phase once
//! 5. score the observations
//!
//! Steps 1-3 fail fast with a named error. Nothing is retried. Individual
//! field reads that fail are recorded as empty observations and the run
//! carries on. The engine writes no artifacts; callers attach
//! [`RunHooks`] or capture diagnostics themselves when `run` fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::driver::DemoDriver;
use crate::plan::{PhaseAnchor, VerificationPlan};
use crate::probe::{run_probes, ProbeResult, ProbeStage};
use crate::result::{HarnessError, HarnessResult};
use crate::scenario::{DemoScenario, FieldSpec, PhaseWindow};
use crate::verdict::{Observation, Verdict};

/// Points in a run at which hooks are invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Entry page reached quiescence
    EntryLoaded,
    /// Trigger was clicked
    Triggered,
    /// Expected URL matched
    Transitioned,
    /// Fields of phase `k` were read
    PhaseComplete(usize),
    /// All phases processed, before scoring
    Finished,
}

impl Checkpoint {
    /// Short label, also used for artifact names
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::EntryLoaded => "initial".to_string(),
            Self::Triggered => "started".to_string(),
            Self::Transitioned => "transitioned".to_string(),
            Self::PhaseComplete(k) => format!("phase-{k}"),
            Self::Finished => "final".to_string(),
        }
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Observer invoked at each [`Checkpoint`]
///
/// Errors are logged and recorded in the verdict's adapter failures; they
/// never abort the run.
#[async_trait]
pub trait RunHooks: Send {
    /// Called at `checkpoint` with read access to the live session
    async fn on_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        driver: &dyn DemoDriver,
    ) -> HarnessResult<()>;
}

/// Everything a run returns besides fatal errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Scenario name
    pub scenario: String,
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,
    /// Scored result
    pub verdict: Verdict,
    /// Every observation, in the order it was taken
    pub observations: Vec<Observation>,
    /// Probe results from both stages
    #[serde(default)]
    pub probes: Vec<ProbeResult>,
    /// Phase offset origin used
    pub anchor: PhaseAnchor,
    /// Time from trigger click to URL match
    pub transition_ms: u64,
    /// Total run time
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Whether the verdict passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.verdict.passed
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Drives one browser session through verification runs
pub struct DemoEngine<D, C = SystemClock> {
    driver: D,
    clock: C,
    hooks: Option<Box<dyn RunHooks>>,
}

impl<D: std::fmt::Debug, C: std::fmt::Debug> std::fmt::Debug for DemoEngine<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoEngine")
            .field("driver", &self.driver)
            .field("clock", &self.clock)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl<D: DemoDriver> DemoEngine<D, SystemClock> {
    /// Create an engine on the system clock
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self::with_clock(driver, SystemClock::new())
    }
}

impl<D: DemoDriver, C: Clock> DemoEngine<D, C> {
    /// Create an engine on an explicit clock
    ///
    /// The driver's own waits must run on the same time source.
    #[must_use]
    pub fn with_clock(driver: D, clock: C) -> Self {
        Self {
            driver,
            clock,
            hooks: None,
        }
    }

    /// Attach checkpoint hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl RunHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// The underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The underlying driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Release the driver
    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run a plan built from its parts with default timeouts
    pub async fn run_scenario(
        &mut self,
        scenario: DemoScenario,
        phases: Vec<PhaseWindow>,
        fields: Vec<FieldSpec>,
        threshold: f64,
    ) -> HarnessResult<RunReport> {
        let plan = VerificationPlan::new(scenario, phases, fields, threshold);
        self.run(&plan).await
    }

    /// Verify one plan
    ///
    /// Returns a report for any completed run, passing or not. Errors are
    /// either plan violations or fatal run failures.
    pub async fn run(&mut self, plan: &VerificationPlan) -> HarnessResult<RunReport> {
        plan.validate()?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, scenario = %plan.scenario.name);
        self.execute(plan, run_id).instrument(span).await
    }

    async fn execute(&mut self, plan: &VerificationPlan, run_id: Uuid) -> HarnessResult<RunReport> {
        let started_at = Utc::now();
        let started = self.clock.now();
        let mut adapter_failures = Vec::new();

        self.load_entry(plan).await?;
        self.checkpoint(Checkpoint::EntryLoaded, &mut adapter_failures).await;
        let mut probes = run_probes(&self.driver, &plan.probes, ProbeStage::Entry).await;

        let triggered_at = self.trigger(&plan.scenario).await?;
        self.checkpoint(Checkpoint::Triggered, &mut adapter_failures).await;

        let transitioned_at = self.await_transition(plan).await?;
        let transition_ms = millis(transitioned_at.saturating_sub(triggered_at));
        tracing::info!(transition_ms, "transition complete");
        self.checkpoint(Checkpoint::Transitioned, &mut adapter_failures).await;
        probes.extend(run_probes(&self.driver, &plan.probes, ProbeStage::Transition).await);

        let anchor = match plan.anchor {
            PhaseAnchor::Trigger => triggered_at,
            PhaseAnchor::Transition => transitioned_at,
        };
        let mut observations = Vec::with_capacity(plan.fields.len());
        for (index, window) in plan.phases.iter().enumerate() {
            let span = tracing::debug_span!("phase", index, name = %window.label(index));
            self.observe_phase(plan, index, window, anchor, &mut observations)
                .instrument(span)
                .await?;
            self.checkpoint(Checkpoint::PhaseComplete(index), &mut adapter_failures).await;
        }
        self.checkpoint(Checkpoint::Finished, &mut adapter_failures).await;

        let verdict = Verdict::score(&plan.fields, &observations, plan.threshold, adapter_failures);
        tracing::info!(
            populated = verdict.populated,
            total = verdict.total,
            success_rate = verdict.success_rate,
            threshold = verdict.threshold,
            passed = verdict.passed,
            "verdict"
        );

        Ok(RunReport {
            run_id,
            scenario: plan.scenario.name.clone(),
            started_at,
            verdict,
            observations,
            probes,
            anchor: plan.anchor,
            transition_ms,
            elapsed_ms: millis(self.clock.now().saturating_sub(started)),
        })
    }

    async fn load_entry(&mut self, plan: &VerificationPlan) -> HarnessResult<()> {
        let url = plan.entry_url();
        tracing::info!(%url, "loading entry page");
        match self
            .driver
            .goto_and_wait_idle(&url, plan.timeouts.navigation())
            .await
        {
            Ok(()) => Ok(()),
            Err(HarnessError::Timeout { ms }) => Err(HarnessError::Navigation {
                url,
                message: format!("network did not become idle within {ms}ms"),
            }),
            Err(e) => Err(e),
        }
    }

    async fn trigger(&mut self, scenario: &DemoScenario) -> HarnessResult<Duration> {
        let selector = &scenario.trigger;
        let index = scenario.trigger_index;
        let matched = match self.driver.count(selector).await {
            Ok(matched) => matched,
            Err(HarnessError::ElementRead { message, .. }) => {
                tracing::warn!(%selector, %message, "trigger selector rejected by page");
                0
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(%selector, matched, index, "trigger candidates");
        let not_found = || HarnessError::TriggerNotFound {
            selector: selector.to_string(),
            index,
            matched,
        };
        if matched <= index {
            return Err(not_found());
        }
        match self.driver.click_nth(selector, index).await {
            Ok(()) => {}
            Err(HarnessError::ElementNotFound { .. }) => return Err(not_found()),
            Err(e) => return Err(e),
        }
        tracing::info!(%selector, index, "demo triggered");
        Ok(self.clock.now())
    }

    async fn await_transition(&mut self, plan: &VerificationPlan) -> HarnessResult<Duration> {
        let pattern = &plan.scenario.expected_url;
        match self
            .driver
            .wait_for_url(pattern, plan.timeouts.transition())
            .await
        {
            Ok(()) => Ok(self.clock.now()),
            Err(HarnessError::Timeout { .. }) => {
                let last_url = match self.driver.current_url().await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!(error = %e, "could not read URL after transition timeout");
                        String::new()
                    }
                };
                Err(HarnessError::TransitionTimeout {
                    pattern: pattern.to_string(),
                    timeout_ms: plan.timeouts.transition_ms,
                    last_url,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn observe_phase(
        &mut self,
        plan: &VerificationPlan,
        index: usize,
        window: &PhaseWindow,
        anchor: Duration,
        observations: &mut Vec<Observation>,
    ) -> HarnessResult<()> {
        let deadline = anchor + window.end();
        let now = self.clock.now();
        if deadline > now {
            tracing::debug!(wait_ms = millis(deadline - now), "waiting out phase window");
            self.driver.wait_for_timeout(deadline - now).await;
        }
        // Drivers may return early; never read before the window has elapsed
        self.clock.sleep_until(deadline).await;

        for field in plan.fields_in_phase(index) {
            let read_at_ms = millis(self.clock.now().saturating_sub(anchor));
            let observation = match self.driver.input_value(&field.locator).await {
                Ok(value) => Observation::read(&field.name, index, value, read_at_ms),
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(field = %field.name, error = %e, "field read failed");
                    Observation::failed(&field.name, index, e.to_string(), read_at_ms)
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(
                field = %field.name,
                populated = observation.is_populated(),
                "observed"
            );
            observations.push(observation);
        }
        Ok(())
    }

    async fn checkpoint(&mut self, checkpoint: Checkpoint, failures: &mut Vec<String>) {
        let Some(hooks) = self.hooks.as_mut() else {
            return;
        };
        if let Err(e) = hooks.on_checkpoint(checkpoint, &self.driver).await {
            tracing::warn!(%checkpoint, error = %e, "checkpoint hook failed");
            failures.push(format!("{checkpoint}: {e}"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::locator::Selector;
    use crate::mock::ScriptedDriver;
    use crate::url::UrlPattern;

    fn trigger() -> Selector {
        Selector::css_with_text("button", "Start Demo")
    }

    fn plan() -> VerificationPlan {
        VerificationPlan::new(
            DemoScenario::new("demo", "/demo", trigger(), UrlPattern::glob("**/shipping")),
            PhaseWindow::uniform(&["origin", "destination"], 5000),
            vec![
                FieldSpec::new("origin name", Selector::css("#origin-contact-name"), 0),
                FieldSpec::new("destination city", Selector::css("#destination-city"), 1),
            ],
            0.7,
        )
    }

    fn working_page(clock: &VirtualClock) -> ScriptedDriver {
        ScriptedDriver::new(clock.clone())
            .with_entry_load(Duration::from_millis(400))
            .with_elements(trigger(), 2)
            .on_click_navigate("http://localhost:3000/shipping", Duration::from_millis(700))
            .with_field(Selector::css("#origin-contact-name"), "Jane", Duration::from_secs(2))
            .with_field(Selector::css("#destination-city"), "Austin", Duration::from_secs(8))
    }

    #[test]
    fn test_checkpoint_labels() {
        assert_eq!(Checkpoint::EntryLoaded.label(), "initial");
        assert_eq!(Checkpoint::Triggered.label(), "started");
        assert_eq!(Checkpoint::PhaseComplete(2).to_string(), "phase-2");
        assert_eq!(Checkpoint::Finished.to_string(), "final");
    }

    #[tokio::test]
    async fn test_invalid_plan_touches_nothing() {
        let clock = VirtualClock::new();
        let mut engine = DemoEngine::with_clock(working_page(&clock), clock.clone());
        let bad = plan().with_threshold(2.0);
        let err = engine.run(&bad).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPlan { .. }));
        assert!(engine.driver().call_log().is_empty());
    }

    #[tokio::test]
    async fn test_report_timings() {
        let clock = VirtualClock::new();
        let mut engine = DemoEngine::with_clock(working_page(&clock), clock.clone());
        let report = engine.run(&plan()).await.unwrap();
        assert!(report.passed());
        assert_eq!(report.transition_ms, 700);
        // 400ms load + 10s of windows from the trigger
        assert_eq!(report.elapsed_ms, 10_400);
        assert_eq!(report.observations[0].read_at_ms, 5000);
        assert_eq!(report.observations[1].read_at_ms, 10_000);
    }

    #[tokio::test]
    async fn test_transition_anchor_shifts_reads() {
        let clock = VirtualClock::new();
        let mut engine = DemoEngine::with_clock(working_page(&clock), clock.clone());
        let report = engine
            .run(&plan().with_anchor(PhaseAnchor::Transition))
            .await
            .unwrap();
        assert_eq!(report.anchor, PhaseAnchor::Transition);
        assert_eq!(report.elapsed_ms, 400 + 700 + 10_000);
    }

    #[tokio::test]
    async fn test_trigger_index_beyond_matches() {
        let clock = VirtualClock::new();
        let mut engine = DemoEngine::with_clock(working_page(&clock), clock.clone());
        let mut p = plan();
        p.scenario.trigger_index = 2;
        match engine.run(&p).await {
            Err(HarnessError::TriggerNotFound { index, matched, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(matched, 2);
            }
            other => panic!("expected TriggerNotFound, got {other:?}"),
        }
        assert!(!engine.driver().was_called("click_nth"));
    }

    #[tokio::test]
    async fn test_report_json_contains_verdict() {
        let clock = VirtualClock::new();
        let mut engine = DemoEngine::with_clock(working_page(&clock), clock.clone());
        let report = engine.run(&plan()).await.unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"success_rate\": 1.0"));
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, report.run_id);
    }
}
