//! Plan loading and run orchestration
//!
//! [`verify`] is generic over the driver so the whole CLI flow (hooks,
//! artifacts, diagnostics on fatal errors) runs against the scripted
//! driver in tests and against Chromium in the binary.

use async_trait::async_trait;
use demo_harness::{
    capture_diagnostics, preset, ArtifactSink, BrowserConfig, Checkpoint, CheckpointRecorder,
    Clock, DemoDriver, DemoEngine, FailureClass, HarnessResult, RunHooks, RunReport,
    VerificationPlan,
};
use indicatif::ProgressBar;
use std::path::Path;

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};

/// Preset used when neither `--plan` nor `--preset` is given
pub const DEFAULT_PRESET: &str = "manufacturing";

/// Exit code for runs that ended without a verdict
pub const FATAL_EXIT_CODE: u8 = 2;

/// Verdict of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Success rate met the threshold
    Passed,
    /// Success rate fell short
    Failed,
}

impl Outcome {
    /// Outcome of a report
    #[must_use]
    pub const fn of(report: &RunReport) -> Self {
        if report.verdict.passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    /// Process exit code
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
        }
    }
}

/// Resolve the plan named by the run arguments and apply overrides
pub fn load_plan(args: &RunArgs) -> CliResult<VerificationPlan> {
    let mut plan = match (&args.plan, &args.preset) {
        (Some(path), _) => VerificationPlan::from_path(path)?,
        (None, Some(name)) => preset(name)?,
        (None, None) => preset(DEFAULT_PRESET)?,
    };
    if let Some(base_url) = &args.base_url {
        plan = plan.with_base_url(base_url.clone());
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CliError::invalid_argument(format!(
                "threshold {threshold} is outside [0, 1]"
            )));
        }
        plan = plan.with_threshold(threshold);
    }
    plan.validate()?;
    Ok(plan)
}

/// Parse and validate a plan file
pub fn validate_file(path: &Path) -> CliResult<VerificationPlan> {
    let plan = VerificationPlan::from_path(path)?;
    plan.validate()?;
    Ok(plan)
}

/// Browser settings from the run arguments
#[must_use]
pub fn browser_config(args: &RunArgs) -> BrowserConfig {
    let mut config = BrowserConfig::default().with_headless(args.headless);
    if args.no_sandbox {
        config = config.with_no_sandbox();
    }
    if let Some(path) = &args.chromium {
        config = config.with_chromium_path(path.to_string_lossy());
    }
    config
}

/// Checkpoint hooks for CLI runs: spinner text plus screenshots
struct CliHooks {
    recorder: CheckpointRecorder,
    spinner: Option<ProgressBar>,
}

#[async_trait]
impl RunHooks for CliHooks {
    async fn on_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        driver: &dyn DemoDriver,
    ) -> HarnessResult<()> {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(checkpoint.label());
        }
        self.recorder.on_checkpoint(checkpoint, driver).await
    }
}

/// Run one plan, writing artifacts into `sink`
///
/// A completed run writes `report.json`. A fatal error captures a
/// screenshot, the URL and console output before the browser is closed.
pub async fn verify<D, C>(
    engine: DemoEngine<D, C>,
    plan: &VerificationPlan,
    sink: &ArtifactSink,
    every_checkpoint: bool,
    spinner: Option<ProgressBar>,
) -> CliResult<RunReport>
where
    D: DemoDriver,
    C: Clock,
{
    let mut recorder = CheckpointRecorder::new(sink.clone());
    if every_checkpoint {
        recorder = recorder.every_checkpoint();
    }
    let mut engine = engine.with_hooks(CliHooks { recorder, spinner });

    let outcome = match engine.run(plan).await {
        Ok(report) => {
            let path = sink.write_report(&report).await?;
            tracing::info!(path = %path.display(), "report written");
            Ok(report)
        }
        Err(e) if e.class() == FailureClass::Plan => Err(e.into()),
        Err(source) => {
            tracing::error!(error = %source, "run aborted, capturing diagnostics");
            let diagnostics = capture_diagnostics(engine.driver(), "error").await;
            let artifacts = match sink.write_diagnostics(&diagnostics).await {
                Ok(_) => Some(sink.dir().to_path_buf()),
                Err(e) => {
                    tracing::warn!(error = %e, "could not write diagnostics");
                    None
                }
            };
            Err(CliError::RunAborted { source, artifacts })
        }
    };

    if let Err(e) = engine.driver_mut().close().await {
        tracing::warn!(error = %e, "browser did not close cleanly");
    }
    outcome
}
