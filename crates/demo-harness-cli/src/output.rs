//! Output formatting and progress reporting

use console::{style, Term};
use demo_harness::{HarnessResult, ProbeStage, RunReport, VerificationPlan};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::time::Duration;

use crate::commands::ReportFormat;

/// Progress reporter for a verification run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner that runs while phases elapse
    ///
    /// Returns a handle the run hooks update with checkpoint names.
    pub fn start_spinner(&mut self, message: &str) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message(message.to_string());
        self.spinner = Some(spinner.clone());
        Some(spinner)
    }

    /// Stop and clear the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print the verdict line, preceded by any artifact capture problems
    pub fn verdict(&self, report: &RunReport) {
        let v = &report.verdict;
        for failure in &v.adapter_failures {
            self.warning(&format!("artifact capture: {failure}"));
        }
        let line = format!(
            "{}: {}/{} fields populated ({:.1}%, threshold {:.0}%)",
            report.scenario,
            v.populated,
            v.total,
            v.percent(),
            v.threshold * 100.0
        );
        if v.passed {
            self.success(&line);
        } else {
            self.failure(&line);
        }
    }
}

/// Render a report in the requested format
pub fn render_report(report: &RunReport, format: ReportFormat) -> HarnessResult<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => report.to_json(),
    }
}

/// One line per phase window: label, offsets and field count
#[must_use]
pub fn render_phase_layout(plan: &VerificationPlan) -> Vec<String> {
    plan.phases
        .iter()
        .enumerate()
        .map(|(index, window)| {
            let fields = plan.fields.iter().filter(|f| f.phase == index).count();
            format!(
                "phase {index} {}: {}ms..{}ms after {}, {fields} fields",
                window.label(index),
                window.start().as_millis(),
                window.end().as_millis(),
                plan.anchor
            )
        })
        .collect()
}

/// Human-readable report
#[must_use]
pub fn render_text(report: &RunReport) -> String {
    let v = &report.verdict;
    let mut out = String::new();
    let _ = writeln!(out, "Scenario:   {}", report.scenario);
    let _ = writeln!(out, "Run:        {}", report.run_id);
    let _ = writeln!(
        out,
        "Transition: {}ms (phases anchored at {})",
        report.transition_ms, report.anchor
    );
    let _ = writeln!(out, "Elapsed:    {}ms", report.elapsed_ms);

    let _ = writeln!(out, "\nPhases:");
    for phase in v.per_phase() {
        let _ = writeln!(out, "  {}: {}/{}", phase.phase, phase.populated, phase.total);
    }

    let failing: Vec<_> = v.failing_fields().collect();
    if !failing.is_empty() {
        let _ = writeln!(out, "\nEmpty fields:");
        for field in failing {
            let reason = report
                .observations
                .iter()
                .rev()
                .find(|o| o.field == field.name)
                .and_then(|o| o.error.as_deref())
                .unwrap_or("no value");
            let _ = writeln!(out, "  [phase {}] {}: {reason}", field.phase, field.name);
        }
    }

    if !report.probes.is_empty() {
        let _ = writeln!(out, "\nProbes:");
        for probe in &report.probes {
            let stage = match probe.stage {
                ProbeStage::Entry => "entry",
                ProbeStage::Transition => "transition",
            };
            match (&probe.value, &probe.error) {
                (Some(value), _) => {
                    let _ = writeln!(out, "  [{stage}] {}: {value}", probe.name);
                }
                (None, Some(error)) => {
                    let _ = writeln!(out, "  [{stage}] {}: error: {error}", probe.name);
                }
                (None, None) => {
                    let _ = writeln!(out, "  [{stage}] {}: -", probe.name);
                }
            }
        }
    }

    if !v.adapter_failures.is_empty() {
        let _ = writeln!(out, "\nArtifact capture problems:");
        for failure in &v.adapter_failures {
            let _ = writeln!(out, "  {failure}");
        }
    }

    let _ = writeln!(
        out,
        "\n{} {}/{} ({:.1}%)",
        if v.passed { "PASSED" } else { "FAILED" },
        v.populated,
        v.total,
        v.percent()
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use demo_harness::{manufacturing, DemoEngine, ScriptedDriver, Selector, VirtualClock};

    async fn sample_report(threshold: f64) -> RunReport {
        let plan: VerificationPlan = manufacturing().with_threshold(threshold);
        let clock = VirtualClock::new();
        let mut driver = ScriptedDriver::new(clock.clone())
            .with_elements(plan.scenario.trigger.clone(), 1)
            .on_click_navigate("http://localhost:3000/shipping", Duration::ZERO)
            .with_text(Selector::css("h1"), "Interactive Demos");
        for field in plan.fields.iter().skip(2) {
            driver = driver.with_field(field.locator.clone(), "x", Duration::ZERO);
        }
        DemoEngine::with_clock(driver, clock).run(&plan).await.unwrap()
    }

    mod render_tests {
        use super::*;

        #[tokio::test]
        async fn test_text_report_lists_empty_fields() {
            let report = sample_report(0.7).await;
            let text = render_text(&report);
            assert!(text.contains("PASSED 15/17"));
            assert!(text.contains("origin contact name"));
            assert!(text.contains("Element not found: #origin-contact-name"));
            assert!(text.contains("[entry] heading: Interactive Demos"));
        }

        #[tokio::test]
        async fn test_text_report_failed() {
            let report = sample_report(0.95).await;
            assert!(render_text(&report).contains("FAILED 15/17"));
        }

        #[test]
        fn test_phase_layout_lines() {
            let lines = render_phase_layout(&manufacturing());
            assert_eq!(lines.len(), 4);
            assert!(lines[0].starts_with("phase 0 "));
            assert!(lines[0].contains("0ms..5000ms"));
            assert!(lines[3].contains("15000ms..20000ms"));
            let total: usize = lines
                .iter()
                .filter_map(|l| l.rsplit(", ").next())
                .filter_map(|l| l.trim_end_matches(" fields").parse::<usize>().ok())
                .sum();
            assert_eq!(total, 17);
        }

        #[tokio::test]
        async fn test_verdict_with_capture_problems() {
            let mut report = sample_report(0.7).await;
            report.verdict.adapter_failures.push("initial: capture failed".into());
            let reporter = ProgressReporter::new(false, false);
            reporter.verdict(&report);
            ProgressReporter::new(false, true).verdict(&report);
        }

        #[tokio::test]
        async fn test_json_report_parses_back() {
            let report = sample_report(0.7).await;
            let json = render_report(&report, ReportFormat::Json).unwrap();
            let back: RunReport = serde_json::from_str(&json).unwrap();
            assert_eq!(back.verdict, report.verdict);
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_quiet_reporter_has_no_spinner() {
            let mut reporter = ProgressReporter::new(false, true);
            assert!(reporter.start_spinner("running").is_none());
            reporter.success("hidden");
            reporter.failure("shown");
            reporter.finish();
        }

        #[test]
        fn test_spinner_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            let spinner = reporter.start_spinner("loading entry page").unwrap();
            spinner.set_message("phase-0");
            reporter.finish();
            assert!(spinner.is_finished());
        }
    }
}
