//! Demo Harness: verification engine for time-phased browser autofill demos
//!
//! A target application offers a "demo" mode that, once triggered, fills a
//! multi-step form by itself over several seconds. The harness drives a
//! browser against it, triggers the demo, waits out declared phase
//! windows, reads the fields each window should have populated, and scores
//! the run.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐    ┌────────────────┐    ┌────────────────┐
//! │ Verification   │    │ DemoEngine     │    │ DemoDriver     │
//! │ Plan (YAML)    │───►│ phase sync +   │───►│ Chromium (CDP) │
//! │                │    │ scoring        │    │ or Scripted    │
//! └────────────────┘    └───────┬────────┘    └────────────────┘
//!                               │
//!                               ▼
//!                     RunReport { Verdict, Observations }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use demo_harness::{preset, DemoEngine, ScriptedDriver, VirtualClock};
//!
//! # async fn demo() -> demo_harness::HarnessResult<()> {
//! let clock = VirtualClock::new();
//! let driver = ScriptedDriver::new(clock.clone());
//! let mut engine = DemoEngine::with_clock(driver, clock);
//! let report = engine.run(&preset("manufacturing")?).await?;
//! println!("{:.1}% populated", report.verdict.percent());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod browser;
mod clock;
mod diagnostics;
mod driver;
mod engine;
mod locator;
mod mock;
mod plan;
mod preset;
mod probe;
mod result;
mod scenario;
mod url;
mod verdict;

/// Wait Mechanisms
pub mod wait;

#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use browser::BrowserConfig;
pub use clock::{Clock, SystemClock, VirtualClock};
pub use diagnostics::{
    capture_diagnostics, ArtifactSink, CheckpointRecorder, Diagnostics, CONSOLE_FILE, REPORT_FILE,
};
pub use driver::{
    ConsoleBuffer, ConsoleLevel, ConsoleMessage, DemoDriver, Screenshot, CONSOLE_BUFFER_CAPACITY,
};
pub use engine::{Checkpoint, DemoEngine, RunHooks, RunReport};
pub use locator::Selector;
pub use mock::{DriverCall, ScriptedDriver};
pub use plan::{
    PhaseAnchor, Timeouts, VerificationPlan, DEFAULT_BASE_URL, DEFAULT_POLL_GRANULARITY_MS,
    DEFAULT_THRESHOLD,
};
pub use preset::{
    default_probes, healthcare, manufacturing, manufacturing_origin, preset, PHASE_WINDOW_MS,
    PRESET_NAMES,
};
pub use probe::{run_probes, PageProbe, ProbeKind, ProbeResult, ProbeStage, ProbeValue};
pub use result::{FailureClass, HarnessError, HarnessResult};
pub use scenario::{DemoScenario, FieldSpec, PhaseWindow};
pub use url::UrlPattern;
pub use verdict::{FieldOutcome, Observation, PhaseSummary, Verdict};
