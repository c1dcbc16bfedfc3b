//! Diagnostic capture and artifact output.
//!
//! The engine itself never writes files. Callers use
//! [`capture_diagnostics`] after a fatal error and an [`ArtifactSink`] to
//! persist screenshots, console output and reports. [`CheckpointRecorder`]
//! plugs into the engine as [`RunHooks`] to take screenshots as a run
//! progresses.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::driver::{ConsoleMessage, DemoDriver, Screenshot};
use crate::engine::{Checkpoint, RunHooks, RunReport};
use crate::result::HarnessResult;

/// Console dump file name
pub const CONSOLE_FILE: &str = "console.json";

/// Report file name
pub const REPORT_FILE: &str = "report.json";

/// Page state captured through the driver
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// Capture label (e.g., "error")
    pub label: String,
    /// Page URL at capture time
    pub url: Option<String>,
    /// Viewport screenshot
    #[serde(skip)]
    pub screenshot: Option<Screenshot>,
    /// Console history
    pub console: Vec<ConsoleMessage>,
    /// Problems hit while capturing
    pub errors: Vec<String>,
}

impl Diagnostics {
    /// Whether every capture step succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Capture a screenshot, the URL and console output
///
/// Never fails; capture problems are recorded in [`Diagnostics::errors`].
pub async fn capture_diagnostics<D>(driver: &D, label: &str) -> Diagnostics
where
    D: DemoDriver + ?Sized,
{
    let mut diagnostics = Diagnostics {
        label: label.to_string(),
        ..Diagnostics::default()
    };
    match driver.screenshot().await {
        Ok(shot) => diagnostics.screenshot = Some(shot),
        Err(e) => diagnostics.errors.push(format!("screenshot: {e}")),
    }
    match driver.current_url().await {
        Ok(url) => diagnostics.url = Some(url),
        Err(e) => diagnostics.errors.push(format!("url: {e}")),
    }
    diagnostics.console = driver.console_messages().await;
    tracing::debug!(
        label,
        screenshot = diagnostics.screenshot.is_some(),
        console = diagnostics.console.len(),
        errors = diagnostics.errors.len(),
        "diagnostics captured"
    );
    diagnostics
}

/// Writes run artifacts into one directory
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    /// Create the directory if needed
    pub async fn create(dir: impl Into<PathBuf>) -> HarnessResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<label>.png`
    pub async fn write_screenshot(&self, label: &str, shot: &Screenshot) -> HarnessResult<PathBuf> {
        let path = self.dir.join(format!("{}.png", sanitize(label)));
        tokio::fs::write(&path, &shot.data).await?;
        tracing::debug!(path = %path.display(), bytes = shot.size_bytes(), "screenshot written");
        Ok(path)
    }

    /// Write the console dump
    pub async fn write_console(&self, console: &[ConsoleMessage]) -> HarnessResult<PathBuf> {
        let path = self.dir.join(CONSOLE_FILE);
        tokio::fs::write(&path, serde_json::to_vec_pretty(console)?).await?;
        Ok(path)
    }

    /// Write the run report
    pub async fn write_report(&self, report: &RunReport) -> HarnessResult<PathBuf> {
        let path = self.dir.join(REPORT_FILE);
        tokio::fs::write(&path, report.to_json()?).await?;
        Ok(path)
    }

    /// Write everything a capture holds: screenshot, console and `<label>.json`
    pub async fn write_diagnostics(
        &self,
        diagnostics: &Diagnostics,
    ) -> HarnessResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        if let Some(shot) = &diagnostics.screenshot {
            written.push(self.write_screenshot(&diagnostics.label, shot).await?);
        }
        written.push(self.write_console(&diagnostics.console).await?);
        let path = self.dir.join(format!("{}.json", sanitize(&diagnostics.label)));
        tokio::fs::write(&path, serde_json::to_vec_pretty(diagnostics)?).await?;
        written.push(path);
        Ok(written)
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Takes a screenshot at selected checkpoints and dumps the console at the end
#[derive(Debug, Clone)]
pub struct CheckpointRecorder {
    sink: ArtifactSink,
    capture: Option<HashSet<Checkpoint>>,
    written: Arc<Mutex<Vec<PathBuf>>>,
}

impl CheckpointRecorder {
    /// Screenshots at entry, trigger and finish
    #[must_use]
    pub fn new(sink: ArtifactSink) -> Self {
        Self {
            sink,
            capture: Some(
                [Checkpoint::EntryLoaded, Checkpoint::Triggered, Checkpoint::Finished]
                    .into_iter()
                    .collect(),
            ),
            written: Arc::default(),
        }
    }

    /// Screenshots at every checkpoint
    #[must_use]
    pub fn every_checkpoint(mut self) -> Self {
        self.capture = None;
        self
    }

    /// Paths written so far, shared between clones
    #[must_use]
    pub fn written(&self) -> Vec<PathBuf> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn wants(&self, checkpoint: Checkpoint) -> bool {
        match &self.capture {
            Some(set) => set.contains(&checkpoint),
            None => true,
        }
    }

    fn remember(&self, path: PathBuf) {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }
}

#[async_trait]
impl RunHooks for CheckpointRecorder {
    async fn on_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        driver: &dyn DemoDriver,
    ) -> HarnessResult<()> {
        if checkpoint == Checkpoint::Finished {
            let console = driver.console_messages().await;
            let path = self.sink.write_console(&console).await?;
            self.remember(path);
        }
        if self.wants(checkpoint) {
            let shot = driver.screenshot().await?;
            let path = self.sink.write_screenshot(&checkpoint.label(), &shot).await?;
            self.remember(path);
        }
        Ok(())
    }
}
