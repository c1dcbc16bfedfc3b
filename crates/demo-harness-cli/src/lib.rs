//! Demo Harness CLI Library
//!
//! Command-line front end for the demo harness: plan loading, run
//! orchestration, artifact output and report rendering.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, LogFormatArg, PresetsArgs, ReportFormat, RunArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_phase_layout, render_report, render_text, ProgressReporter};
pub use runner::{
    browser_config, load_plan, validate_file, verify, Outcome, DEFAULT_PRESET, FATAL_EXIT_CODE,
};
