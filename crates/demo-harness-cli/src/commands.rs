//! CLI command definitions using clap

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{CliConfig, ColorChoice, LogFormat, Verbosity};

/// Demo Harness: verify that a demo mode fills its form on schedule
#[derive(Parser, Debug)]
#[command(name = "demo-harness")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Configuration from the global flags
    #[must_use]
    pub fn config(&self) -> CliConfig {
        CliConfig::new()
            .with_verbosity(Verbosity::from_flags(self.quiet, self.verbose))
            .with_color(self.color.into())
            .with_log_format(self.log_format.into())
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a verification plan against a live browser
    Run(RunArgs),

    /// Parse and validate a plan file
    Validate(ValidateArgs),

    /// List built-in plans or print one as YAML
    Presets(PresetsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Plan file (YAML, or JSON with a .json extension)
    #[arg(short, long, conflicts_with = "preset")]
    pub plan: Option<PathBuf>,

    /// Built-in plan name (default: manufacturing)
    #[arg(long)]
    pub preset: Option<String>,

    /// Application base URL
    #[arg(long, env = "DEMO_HARNESS_BASE_URL")]
    pub base_url: Option<String>,

    /// Override the plan's success threshold (0.0-1.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Output directory for screenshots, console dump and report
    #[arg(short, long, default_value = "target/demo-harness")]
    pub output: PathBuf,

    /// Report format printed to stdout
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,

    /// Run the browser headless (`--headless false` shows the window)
    #[arg(
        long,
        default_value_t = true,
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub headless: bool,

    /// Disable the chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium: Option<PathBuf>,

    /// Screenshot at every checkpoint instead of start, trigger and finish
    #[arg(long)]
    pub every_checkpoint: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Plan file to validate
    pub file: PathBuf,
}

/// Arguments for the presets command
#[derive(Parser, Debug)]
pub struct PresetsArgs {
    /// Print this preset as YAML
    #[arg(long)]
    pub show: Option<String>,
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Full run report as JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
