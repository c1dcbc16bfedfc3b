//! Demo Harness CLI: verify time-phased autofill demos in a real browser
//!
//! ## Usage
//!
//! ```bash
//! demo-harness run                          # Manufacturing preset on localhost:3000
//! demo-harness run --preset healthcare      # Second catalog demo
//! demo-harness run --plan plans/custom.yaml # Plan file
//! demo-harness validate plans/custom.yaml   # Check a plan without a browser
//! demo-harness presets --show manufacturing # Print a preset as YAML
//! ```
//!
//! Exit codes: 0 pass, 1 fail verdict, 2 run aborted or bad input.

use clap::Parser;
use demo_harness::{preset, ArtifactSink, RunReport, VerificationPlan, PRESET_NAMES};
use demo_harness_cli::{
    load_plan, logging, render_phase_layout, render_report, validate_file, Cli, CliConfig,
    CliError, CliResult, Commands, Outcome, PresetsArgs, ProgressReporter, RunArgs, ValidateArgs,
    FATAL_EXIT_CODE,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();
    logging::init(&config);
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());

    let result = match cli.command {
        Commands::Run(args) => run(&config, reporter, &args),
        Commands::Validate(args) => validate(&reporter, &args),
        Commands::Presets(args) => presets(&args),
    };

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            if let CliError::RunAborted {
                artifacts: Some(dir),
                ..
            } = &e
            {
                eprintln!("Diagnostics written to {}", dir.display());
            }
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn run(config: &CliConfig, mut reporter: ProgressReporter, args: &RunArgs) -> CliResult<Outcome> {
    let plan = load_plan(args)?;
    let config = config.clone().with_output_dir(&args.output);
    reporter.info(&format!(
        "{}: {} fields over {} phases, threshold {:.0}%",
        plan.scenario.name,
        plan.fields.len(),
        plan.phases.len(),
        plan.threshold * 100.0
    ));
    if config.verbosity.is_verbose() {
        for line in render_phase_layout(&plan) {
            reporter.info(&line);
        }
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(execute(&config, &mut reporter, args, &plan))?;

    reporter.verdict(&report);
    println!("{}", render_report(&report, args.format)?);
    reporter.info(&format!("Artifacts in {}", config.output_dir.display()));
    Ok(Outcome::of(&report))
}

async fn execute(
    config: &CliConfig,
    reporter: &mut ProgressReporter,
    args: &RunArgs,
    plan: &VerificationPlan,
) -> CliResult<RunReport> {
    let sink = ArtifactSink::create(&config.output_dir).await?;
    let engine = launch(args).await?;
    let spinner = reporter.start_spinner(&format!("verifying {}", plan.entry_url()));
    let result =
        demo_harness_cli::verify(engine, plan, &sink, args.every_checkpoint, spinner).await;
    reporter.finish();
    result
}

#[cfg(feature = "browser")]
async fn launch(
    args: &RunArgs,
) -> CliResult<demo_harness::DemoEngine<demo_harness::ChromiumDriver>> {
    let browser = demo_harness_cli::browser_config(args);
    let driver = demo_harness::ChromiumDriver::launch(&browser).await?;
    Ok(demo_harness::DemoEngine::new(driver))
}

#[cfg(not(feature = "browser"))]
async fn launch(
    _args: &RunArgs,
) -> CliResult<demo_harness::DemoEngine<demo_harness::ScriptedDriver>> {
    Err(CliError::config(
        "browser support not compiled in; rebuild with --features browser",
    ))
}

fn validate(reporter: &ProgressReporter, args: &ValidateArgs) -> CliResult<Outcome> {
    let plan = validate_file(&args.file)?;
    reporter.success(&format!(
        "{}: {} fields over {} phases ({}ms), entry {}",
        plan.scenario.name,
        plan.fields.len(),
        plan.phases.len(),
        plan.total_duration().as_millis(),
        plan.entry_url()
    ));
    Ok(Outcome::Passed)
}

fn presets(args: &PresetsArgs) -> CliResult<Outcome> {
    match &args.show {
        Some(name) => print!("{}", preset(name)?.to_yaml()?),
        None => {
            for name in PRESET_NAMES {
                let plan = preset(name)?;
                println!(
                    "{name:<22} {} fields, {} phases, threshold {}",
                    plan.fields.len(),
                    plan.phases.len(),
                    plan.threshold
                );
            }
        }
    }
    Ok(Outcome::Passed)
}
