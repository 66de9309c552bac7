//! The command line interface for the optimiser.
use crate::driver::{run_sweep, ScenarioOutcome, SweepOptions};
use crate::fixing::fix_variables;
use crate::log;
use crate::model::Model;
use crate::output::{create_output_directory, get_output_dir, CsvResultWriter};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{ensure, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::path::{Path, PathBuf};

pub mod demo;
use demo::DemoSubcommands;

/// The command line interface for the optimiser.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a model's scenario sweep.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage demo models.
    Demo {
        /// The available subcommands for managing demo models.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Validate a model without solving it.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
        }
    }
}

/// Parse CLI arguments and dispatch the command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ gpo --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(model_path)?;
        &pathbuf
    };

    let overwritten = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(settings.log_level.as_deref(), Some(output_path))
        .context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder will be overwritten");
    }

    // Load the model to run
    let model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // Build the instance and shrink it before the sweep
    let mut instance = model.build_instance().context("Failed to build instance.")?;
    info!(
        "Instance built: {} suppliers, {} ports, {} routes; {:.3e} t of demand against {:.3e} t of capacity",
        instance.suppliers.len(),
        instance.ports.len(),
        instance.routes.len(),
        instance.total_demand().value(),
        instance.total_capacity().value()
    );
    fix_variables(&mut instance, &model.fixing);

    // Run the scenario sweep
    let sweep_options = SweepOptions {
        time_limit: settings.solver_time_limit_s,
        halt_on_failure: false,
        cancel: None,
    };
    let mut writer = CsvResultWriter::new(output_path);
    let outcomes = run_sweep(instance, &model.scenarios, &sweep_options, &mut writer)?;

    // A partial sweep still wrote every solved scenario's results; report the
    // failures and exit nonzero
    let failed: Vec<String> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, outcome)| !matches!(outcome, ScenarioOutcome::Solved { .. }))
        .map(|(index, outcome)| format!("{index} ({outcome:?})"))
        .collect();
    ensure!(
        failed.is_empty(),
        "{} of {} scenarios failed: {}",
        failed.len(),
        outcomes.len(),
        failed.iter().join(", ")
    );

    info!("Sweep complete: {} scenarios solved", outcomes.len());

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(settings.log_level.as_deref(), None).context("Failed to initialise logging.")?;

    // Load the model and build the instance; this runs all cross-table
    // validation without invoking the solver
    let model = Model::from_path(model_path).context("Failed to validate model.")?;
    model.build_instance().context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
