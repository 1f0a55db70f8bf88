//! The command line interface for the planner.
use crate::attack::{AttackConfig, run_attack};
use crate::log;
use crate::model::Model;
use crate::output::metadata::{RunKind, write_metadata};
use crate::output::{
    ALGORITHM_TRACE_FILE_NAME, DataWriter, create_output_directory, get_output_dir, write_json,
};
use crate::planning::run_planning;
use crate::settings::Settings;
use crate::solver::HighsSolver;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the planner.
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
    /// Whether to write additional information to CSV files
    #[arg(long)]
    pub debug_model: bool,
}

/// Options for the attack command
#[derive(Args)]
pub struct AttackOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write additional information about the final attack model to CSV files
    #[arg(long)]
    pub debug_model: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve the planning model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Search for an attack on the availability of a subprocess.
    Attack {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Path to the attack configuration file.
        attack_config: PathBuf,
        /// Other attack options
        #[command(flatten)]
        opts: AttackOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage program settings.
    Settings {
        /// The subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Attack {
                model_dir,
                attack_config,
                opts,
            } => handle_attack_command(&model_dir, &attack_config, &opts, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ cesm --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    if let Some(settings) = settings {
        Ok(settings)
    } else {
        Settings::load().context("Failed to load settings.")
    }
}

/// Create the output folder and start logging to it.
///
/// Returns the path to the output folder.
fn prepare_output(
    model_path: &Path,
    output_dir: Option<&Path>,
    overwrite: bool,
    settings: &Settings,
) -> Result<PathBuf> {
    // Get path to output folder
    let output_path = match output_dir {
        Some(p) => p.to_path_buf(),
        None => get_output_dir(model_path)?,
    };

    let overwritten = create_output_directory(&output_path, overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(&settings.log_level), Some(&output_path))
        .context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder will be overwritten");
    }
    info!("Output folder: {}", output_path.display());

    Ok(output_path)
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;

    // This setting can be overridden by command-line argument
    if opts.debug_model {
        settings.debug_model = true;
    }

    let output_path = prepare_output(
        model_path,
        opts.output_dir.as_deref(),
        opts.overwrite,
        &settings,
    )?;

    // Load the model to run
    let model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    write_metadata(&output_path, model_path, &model, RunKind::Planning)?;

    let mut writer = DataWriter::create(&output_path, settings.debug_model)?;
    run_planning(&model, &HighsSolver, &mut writer)?;
    info!("Planning complete!");

    Ok(())
}

/// Handle the `attack` command.
pub fn handle_attack_command(
    model_path: &Path,
    config_path: &Path,
    opts: &AttackOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if opts.debug_model {
        settings.debug_model = true;
    }

    // Read the configuration first so that mistakes are reported before anything is written
    let config = AttackConfig::from_path(config_path).context("Failed to load attack config.")?;
    let output_path = prepare_output(
        model_path,
        opts.output_dir.as_deref(),
        opts.overwrite,
        &settings,
    )?;

    let model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    write_metadata(&output_path, model_path, &model, RunKind::Attack(config_path))?;

    let mut writer = DataWriter::create(&output_path, settings.debug_model)?;
    let outcome = run_attack(&model, &config, &HighsSolver, &mut writer)?;
    write_json(&output_path.join(ALGORITHM_TRACE_FILE_NAME), &outcome.trace)?;
    info!("Attack complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    // Load/validate the model
    Model::from_path(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
