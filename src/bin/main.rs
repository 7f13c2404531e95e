//! vad-harness Command Line Interface
//!
//! Runs the cross-validation experiments on the UMN and Crowd Violence
//! datasets, or on any descriptor directory with a ground-truth file.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use vad_harness::config::{ClassifierGrid, ConfigFile, ExperimentConfig};
use vad_harness::core::{ClassificationMode, HarnessError, Result};
use vad_harness::experiment::{
    try_cvd, try_dataset, try_umn, try_umn_oc, DatasetSpec, ExperimentOutcome, Workspace,
};
use vad_harness::persistence::SavedModel;
use vad_harness::reduction::EncoderPolicy;

#[derive(Parser)]
#[command(name = "vad-harness")]
#[command(about = "Cross-validation harness for video anomaly detection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "vad-harness Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Binary frame classification on a UMN scene
    Umn(SceneArgs),
    /// One-class frame classification on a UMN scene
    UmnOc(SceneArgs),
    /// Binary video classification on the Crowd Violence dataset
    Cvd(CommonArgs),
    /// Cross-validate any descriptor directory
    Run(RunArgs),
    /// Display information about a saved model
    Info(InfoArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Data root holding Descriptors/ and Datasets/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file with the dataset blocks (default: <root>/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Experiment grid file (JSON)
    #[arg(short, long)]
    grid: Option<PathBuf>,

    /// Seed of the shuffles and network initialization
    #[arg(short, long)]
    seed: Option<u64>,

    /// Save every fitted model to this directory
    #[arg(long)]
    save_models: Option<PathBuf>,

    /// Fail instead of falling back to raw histograms when an encoder is unusable
    #[arg(long)]
    strict_encoder: bool,

    /// Write the outcome as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SceneArgs {
    /// UMN scene number
    #[arg(long)]
    scene: u32,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliMode {
    /// One label per video
    #[value(name = "video")]
    Video,
    /// One label per frame
    #[value(name = "frame")]
    Frame,
}

impl From<CliMode> for ClassificationMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Video => ClassificationMode::Video,
            CliMode::Frame => ClassificationMode::Frame,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Directory of descriptor files
    #[arg(long)]
    descriptors: PathBuf,

    /// Ground-truth file
    #[arg(long)]
    ground_truth: PathBuf,

    /// Classification mode
    #[arg(short, long, default_value = "video")]
    mode: CliMode,

    /// Number of cross-validation folds
    #[arg(short, long, default_value = "5")]
    folds: usize,

    /// Use the one-class grid unless the grid file is already one-class
    #[arg(long)]
    one_class: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Saved model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Umn(args) => umn_command(args, false),
        Commands::UmnOc(args) => umn_command(args, true),
        Commands::Cvd(args) => cvd_command(args),
        Commands::Run(args) => run_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn umn_command(args: SceneArgs, one_class: bool) -> Result<()> {
    let ws = workspace(&args.common)?;
    let config = experiment_config(&args.common)?;
    info!("Running UMN scene {} (one-class: {one_class})", args.scene);

    let outcome = if one_class {
        try_umn_oc(&ws, args.scene, config)?
    } else {
        try_umn(&ws, args.scene, config)?
    };
    report(&outcome, &args.common)
}

fn cvd_command(args: CommonArgs) -> Result<()> {
    let ws = workspace(&args)?;
    let config = experiment_config(&args)?;
    info!("Running Crowd Violence Detection");

    let outcome = try_cvd(&ws, config)?;
    report(&outcome, &args)
}

fn run_command(args: RunArgs) -> Result<()> {
    let mut config = experiment_config(&args.common)?;
    if args.one_class && !config.classifier.is_one_class() {
        config.classifier = ClassifierGrid::one_class_default();
    }
    if let Some(encoder) = config.encoder.as_mut() {
        if args.common.strict_encoder {
            encoder.policy = EncoderPolicy::Required;
        }
    }

    let spec = DatasetSpec {
        name: args
            .descriptors
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.descriptors.display().to_string()),
        descriptors_dir: args.descriptors.clone(),
        ground_truth: args.ground_truth.clone(),
        mode: args.mode.into(),
        n_folds: args.folds,
    };
    info!("Descriptors: {:?}", spec.descriptors_dir);
    info!("Ground truth: {:?}", spec.ground_truth);

    let outcome = try_dataset(&spec, &config)?;
    report(&outcome, &args.common)
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = SavedModel::load_from_file(&args.model)?;
    model.print_summary();
    Ok(())
}

fn workspace(args: &CommonArgs) -> Result<Workspace> {
    let mut ws = Workspace::new(&args.root);

    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => {
            let default = args.root.join("config.json");
            default.exists().then_some(default)
        }
    };
    if let Some(path) = config_path {
        info!("Configuration file: {path:?}");
        ws = ws.with_config_file(ConfigFile::load(path)?);
    }
    if args.strict_encoder {
        ws = ws.with_encoder_policy(EncoderPolicy::Required);
    }
    Ok(ws)
}

fn experiment_config(args: &CommonArgs) -> Result<ExperimentConfig> {
    let mut config = match &args.grid {
        Some(path) => {
            info!("Grid file: {path:?}");
            ExperimentConfig::from_file(path)?
        }
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = &args.save_models {
        config.model_dir = Some(dir.clone());
    }
    Ok(config)
}

fn report(outcome: &ExperimentOutcome, args: &CommonArgs) -> Result<()> {
    println!("=== {} ===", outcome.dataset);
    println!("Folds:    {}", outcome.n_folds);
    println!("Best:     {}", outcome.point);
    println!("Accuracy: {:.4}", outcome.accuracy);
    println!("AUC:      {:.4}", outcome.auc);
    if let Some(params) = &outcome.extraction {
        println!(
            "Extraction: L={} t1={} t2={} min_motion={} fast_threshold={}",
            params.trajectory_length, params.t1, params.t2, params.min_motion, params.fast_threshold
        );
    }

    if let Some(path) = &args.output {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, outcome)
            .map_err(|e| HarnessError::SerializationError(e.to_string()))?;
        info!("Outcome saved to: {path:?}");
    }
    Ok(())
}
