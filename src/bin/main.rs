//! brainscan Command Line Interface
//!
//! Train a tumor classifier on a folder of labeled MRI scans, classify new
//! scans, and inspect the intermediate features of a single image.

use brainscan::api::{InferenceContext, Trainer};
use brainscan::core::{FeatureMode, PcaComponents, PipelineConfig, Result};
use brainscan::persistence::ModelArtifacts;
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "brainscan")]
#[command(about = "Brain MRI tumor classification with GLCM/HOG features and a linear SVM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "brainscan contributors")]
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
    /// Train a classifier on a folder of category directories
    Train(TrainArgs),
    /// Classify one or more images with a trained model
    Predict(PredictArgs),
    /// Show the preprocessing and feature extraction results for one image
    Inspect(InspectArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Root directory holding one sub-directory per category
    #[arg(long)]
    data: PathBuf,

    /// Output model directory
    #[arg(short, long)]
    output: PathBuf,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feature cache file (LibSVM format)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Re-extract features even if the cache exists
    #[arg(long)]
    force_rescan: bool,

    /// PCA components: an integer count or a variance fraction such as 0.95
    #[arg(long, value_parser = parse_pca)]
    pca: Option<PcaComponents>,

    /// Calibrate class probabilities
    #[arg(long)]
    probability: bool,

    /// Passes per binary SVM
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Held-out fraction for evaluation
    #[arg(long)]
    test_ratio: Option<f64>,

    /// Feature vector layout
    #[arg(long)]
    mode: Option<CliFeatureMode>,
}

#[derive(ValueEnum, Clone, Debug)]
enum CliFeatureMode {
    /// Global GLCM + HOG plus a 3x3 grid of local descriptors
    #[value(name = "full")]
    Full,
    /// Global GLCM + fine-cell HOG only
    #[value(name = "compact")]
    Compact,
}

impl From<CliFeatureMode> for FeatureMode {
    fn from(cli_mode: CliFeatureMode) -> Self {
        match cli_mode {
            CliFeatureMode::Full => FeatureMode::Full,
            CliFeatureMode::Compact => FeatureMode::Compact,
        }
    }
}

#[derive(Args)]
struct PredictArgs {
    /// Model directory
    #[arg(short, long)]
    models: PathBuf,

    /// Images to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Show per-class scores
    #[arg(long)]
    scores: bool,

    /// Print one JSON object per image
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Image to inspect
    image: PathBuf,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the preprocessed grayscale image here
    #[arg(long)]
    save_preprocessed: Option<PathBuf>,
}

#[derive(Args)]
struct InfoArgs {
    /// Model directory
    #[arg(short, long)]
    models: PathBuf,
}

fn parse_pca(s: &str) -> std::result::Result<PcaComponents, String> {
    let components = PcaComponents::parse(s).map_err(|e| e.to_string())?;
    components.validate().map_err(|e| e.to_string())?;
    Ok(components)
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
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Inspect(args) => inspect_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {path:?}");
            PipelineConfig::from_file(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training classifier...");
    info!("Data directory: {:?}", args.data);

    let mut trainer = Trainer::from_config(load_config(args.config.as_ref())?);
    if let Some(pca) = args.pca {
        trainer = trainer.with_pca(pca);
    }
    if args.probability {
        trainer = trainer.with_probability(true);
    }
    if let Some(iterations) = args.iterations {
        trainer = trainer.with_n_iters(iterations);
    }
    if let Some(ratio) = args.test_ratio {
        trainer = trainer.with_test_ratio(ratio);
    }
    if let Some(mode) = args.mode {
        trainer = trainer.with_feature_mode(mode.into());
    }

    let svm = &trainer.config().svm;
    info!(
        "Parameters: lr={}, lambda={}, n_iters={}, pca={:?}",
        svm.learning_rate,
        svm.lambda,
        svm.n_iters,
        trainer.config().pca
    );

    let (outcome, failures) =
        trainer.train_folder(&args.data, args.cache.as_deref(), args.force_rescan)?;

    if !failures.is_empty() {
        warn!("{} images could not be processed", failures.len());
        for failure in &failures {
            info!("  {:?}: {}", failure.path, failure.reason);
        }
    }

    outcome.artifacts.save_to_dir(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    println!("=== Training Results ===");
    println!("Training samples: {}", outcome.n_train);
    if outcome.n_test > 0 {
        println!("Test samples: {}", outcome.n_test);
    } else {
        println!("Test samples: 0 (metrics computed on the training split)");
    }
    println!("Skipped images: {}", failures.len());
    println!();
    print!(
        "{}",
        outcome.report.summary(&outcome.artifacts.config.categories)
    );

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading models from: {:?}", args.models);
    let context = InferenceContext::load(&args.models)?;
    if !context.is_trained() {
        warn!("No classifier found in {:?}", args.models);
    }

    for path in &args.images {
        let analysis = fs::read(path)
            .map_err(Into::into)
            .and_then(|bytes| context.analyze(&bytes));

        match analysis {
            Ok(analysis) => {
                let diagnosis = &analysis.diagnosis;
                if args.json {
                    let line = serde_json::json!({
                        "path": path,
                        "diagnosis": diagnosis,
                    });
                    println!("{line}");
                } else if diagnosis.is_trained() {
                    println!(
                        "{}: {} ({:.2}%)",
                        path.display(),
                        diagnosis.label,
                        diagnosis.confidence * 100.0
                    );
                } else {
                    println!("{}: {}", path.display(), diagnosis.label);
                }

                if args.scores && !args.json {
                    for (category, score) in context.categories().iter().zip(&diagnosis.scores) {
                        println!("  {category}: {score:.6}");
                    }
                }
            }
            Err(e) => {
                let report = e.report();
                if args.json {
                    let line = serde_json::json!({ "path": path, "error": report });
                    println!("{line}");
                } else {
                    println!("{}: error [{}] {}", path.display(), report.code, report.message);
                }
            }
        }
    }

    Ok(())
}

fn inspect_command(args: InspectArgs) -> Result<()> {
    let context = InferenceContext::untrained(load_config(args.config.as_ref())?)?;
    let bytes = fs::read(&args.image)?;
    let analysis = context.analyze(&bytes)?;

    println!("=== Image Inspection ===");
    println!("File: {}", args.image.display());
    let (width, height) = analysis.preprocessed.dimensions();
    println!("Preprocessed size: {width}x{height}");
    println!("Feature vector length: {}", analysis.feature_len);

    let h = &analysis.haralick;
    println!("\nGLCM statistics:");
    println!("  Contrast:    {:.6}", h.contrast);
    println!("  Energy:      {:.6}", h.energy);
    println!("  Homogeneity: {:.6}", h.homogeneity);
    println!("  Correlation: {:.6}", h.correlation);

    println!("\nGLCM matrix:");
    for r in 0..analysis.glcm.rows() {
        let cells: Vec<String> = analysis
            .glcm
            .row(r)
            .iter()
            .map(|v| format!("{v:.4}"))
            .collect();
        println!("  {}", cells.join(" "));
    }

    let magnitude = analysis.gradient_magnitude.as_slice();
    let max = magnitude.iter().cloned().fold(0.0, f64::max);
    let mean = if magnitude.is_empty() {
        0.0
    } else {
        magnitude.iter().sum::<f64>() / magnitude.len() as f64
    };
    println!("\nGradient magnitude: mean {mean:.4}, max {max:.4}");

    if let Some(path) = args.save_preprocessed {
        analysis.preprocessed.save(&path)?;
        info!("Preprocessed image saved to: {path:?}");
        println!("\nSaved preprocessed image to {}", path.display());
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading models from: {:?}", args.models);
    let artifacts = ModelArtifacts::load_from_dir(&args.models)?;
    if artifacts.is_empty() {
        warn!("No model artifacts found in {:?}", args.models);
    }

    artifacts.print_summary();
    println!("Library Version: {}", brainscan::VERSION);

    Ok(())
}
