//! cfx CLI: counterfactual explanations for image classifiers.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use cfx_core::{Image, ScoringOracle, Seed, CLASS_NAMES};
use cfx_models::{load_image_mlp, save_image_mlp, CheckpointMetadata, ImageMlp, ImageMlpConfig};
use cfx_render::{load_image, PngRenderer, Renderer};
use cfx_search::{ComprehensiveResult, CounterfactualExplainer, ExplainerConfig, MethodOutcome};

/// Backend type for the searches (gradients with respect to the input).
type SearchBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "cfx")]
#[command(author, version)]
#[command(about = "Counterfactual explanations for binary image classifiers")]
#[command(long_about = "cfx: find minimally changed images that flip a classifier's decision.

EXAMPLES:
  # Write an (untrained) model checkpoint for 64x64 grayscale inputs
  cfx init-model --output model.mpk --input-size 64 --channels 1

  # Explain a prediction, writing report.json and PNGs to ./cfx-out
  cfx explain --image xray.png --checkpoint model.mpk

  # Print the default search configuration
  cfx config > search.json

METHODS:
  adversarial           - Sign-gradient perturbation inside an L-infinity ball
  gradient_optimization - Adam on classification loss plus proximity penalty
  mask_based            - Sliding-window region masking")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate counterfactuals for one image
    Explain {
        /// Image file (PNG or JPEG)
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Model checkpoint written by `cfx init-model`
        #[arg(long, value_name = "MPK")]
        checkpoint: Option<PathBuf>,

        /// Search configuration JSON (see `cfx config`)
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        /// Input height and width when no checkpoint is given
        #[arg(long, default_value = "224", value_name = "PIXELS")]
        input_size: usize,

        /// Input channels (1 or 3) when no checkpoint is given
        #[arg(long, default_value = "3", value_name = "N")]
        channels: usize,

        /// Original class (0 = normal, 1 = fracture); predicted if omitted
        #[arg(long, value_name = "CLASS")]
        class: Option<usize>,

        /// Output directory for report.json and PNGs
        #[arg(long, default_value = "./cfx-out", value_name = "DIR")]
        output: PathBuf,

        /// Seed for model initialisation when no checkpoint is given
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
    /// Write a freshly initialised model checkpoint
    InitModel {
        /// Output checkpoint path
        #[arg(long, value_name = "MPK")]
        output: PathBuf,

        /// Input height and width
        #[arg(long, default_value = "224", value_name = "PIXELS")]
        input_size: usize,

        /// Input channels (1 or 3)
        #[arg(long, default_value = "3", value_name = "N")]
        channels: usize,

        /// Hidden layer sizes, comma separated
        #[arg(long, default_value = "32", value_delimiter = ',', value_name = "SIZES")]
        hidden: Vec<usize>,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
    /// Print the default search configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Explain {
            image,
            checkpoint,
            config,
            input_size,
            channels,
            class,
            output,
            seed,
        } => handle_explain(ExplainArgs {
            image,
            checkpoint,
            config,
            input_size,
            channels,
            class,
            output,
            seed,
        }),
        Commands::InitModel {
            output,
            input_size,
            channels,
            hidden,
            seed,
        } => handle_init_model(&output, input_size, channels, hidden, seed),
        Commands::Config => {
            println!("{}", ExplainerConfig::default().to_json()?);
            Ok(())
        }
    }
}

struct ExplainArgs {
    image: PathBuf,
    checkpoint: Option<PathBuf>,
    config: Option<PathBuf>,
    input_size: usize,
    channels: usize,
    class: Option<usize>,
    output: PathBuf,
    seed: u64,
}

fn check_channels(channels: usize) -> Result<()> {
    if channels != 1 && channels != 3 {
        bail!("Unsupported channel count {}: expected 1 or 3", channels);
    }
    Ok(())
}

fn load_model(args: &ExplainArgs, device: &NdArrayDevice) -> Result<ImageMlp<SearchBackend>> {
    match &args.checkpoint {
        Some(path) => {
            let (model, metadata) = load_image_mlp::<SearchBackend>(path, device)
                .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
            tracing::info!(
                "Loaded {} checkpoint for input {}",
                metadata.arch,
                metadata.config.input_shape()
            );
            Ok(model)
        }
        None => {
            check_channels(args.channels)?;
            tracing::warn!("No checkpoint given; explaining a randomly initialised model");
            let config = ImageMlpConfig::new(args.channels, args.input_size);
            Ok(config.init_seeded::<SearchBackend>(Seed::new(args.seed), device))
        }
    }
}

fn handle_explain(args: ExplainArgs) -> Result<()> {
    let device = NdArrayDevice::Cpu;

    let config = match &args.config {
        Some(path) => ExplainerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExplainerConfig::default(),
    };

    let model = load_model(&args, &device)?;
    let shape = model.shape();
    check_channels(shape.channels())?;

    let data = load_image(&args.image, shape)
        .with_context(|| format!("Failed to read image {}", args.image.display()))?;
    let image = Image::<SearchBackend>::from_data(&data, &device)?;

    let original_class = match args.class {
        Some(class) => class,
        None => {
            let prediction = model.predict(&image).context("Failed to predict original class")?;
            println!(
                "Predicted class: {} ({}) with confidence {:.4}",
                prediction.predicted_class,
                prediction.class_name(),
                prediction.confidence
            );
            prediction.predicted_class
        }
    };

    let explainer = CounterfactualExplainer::new(config).with_oracle(&model);
    let result = explainer
        .generate(&image, original_class)
        .context("Counterfactual generation failed")?;

    std::fs::create_dir_all(&args.output)?;
    let report = args.output.join("report.json");
    std::fs::write(&report, serde_json::to_string_pretty(&result)?)
        .with_context(|| format!("Failed to write {}", report.display()))?;

    // Rendering problems never invalidate the report.
    match PngRenderer::new(data).render(&result) {
        Ok(visuals) => match visuals.write_to_dir(&args.output) {
            Ok(paths) => tracing::info!("Wrote {} images to {}", paths.len(), args.output.display()),
            Err(e) => tracing::warn!("Failed to write images: {}", e),
        },
        Err(e) => tracing::warn!("Rendering failed: {}", e),
    }

    print_summary(&result, &report);
    Ok(())
}

fn handle_init_model(output: &Path, input_size: usize, channels: usize, hidden: Vec<usize>, seed: u64) -> Result<()> {
    check_channels(channels)?;
    if input_size == 0 {
        bail!("Input size must be at least 1");
    }

    let device = NdArrayDevice::Cpu;
    let config = ImageMlpConfig::new(channels, input_size).with_hidden_sizes(hidden);
    let model = config.init_seeded::<NdArray>(Seed::new(seed), &device);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let metadata = CheckpointMetadata::new(config).with_seed(seed);
    save_image_mlp(&model, &metadata, output)
        .with_context(|| format!("Failed to save checkpoint {}", output.display()))?;

    println!("Saved model checkpoint to {}", output.display());
    println!("  Input: {}", metadata.config.input_shape());
    println!("  Hidden: {:?}", metadata.config.hidden_sizes);
    println!("  Seed: {}", seed);
    Ok(())
}

fn print_summary(result: &ComprehensiveResult, report: &Path) {
    println!("\n=== Counterfactual Summary ===\n");
    println!(
        "Original class: {} ({})",
        result.original_class, CLASS_NAMES[result.original_class]
    );
    println!(
        "Target class:   {} ({})",
        result.target_class, CLASS_NAMES[result.target_class]
    );
    println!();

    for (method, outcome) in &result.counterfactuals {
        let status = match outcome {
            MethodOutcome::Searched(r) if r.success => format!(
                "success  confidence={:.4} magnitude={:.4} iterations={}",
                r.counterfactual_prediction.map_or(0.0, |p| p.confidence),
                r.perturbation_magnitude,
                r.iterations_used
            ),
            MethodOutcome::Searched(r) => r
                .message
                .clone()
                .unwrap_or_else(|| format!("no counterfactual after {} iterations", r.iterations_used)),
            MethodOutcome::AlreadyTarget { message, .. } => message.clone(),
            MethodOutcome::Failed { error } => format!("error: {error}"),
        };
        println!("  {:<22} {}", method.as_str(), status);
    }

    println!();
    match result.summary.best_method {
        Some(best) => println!("Best method: {}", best),
        None => println!("Best method: none"),
    }
    println!("Elapsed: {:.2}s", result.elapsed_secs);
    println!("Report: {}", report.display());
}
