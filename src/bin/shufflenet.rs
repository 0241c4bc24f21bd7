// shufflenet.rs
// Command-line front end: inspect a ShuffleNetV2 configuration, run it on a
// synthetic batch, or export freshly initialised weights as a JSON state dict.

use clap::{Args, Parser, Subcommand};
use rust_shufflenet::config::{load_config, validate_config, ModelConfig};
use rust_shufflenet::layers::Layer;
use rust_shufflenet::model::{ShuffleNetV2, Variant};
use rust_shufflenet::utils::{init_cli_logger, SimpleRng};
use rust_shufflenet::{FeatureMap, Result, Shape};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "shufflenet")]
#[command(about = "ShuffleNetV2 image classifier on the CPU", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-module output shapes and parameter counts
    Summary {
        #[command(flatten)]
        model: ModelArgs,

        /// Batch size used for the shape walk
        #[arg(short, long, default_value = "1")]
        batch: usize,
    },

    /// Run a forward pass on a seeded random batch
    Infer {
        #[command(flatten)]
        model: ModelArgs,

        /// Batch size
        #[arg(short, long, default_value = "1")]
        batch: usize,

        /// Seed for the synthetic input
        #[arg(long, default_value = "0")]
        input_seed: u64,

        /// Number of top classes to print per sample
        #[arg(short, long, default_value = "5")]
        top: usize,
    },

    /// Write freshly initialised weights as a JSON state dict
    Export {
        #[command(flatten)]
        model: ModelArgs,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Model config file (JSON)
    #[arg(short, long, conflicts_with = "variant")]
    config: Option<PathBuf>,

    /// Published variant: x0_5, x1_0, x1_5 or x2_0
    #[arg(long, default_value = "x1_0")]
    variant: Variant,

    /// Weights to load after construction
    #[arg(short, long)]
    weights: Option<PathBuf>,

    /// Square input side (overrides the config)
    #[arg(short, long)]
    size: Option<usize>,
}

impl ModelArgs {
    fn resolve(&self) -> Result<ModelConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ModelConfig::for_variant(self.variant),
        };
        if let Some(weights) = &self.weights {
            config.weights = Some(weights.clone());
        }
        if let Some(size) = self.size {
            config.input_size = size;
        }
        validate_config(&config)?;
        Ok(config)
    }
}

fn describe(config: &ModelConfig, model: &ShuffleNetV2) -> String {
    let name = config
        .variant
        .filter(|_| config.stages_repeats.is_none())
        .map(|variant| variant.arch_name().to_string())
        .unwrap_or_else(|| {
            format!(
                "shufflenetv2 repeats={:?} channels={:?}",
                model.stages_repeats(),
                model.stage_out_channels()
            )
        });
    format!("{} ({} classes)", name, model.num_classes())
}

fn run_summary(args: &ModelArgs, batch: usize) -> Result<()> {
    let config = args.resolve()?;
    let model = config.build()?;
    let input = Shape::new(batch, 3, config.input_size, config.input_size);

    println!("{}", describe(&config, &model));
    println!("{:<10} {:>24} {:>12}", "module", "output", "params");
    println!("{:<10} {:>24} {:>12}", "input", input.to_string(), "-");
    for row in model.summary(input)? {
        println!(
            "{:<10} {:>24} {:>12}",
            row.name,
            row.output_shape.to_string(),
            row.parameters
        );
    }
    println!("Total parameters: {}", model.parameter_count());
    Ok(())
}

fn run_infer(args: &ModelArgs, batch: usize, input_seed: u64, top: usize) -> Result<()> {
    let config = args.resolve()?;
    let mut model = config.build()?;
    model.eval();

    let shape = Shape::new(batch, 3, config.input_size, config.input_size);
    let mut rng = SimpleRng::new(input_seed);
    let input = FeatureMap::from_vec(shape, rng.normal_vec(shape.numel()))?;

    info!(model = %describe(&config, &model), input = %shape, "running inference");
    let start_time = Instant::now();
    let probs = model.probabilities(&input)?;
    let elapsed = start_time.elapsed().as_secs_f32();

    let classes = model.num_classes();
    for (n, row) in probs.chunks_exact(classes).enumerate() {
        let mut ranked: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let best: Vec<String> = ranked
            .iter()
            .take(top)
            .map(|(class, p)| format!("{}:{:.4}", class, p))
            .collect();
        println!("sample {}: {}", n, best.join(" "));
    }
    println!("Forward pass: {:.3}s ({:.1} ms/sample)", elapsed, 1000.0 * elapsed / batch as f32);
    Ok(())
}

fn run_export(args: &ModelArgs, output: &Path) -> Result<()> {
    let config = args.resolve()?;
    let model = config.build()?;
    model.save_weights(output)?;
    println!(
        "Wrote {} tensors ({} parameters) to {}",
        model.state_dict().len(),
        model.parameter_count(),
        output.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_cli_logger(cli.verbose);

    let result = match &cli.command {
        Commands::Summary { model, batch } => run_summary(model, *batch),
        Commands::Infer {
            model,
            batch,
            input_seed,
            top,
        } => run_infer(model, *batch, *input_seed, *top),
        Commands::Export { model, output } => run_export(model, output),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
