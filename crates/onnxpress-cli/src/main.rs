//! onnxpress - ONNX model optimization pipeline CLI.
//!
//! Thin wrapper over the onnxpress library: parses flags into an
//! optimization request, runs the pipeline, and prints a size report.

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use onnxpress::{human_bytes, EngineEnv, OptimizeRequest, PressError, QuantizeMode};

#[derive(Parser, Debug)]
#[command(name = "onnxpress")]
#[command(about = "Optimize ONNX models: simplify, fp16, quantize, graph-optimize")]
struct Args {
    /// Path to the ONNX model to optimize
    model: Option<PathBuf>,

    /// Output path (defaults to a suffixed name beside the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Simplify the graph (constant folding, redundant node removal)
    #[arg(long)]
    simplify: bool,

    /// Convert float32 weights to float16
    #[arg(long)]
    fp16: bool,

    /// Quantize weights to int8
    #[arg(long, value_enum)]
    quantize: Option<QuantizeArg>,

    /// Run onnxruntime graph-level optimizations
    #[arg(long)]
    optimize: bool,

    /// Run all stages (simplify, fp16, dynamic quantize, graph-optimize)
    #[arg(long)]
    all: bool,

    /// Calibration dataset for static quantization
    #[arg(long)]
    calibration_data: Option<PathBuf>,

    /// Create the engine virtual environment and install the Python engines
    #[arg(long)]
    setup_engines: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Root directory for the engine venv and scripts
    #[arg(long)]
    data_root: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum QuantizeArg {
    Dynamic,
    Static,
}

impl From<QuantizeArg> for QuantizeMode {
    fn from(arg: QuantizeArg) -> Self {
        match arg {
            QuantizeArg::Dynamic => QuantizeMode::Dynamic,
            QuantizeArg::Static => QuantizeMode::Static,
        }
    }
}

impl Args {
    fn request(&self) -> OptimizeRequest {
        OptimizeRequest {
            simplify: self.simplify,
            fp16: self.fp16,
            quantize: self.quantize.map(QuantizeMode::from).unwrap_or_default(),
            graph_optimize: self.optimize,
            all: self.all,
            calibration_data: self.calibration_data.clone(),
            output: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        if e.downcast_ref::<PressError>()
            .is_some_and(PressError::is_usage_error)
        {
            eprintln!("Run with --help for usage.");
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let env = match &args.data_root {
        Some(root) => EngineEnv::new(root),
        None => EngineEnv::default(),
    };

    if args.setup_engines {
        info!("Setting up engine environment in {}", env.data_root().display());
        env.ensure_environment().await?;
        println!("Engine environment ready: {}", env.data_root().display());
        if args.model.is_none() {
            return Ok(());
        }
    }

    let Some(model) = &args.model else {
        bail!("no model given; pass a path to an ONNX model");
    };

    let report = onnxpress::optimize::run(model, &args.request(), &env).await?;

    println!("Original: {}", human_bytes(report.original_size_bytes));
    for (stage, size) in &report.stage_sizes {
        println!("  after {stage}: {}", human_bytes(*size));
    }
    println!("Final:    {}", human_bytes(report.final_size_bytes));
    println!("Reduction: {:.1}%", report.reduction_percent());
    println!("Saved to {}", report.output_path.display());

    if !report.any_completed() {
        println!("No stage ran; output is an unmodified copy of the input.");
        println!("Run with --setup-engines to install the optimization engines.");
    }

    Ok(())
}
