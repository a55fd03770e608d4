use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber;

use vid_rehash::{
    batch::{discover_videos, BatchRunner},
    config::Config,
    ffmpeg::SystemRunner,
    pipeline::{PipelineRunner, ProgressSink, ProgressUpdate},
    verify::verify_output,
    workspace::Workspace,
};

/// Scratch entries from interrupted runs are swept once they reach this age
const STALE_SCRATCH_AGE: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Parser)]
#[command(
    name = "vid-rehash",
    version,
    about = "Re-hash videos so their file fingerprint changes while the content looks the same",
    long_about = "vid-rehash pushes every video under INPUT through a chain of superficial transformations (metadata strip, pixel noise, re-encode, silence padding, corner overlay). Each output lands under a fresh randomized name; inputs are never modified."
)]
struct Cli {
    /// Directory to scan recursively, or a single video file
    input: PathBuf,

    /// Output directory (default: INPUT/processed)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the metadata strip step
    #[arg(long)]
    no_metadata: bool,

    /// Skip the pixel noise step
    #[arg(long)]
    no_noise: bool,

    /// Skip the re-encode step
    #[arg(long)]
    no_reencode: bool,

    /// Pad the audio with a short random silence
    #[arg(long)]
    silence: bool,

    /// Composite a near-transparent pixel at a random corner
    #[arg(long)]
    overlay: bool,

    /// Maximum per-channel noise offset (1-5)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    noise_intensity: Option<u8>,

    /// Fraction of pixels perturbed per frame (0.0-1.0)
    #[arg(long)]
    noise_fraction: Option<f64>,

    /// Re-encode quality as CRF (18-35, lower is higher quality)
    #[arg(long, value_parser = clap::value_parser!(u8).range(18..=35))]
    crf: Option<u8>,

    /// Minimum silence padding in seconds
    #[arg(long)]
    silence_min: Option<f64>,

    /// Maximum silence padding in seconds
    #[arg(long)]
    silence_max: Option<f64>,

    /// Parallel job slots (default: min(8, cpu count))
    #[arg(short, long)]
    workers: Option<usize>,

    /// Re-probe each output and confirm its fingerprint changed
    #[arg(long)]
    verify: bool,

    /// List what would run without processing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    if cli.no_metadata {
        config.pipeline.strip_metadata = false;
    }
    if cli.no_noise {
        config.pipeline.pixel_noise = false;
    }
    if cli.no_reencode {
        config.pipeline.reencode = false;
    }
    if cli.silence {
        config.pipeline.silence_pad = true;
    }
    if cli.overlay {
        config.pipeline.overlay = true;
    }

    if let Some(intensity) = cli.noise_intensity {
        config.noise.max_offset = intensity;
    }
    if let Some(fraction) = cli.noise_fraction {
        config.noise.pixel_fraction = fraction;
    }
    if let Some(crf) = cli.crf {
        config.encode.crf = crf;
    }
    if let Some(min) = cli.silence_min {
        config.silence.min_secs = min;
    }
    if let Some(max) = cli.silence_max {
        config.silence.max_secs = max;
    }
    if let Some(workers) = cli.workers {
        config.batch.workers = workers;
    }

    let staging = if cli.input.is_file() {
        cli.input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        cli.input.clone()
    };
    config.paths.output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| staging.join("processed"));
    config.paths.staging_dir = staging;

    config.validate()?;
    Ok(config)
}

/// Progress straight to the log; one line per starting step
struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        info!(
            "{}: step {}/{} {}",
            update.job_id,
            update.step_index + 1,
            update.total_steps,
            update.step
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting vid-rehash v{}", env!("CARGO_PKG_VERSION"));
    info!("Input: {:?}", cli.input);

    if !cli.input.exists() {
        anyhow::bail!("input path {} does not exist", cli.input.display());
    }

    let config = effective_config(&cli)?;
    let workspace = Workspace::new(&config.paths);

    let inputs = discover_videos(&cli.input, &config.batch.extensions, Some(workspace.output()))?;
    if inputs.is_empty() {
        anyhow::bail!("no video files found under {}", cli.input.display());
    }
    info!("Found {} video file(s)", inputs.len());

    let workers = config.batch.effective_workers();
    let pipeline = PipelineRunner::new(config, workspace.clone())?;

    if cli.dry_run {
        println!("Would process {} file(s):", inputs.len());
        for input in &inputs {
            println!("  {}", input.display());
        }
        let steps: Vec<String> = pipeline
            .planned_steps()
            .iter()
            .map(|s| s.to_string())
            .collect();
        println!("Steps: {}", steps.join(" -> "));
        println!("Output directory: {}", workspace.output().display());
        return Ok(());
    }

    workspace.prepare()?;
    let swept = workspace.sweep_stale(STALE_SCRATCH_AGE)?;
    if swept > 0 {
        info!("Swept {} stale scratch entries", swept);
    }

    let batch = BatchRunner::new(pipeline, workers);
    let report = batch.run(inputs, Arc::new(LogProgress)).await;

    println!(
        "\nProcessed {} file(s) in {:.1}s: {} succeeded, {} failed",
        report.succeeded() + report.failed(),
        report.elapsed.as_secs_f64(),
        report.succeeded(),
        report.failed()
    );
    for outcome in &report.outcomes {
        println!(
            "  ✓ {} -> {}",
            outcome.input.display(),
            outcome.output.display()
        );
    }
    for failure in &report.failures {
        let step = failure
            .step
            .map(|s| s.to_string())
            .unwrap_or_else(|| "setup".to_string());
        println!(
            "  ✗ {} [{}]: {}",
            failure.input.display(),
            step,
            failure.error.user_message()
        );
    }

    if cli.verify {
        let prober = SystemRunner::new();
        for outcome in &report.outcomes {
            match verify_output(&prober, &outcome.input, &outcome.output) {
                Ok(result) if result.identical => warn!(
                    "{}: output is byte-identical to the input",
                    outcome.job_id
                ),
                Ok(result) => info!(
                    "{}: fingerprint changed, duration drift {:.2}s",
                    outcome.job_id,
                    result.duration_delta()
                ),
                Err(e) => warn!("{}: verification failed: {}", outcome.job_id, e),
            }
        }
    }

    if !report.is_clean() {
        anyhow::bail!("{} job(s) failed", report.failed());
    }
    Ok(())
}
