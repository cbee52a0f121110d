use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emocap_core::gallery::{DistanceMetric, GalleryIndex};
use emocap_core::matcher::IdentityMatcher;
use emocap_core::pipeline::{CapturePipeline, FrameSource, PipelineReport};
use emocap_core::{CaptureScheduler, EmotionGate};
use emocap_io::{DirectorySource, ExternalAnalyzer, OutputRouter, SpoolSource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
use config::Config;

#[derive(Parser)]
#[command(name = "emocap", about = "Emotion-gated face capture")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a spool directory for incoming frames until interrupted
    Watch {
        /// Directory the frame producer drops images into
        #[arg(long)]
        spool: PathBuf,
        /// Override the configured capture interval (seconds)
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Process a directory of still images in one pass
    Scan {
        #[arg(long)]
        input: PathBuf,
        /// Capture interval (seconds); batch scans default to 0
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Build the enrolled gallery and print it as JSON
    Gallery,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch { spool, interval } => {
            if let Some(secs) = interval {
                config.interval_seconds = secs;
            }
            let stop = Arc::new(AtomicBool::new(false));
            let source = SpoolSource::open(
                &spool,
                Duration::from_millis(config.poll_ms),
                stop.clone(),
            )?;
            let pipeline = build_pipeline(&config)?;
            let report = run_until_interrupt(pipeline, source, stop).await?;
            tracing::info!(routed = report.routed, frames = report.frames, "watch finished");
        }
        Commands::Scan { input, interval } => {
            // A batch scan has no wall-clock pacing unless asked for.
            config.interval_seconds = interval.unwrap_or(0.0);
            let stop = Arc::new(AtomicBool::new(false));
            let source = DirectorySource::open(&input)?;
            let pipeline = build_pipeline(&config)?;
            let report = run_until_interrupt(pipeline, source, stop).await?;
            tracing::info!(
                routed = report.routed,
                no_face = report.no_face,
                no_match = report.no_match,
                failed = report.failed,
                "scan finished"
            );
        }
        Commands::Gallery => print_gallery(&config)?,
    }

    Ok(())
}

fn make_analyzer(config: &Config) -> ExternalAnalyzer {
    ExternalAnalyzer::new(config.analyzer_command.clone(), config.analyzer_args.clone())
}

/// Build the gallery matcher when an enrollment root is configured.
///
/// An unset allowlist defaults to every enrolled identity; an
/// explicitly empty one stays empty and accepts nobody.
fn build_matcher(config: &Config) -> Result<Option<IdentityMatcher>> {
    let Some(root) = config.enrollment_root.as_deref() else {
        return Ok(None);
    };

    let mut analyzer = make_analyzer(config);
    let index = GalleryIndex::build(root, &mut analyzer, config.distance_metric)
        .context("building gallery index")?;
    tracing::info!(
        identities = index.identities().len(),
        references = index.len(),
        "gallery built"
    );

    let allowlist: Vec<String> = match &config.known_identities {
        Some(list) => list.clone(),
        None => index.identities().keys().map(|s| s.to_string()).collect(),
    };

    Ok(Some(IdentityMatcher::new(index, config.threshold(), allowlist)))
}

fn build_pipeline(config: &Config) -> Result<CapturePipeline<ExternalAnalyzer, OutputRouter>> {
    let matcher = build_matcher(config)?;
    let gate = if config.accepted_emotions.is_empty() {
        EmotionGate::accept_all()
    } else {
        EmotionGate::new(&config.accepted_emotions)
    };

    Ok(CapturePipeline::new(
        CaptureScheduler::new(config.interval()),
        gate,
        matcher,
        config.artifact,
        make_analyzer(config),
        OutputRouter::new(config.output_root.clone()),
    ))
}

/// Run the pipeline on a blocking task; Ctrl-C raises the stop flag
/// and the run ends at the next iteration boundary.
async fn run_until_interrupt<S>(
    mut pipeline: CapturePipeline<ExternalAnalyzer, OutputRouter>,
    mut source: S,
    stop: Arc<AtomicBool>,
) -> Result<PipelineReport>
where
    S: FrameSource + Send + 'static,
{
    let run_stop = stop.clone();
    let mut task = tokio::task::spawn_blocking(move || pipeline.run(&mut source, &run_stop));

    let report = tokio::select! {
        res = &mut task => res??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, finishing current frame");
            stop.store(true, Ordering::Relaxed);
            task.await??
        }
    };
    Ok(report)
}

fn print_gallery(config: &Config) -> Result<()> {
    let root = config
        .enrollment_root
        .as_deref()
        .context("no enrollment_root configured")?;

    let mut analyzer = make_analyzer(config);
    let index = GalleryIndex::build(root, &mut analyzer, config.distance_metric)?;

    let metric = match config.distance_metric {
        DistanceMetric::Cosine => "cosine",
        DistanceMetric::Euclidean => "euclidean",
    };
    let report = serde_json::json!({
        "enrollment_root": root.display().to_string(),
        "metric": metric,
        "threshold": config.threshold(),
        "identities": index.identities(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
