//! # Autoscale - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override dai flag
//! - Guida di un singolo job attraverso il `JobController`
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (sorgente, quality, output, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica il file di configurazione e applica gli override
//! 4. Legge la sorgente, la seleziona e avvia il job
//! 5. Segue gli snapshot fino allo stato terminale
//! 6. Scrive i derivati nella directory di output (se specificata)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! autoscale holiday.jpg --quality 85 --output ./out --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use autoscale_pipeline::file_manager::FileManager;
use autoscale_pipeline::json_output::{JsonConfig, JsonMessage};
use autoscale_pipeline::progress::{format_summary, StageProgress};
use autoscale_pipeline::utils::format_size;
use autoscale_pipeline::{Config, JobController, JobSnapshot, JobState};

#[derive(Parser)]
#[command(name = "autoscale")]
#[command(about = "Generate responsive derivatives from a single image")]
struct Args {
    /// Source image (JPEG, PNG or WebP)
    source: PathBuf,

    /// JPEG quality of the derivatives (1-100)
    #[arg(short, long, conflicts_with = "target_savings")]
    quality: Option<u8>,

    /// Requested savings fraction (0.0-1.0), mapped to a quality
    #[arg(short, long)]
    target_savings: Option<f64>,

    /// Output directory for the derivatives (if not specified, nothing is written)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (default: ~/.autoscale/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Latency of the simulated upload in milliseconds
    #[arg(long)]
    upload_latency_ms: Option<u64>,

    /// Extra upload attempts before failing
    #[arg(long)]
    upload_retries: Option<u32>,

    /// Output snapshots as JSON lines for programmatic use
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for JSON output
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            if args.json {
                JsonMessage::error("Invalid configuration".to_string(), Some(format!("{:#}", e)))
                    .emit();
            }
            return Err(e);
        }
    };

    match run(&args.source, &config).await {
        Ok(JobState::Succeeded) => Ok(()),
        Ok(state) => Err(anyhow::anyhow!("Job ended in state {}", state)),
        Err(e) => {
            if config.json_output {
                JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
            } else {
                error!("{:#}", e);
            }
            Err(e)
        }
    }
}

/// Config file first, then CLI flags on top
async fn load_config(args: &Args) -> Result<Config> {
    let path = args.config.clone().or_else(Config::default_path);

    let mut config = match path {
        Some(ref path) => {
            debug!("Loading configuration from {}", path.display());
            Config::from_file(path).await?
        }
        None => Config::default(),
    };

    if let Some(quality) = args.quality {
        config.quality = quality;
        config.target_savings = None;
    }
    if let Some(target) = args.target_savings {
        config.target_savings = Some(target);
    }
    if let Some(latency) = args.upload_latency_ms {
        config.upload_latency_ms = latency;
    }
    if let Some(retries) = args.upload_retries {
        config.upload_retries = retries;
    }
    if args.output.is_some() {
        config.output_path = args.output.clone();
    }
    config.json_output |= args.json;

    config.validate()?;
    Ok(config)
}

async fn run(source: &Path, config: &Config) -> Result<JobState> {
    if !source.is_file() {
        return Err(anyhow::anyhow!("Source file does not exist: {}", source.display()));
    }
    if !FileManager::is_image(source) {
        warn!("{} has no image extension, the engine will reject it", source.display());
    }

    let file = FileManager::read_source(source).await?;
    let started = Instant::now();

    if config.json_output {
        JsonMessage::start(source.to_path_buf(), file.bytes.len() as u64, JsonConfig::from(config))
            .emit();
    } else {
        info!(
            "Generating derivatives for {} ({}) at quality {}",
            file.name,
            format_size(file.bytes.len() as u64),
            config.effective_quality()
        );
    }

    let controller = JobController::from_config(config);
    let mut rx = controller.subscribe();

    controller.select_source(file.bytes, &file.mime, &file.name);
    controller.start();

    let progress = (!config.json_output).then(StageProgress::new);
    let outcome = follow(&controller, &mut rx, progress.as_ref(), config.json_output).await;

    let snapshot = match outcome {
        Ok(snapshot) => snapshot,
        Err(e) => {
            controller.reset();
            return Err(e);
        }
    };

    let mut written = Vec::new();
    if snapshot.state == JobState::Succeeded {
        if let (Some(set), Some(dir)) = (snapshot.derivatives.clone(), config.output_path.as_deref()) {
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "source".to_string());
            written = FileManager::write_derivatives(set, dir, &stem).await?;
            info!("Wrote {} files to {}", written.len(), dir.display());
        }
    }

    if config.json_output {
        JsonMessage::complete(
            snapshot.state,
            snapshot.stats.clone(),
            written,
            started.elapsed().as_secs_f64(),
        )
        .emit();
    } else if let Some(stats) = snapshot.stats.as_ref() {
        if let Some(ref progress) = progress {
            progress.finish(&format_summary(stats));
        }
    } else if let Some(ref progress) = progress {
        let reason = snapshot.error_reason.as_deref().unwrap_or("unknown error");
        progress.abandon(&format!("Failed: {}", reason));
    }

    let state = snapshot.state;
    controller.reset();
    Ok(state)
}

/// Follows the job until it reaches a terminal state
async fn follow(
    controller: &JobController,
    rx: &mut tokio::sync::broadcast::Receiver<JobSnapshot>,
    progress: Option<&StageProgress>,
    json_output: bool,
) -> Result<JobSnapshot> {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(snapshot) => {
                    if json_output {
                        JsonMessage::snapshot(snapshot.clone()).emit();
                    } else if let Some(progress) = progress {
                        progress.update(&snapshot);
                    }
                    if snapshot.is_terminal() {
                        return Ok(snapshot);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} snapshots", skipped);
                    let current = controller.snapshot();
                    if current.is_terminal() {
                        return Ok(current);
                    }
                }
                Err(RecvError::Closed) => return Ok(controller.snapshot()),
            },
            _ = tokio::signal::ctrl_c() => {
                if let Some(progress) = progress {
                    progress.abandon("Interrupted");
                }
                return Err(anyhow::anyhow!("Interrupted"));
            }
        }
    }
}
