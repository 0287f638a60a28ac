//! sentineld - frame sentinel daemon
//!
//! 1. Loads configuration (file named by --config / SENTINEL_CONFIG, then env)
//! 2. Opens the detection engine through the backend fallback chain
//! 3. Restores the last-save timestamp from the state db
//! 4. Feeds frames from the configured source through the admission controller
//! 5. Exits non-zero on configuration or persistence failures

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;

use frame_sentinel::{
    default_registry, open_source, AdmissionController, DetectionEngine, DirectorySink,
    FrameOutcome, LabelSet, SentinelConfig, SentinelError, SqliteCounterStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        let class = match SentinelError::classify(&e) {
            Some(SentinelError::Configuration(_)) => "configuration",
            Some(SentinelError::Persistence(_)) => "persistence",
            Some(SentinelError::TransientInference(_)) => "inference",
            None => "runtime",
        };
        log::error!("sentineld stopped ({} failure): {:#}", class, e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let cfg = SentinelConfig::load_from(args.config.as_deref())?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let labels = LabelSet::load(&cfg.model.labels_path);
    let registry = default_registry(&cfg, labels.len());
    log::info!(
        "backends available={:?} preferred={:?}",
        registry.list(),
        cfg.model.backends
    );
    let runtime = registry
        .open_preferred(&cfg.model.backends)
        .map_err(|e| SentinelError::configuration(format!("{:#}", e)))?;
    let engine = DetectionEngine::new(runtime, labels, cfg.engine_settings())?;

    let store = SqliteCounterStore::open(&cfg.storage.state_db)
        .map_err(|e| SentinelError::persistence(format!("{:#}", e)))?;
    let sink = DirectorySink::new(cfg.sink_config())
        .map_err(|e| SentinelError::persistence(format!("{:#}", e)))?;
    let mut controller = AdmissionController::open(engine, sink, store, cfg.capture_policy()?)?;

    let mut source = open_source(cfg.source.clone())?;
    source.connect()?;

    log::info!(
        "sentineld running. saving to {} state={}",
        cfg.storage.save_dir.display(),
        cfg.storage.state_db
    );

    let mut last_health_log = Instant::now();
    let mut frames = 0u64;
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            log::info!("shutdown requested");
            break Ok(());
        }
        if args.max_frames.is_some_and(|max| frames >= max) {
            log::info!("frame limit reached ({})", frames);
            break Ok(());
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("source exhausted after {} frames", frames);
                break Ok(());
            }
            Err(e) => break Err(e),
        };
        frames += 1;

        match controller.on_frame(frame) {
            Ok(FrameOutcome::Saved(artifact)) => {
                log::debug!("labels written to {}", artifact.labels_path.display());
            }
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let source_stats = source.stats();
            let stats = controller.stats();
            log::info!(
                "source health={} frames={} skipped={} url={} | seen={} dropped={} processed={} hits={} saves={} inference_failures={}",
                source.is_healthy(),
                source_stats.frames_captured,
                source_stats.frames_skipped,
                source_stats.url,
                stats.frames_seen,
                stats.frames_dropped,
                stats.frames_processed,
                stats.hits,
                stats.saves,
                stats.inference_failures
            );
            last_health_log = Instant::now();
        }
    };

    let stats = controller.stats();
    log::info!(
        "sentineld finished: processed={} hits={} saves={}",
        stats.frames_processed,
        stats.hits,
        stats.saves
    );
    let (engine, _sink, _store) = controller.into_parts();
    engine.close();
    result
}
