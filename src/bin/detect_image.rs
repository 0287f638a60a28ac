//! detect_image - run the detection engine once on an image file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use frame_sentinel::archive::label_line;
use frame_sentinel::frame::now_ms;
use frame_sentinel::{
    default_registry, DetectionEngine, Frame, LabelSet, SentinelConfig, SentinelError,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to run detection on.
    image: PathBuf,
    /// JSON or TOML config file.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,
    /// Backends to try in order (overrides config).
    #[arg(long, value_delimiter = ',')]
    backends: Vec<String>,
    /// Print only label lines.
    #[arg(long)]
    labels_only: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let cfg = SentinelConfig::load_from(args.config.as_deref())?;
    let backends = if args.backends.is_empty() {
        cfg.model.backends.clone()
    } else {
        args.backends.clone()
    };

    let labels = LabelSet::load(&cfg.model.labels_path);
    let runtime = default_registry(&cfg, labels.len())
        .open_preferred(&backends)
        .map_err(|e| SentinelError::configuration(format!("{:#}", e)))?;
    let mut engine = DetectionEngine::new(runtime, labels, cfg.engine_settings())?;

    let image = image::open(&args.image)
        .with_context(|| format!("failed to open {}", args.image.display()))?;
    let frame = Frame::new(image.to_rgb8(), now_ms()?);
    let detections = engine.detect(&frame)?;

    for det in &detections {
        if args.labels_only {
            println!("{}", label_line(det));
        } else {
            let c = det.corners();
            println!(
                "{:<12} conf={:.3} box=({:.3},{:.3})-({:.3},{:.3}) | {}",
                det.class_name(),
                det.confidence(),
                c.x1,
                c.y1,
                c.x2,
                c.y2,
                label_line(det)
            );
        }
    }
    if !args.labels_only {
        println!("{} detection(s) via {}", detections.len(), engine.backend_name());
    }
    engine.close();
    Ok(())
}
