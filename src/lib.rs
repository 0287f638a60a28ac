//! frame-sentinel
//!
//! An always-on visual sensor: frames are sampled from a source, run through
//! an object detector, and the interesting ones are saved at a bounded
//! long-term rate.
//!
//! # Pipeline
//!
//! frame -> admission gate -> detection engine -> allow-list -> hit cache ->
//! save quota -> persisted artifact
//!
//! # Module Structure
//!
//! - `detect`: tensor decoding, non-max suppression, model runtimes, engine
//! - `capture`: rate gate, latest-hit cache and save quota
//! - `archive`: JPEG + label-line artifacts
//! - `storage`: durable last-save timestamp
//! - `ingest`: frame sources
//! - `config`: file + environment configuration
//! - `error`: failure taxonomy (configuration, transient inference, persistence)

pub mod archive;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod storage;

pub use archive::{DirectorySink, DirectorySinkConfig, PersistenceSink, SavedArtifact};
pub use capture::{
    AdmissionController, CapturePolicy, ClassAllowList, ControllerStats, FrameOutcome,
};
pub use config::SentinelConfig;
pub use detect::{
    Detect, Detection, DetectionEngine, EngineSettings, LabelSet, ModelRuntime, RuntimeRegistry,
    SuppressionScope,
};
pub use error::SentinelError;
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceConfig, SourceStats};
pub use storage::{CounterStore, InMemoryCounterStore, SqliteCounterStore};

/// Anchor count of a YOLOv8-style head (strides 8, 16 and 32) for the given
/// input size.
pub fn default_anchor_count(input_width: u32, input_height: u32) -> usize {
    [8u32, 16, 32]
        .iter()
        .map(|stride| (input_width / stride) as usize * (input_height / stride) as usize)
        .sum()
}

/// Default registry: `stub` always, `tract` when built with `backend-tract`.
///
/// The stub backend declares the configured input size, one class per label
/// and a YOLOv8-style anchor count, and returns all-zero tensors.
pub fn default_registry(config: &SentinelConfig, num_labels: usize) -> RuntimeRegistry {
    let mut registry = RuntimeRegistry::new();

    let (width, height) = (config.model.input_width, config.model.input_height);
    let classes = num_labels.max(1);
    registry.register("stub", move || {
        let runtime: Box<dyn ModelRuntime> = Box::new(detect::StubRuntime::new(
            width,
            height,
            classes,
            default_anchor_count(width, height),
        ));
        Ok(runtime)
    });

    #[cfg(feature = "backend-tract")]
    {
        let model_path = config.model.path.clone();
        registry.register("tract", move || {
            let path = model_path
                .as_ref()
                .ok_or_else(|| SentinelError::configuration("tract backend requires model.path"))?;
            let runtime: Box<dyn ModelRuntime> =
                Box::new(detect::TractRuntime::new(path, width, height)?);
            Ok(runtime)
        });
    }

    registry
}
