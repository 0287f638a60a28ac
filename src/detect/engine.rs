use anyhow::{Context, Result};
use image::imageops::{self, FilterType};

use crate::detect::backend::ModelRuntime;
use crate::detect::decoder::{ModelGeometry, OutOfFramePolicy, TensorDecoder, TensorView};
use crate::detect::detection::Detection;
use crate::detect::labels::LabelSet;
use crate::detect::nms::{suppress, SuppressionScope};
use crate::error::SentinelError;
use crate::frame::Frame;

/// Anything that turns a frame into detections.
///
/// The capture controller depends on this seam rather than on the engine so
/// that it can be driven by scripted detectors.
pub trait Detect {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Tunable thresholds for an engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub scope: SuppressionScope,
    pub out_of_frame: OutOfFramePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            iou_threshold: 0.5,
            scope: SuppressionScope::ClassAgnostic,
            out_of_frame: OutOfFramePolicy::Keep,
        }
    }
}

/// Decoder + suppressor around a black-box model runtime.
///
/// The engine owns the runtime; dropping the engine (or calling
/// [`DetectionEngine::close`]) releases it.
pub struct DetectionEngine {
    runtime: Box<dyn ModelRuntime>,
    geometry: ModelGeometry,
    decoder: TensorDecoder,
    settings: EngineSettings,
    input: Vec<f32>,
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("runtime", &self.runtime.name())
            .field("geometry", &self.geometry)
            .field("labels", &self.decoder.labels().len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl DetectionEngine {
    /// Validate the runtime's declared shapes and build the engine.
    ///
    /// Any failure here is a configuration error; the runtime is dropped
    /// before returning.
    pub fn new(
        mut runtime: Box<dyn ModelRuntime>,
        labels: LabelSet,
        settings: EngineSettings,
    ) -> Result<Self> {
        validate_threshold("confidence threshold", settings.confidence_threshold)?;
        validate_threshold("iou threshold", settings.iou_threshold)?;

        let (width, height) = runtime.input_size();
        let geometry = ModelGeometry::from_output_shape(width, height, &runtime.output_shape())
            .with_context(|| format!("runtime '{}' declared an unusable shape", runtime.name()))?;

        if !labels.is_empty() && labels.len() != geometry.num_classes() {
            log::warn!(
                "label list has {} entries but model reports {} classes",
                labels.len(),
                geometry.num_classes()
            );
        }

        runtime
            .warm_up()
            .map_err(|e| SentinelError::configuration(format!("runtime warm-up failed: {:#}", e)))?;

        log::info!(
            "detection engine ready: backend={} input={}x{} classes={} anchors={} conf={:.2} iou={:.2} scope={:?}",
            runtime.name(),
            geometry.input_width,
            geometry.input_height,
            geometry.num_classes(),
            geometry.num_anchors,
            settings.confidence_threshold,
            settings.iou_threshold,
            settings.scope
        );

        Ok(Self {
            runtime,
            geometry,
            decoder: TensorDecoder::new(labels).with_out_of_frame(settings.out_of_frame),
            settings,
            input: Vec::with_capacity(3 * width as usize * height as usize),
        })
    }

    pub fn geometry(&self) -> ModelGeometry {
        self.geometry
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn labels(&self) -> &LabelSet {
        self.decoder.labels()
    }

    pub fn backend_name(&self) -> &'static str {
        self.runtime.name()
    }

    /// Run the full pipeline on one frame.
    ///
    /// Runtime failures are reported as transient; the engine stays usable.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.prepare_input(frame);

        let raw = self
            .runtime
            .infer(&self.input)
            .map_err(|e| SentinelError::transient(format!("{:#}", e)))?;
        let tensor = TensorView::new(&raw, self.geometry).map_err(|e| {
            SentinelError::transient(format!("runtime returned malformed output: {:#}", e))
        })?;

        let candidates = self
            .decoder
            .decode(tensor, self.settings.confidence_threshold);
        let candidate_count = candidates.len();
        let kept = suppress(
            candidates,
            self.settings.iou_threshold,
            self.settings.scope,
        );
        log::debug!(
            "frame {}: {} candidates, {} after suppression",
            frame.timestamp_ms,
            candidate_count,
            kept.len()
        );
        Ok(kept)
    }

    /// Release the runtime.
    pub fn close(self) {
        log::info!("detection engine closed (backend={})", self.runtime.name());
    }

    /// Resize to the model input and write planar RGB scaled to `0..=1`.
    fn prepare_input(&mut self, frame: &Frame) {
        let width = self.geometry.input_width;
        let height = self.geometry.input_height;
        let resized;
        let image = if frame.width() == width && frame.height() == height {
            frame.image()
        } else {
            resized = imageops::resize(frame.image(), width, height, FilterType::Nearest);
            &resized
        };

        let plane = width as usize * height as usize;
        self.input.clear();
        self.input.resize(3 * plane, 0.0);
        for (i, pixel) in image.pixels().enumerate() {
            self.input[i] = pixel[0] as f32 / 255.0;
            self.input[plane + i] = pixel[1] as f32 / 255.0;
            self.input[2 * plane + i] = pixel[2] as f32 / 255.0;
        }
    }
}

impl Detect for DetectionEngine {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        DetectionEngine::detect(self, frame)
    }
}

fn validate_threshold(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SentinelError::configuration(format!(
            "{} must be within 0..=1, got {}",
            name, value
        )));
    }
    Ok(())
}
