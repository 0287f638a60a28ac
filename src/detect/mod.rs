mod backend;
pub mod backends;
pub mod decoder;
mod detection;
mod engine;
mod labels;
pub mod nms;
mod registry;

pub use backend::ModelRuntime;
pub use backends::StubRuntime;
#[cfg(feature = "backend-tract")]
pub use backends::TractRuntime;
pub use decoder::{ModelGeometry, OutOfFramePolicy, TensorDecoder, TensorView};
pub use detection::{CenterBox, Corners, Detection};
pub use engine::{Detect, DetectionEngine, EngineSettings};
pub use labels::{LabelSet, UNKNOWN_LABEL};
pub use nms::{suppress, SuppressionScope};
pub use registry::RuntimeRegistry;
