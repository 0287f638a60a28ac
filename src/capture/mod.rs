//! Capture admission: which frames reach the detector, which hits are kept,
//! and when a kept hit is saved.

pub mod controller;
pub mod policy;
pub mod state;

pub use controller::{AdmissionController, ControllerStats, FrameOutcome};
pub use policy::{CapturePolicy, ClassAllowList, ALLOW_ANY};
pub use state::{CachedHit, CaptureState};
