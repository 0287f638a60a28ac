//! Error taxonomy for the sensor.
//!
//! Everything is propagated as `anyhow::Error`; the variants below are attached
//! at the points where the failure class is known so that the host loop can
//! decide between "log and continue" and "halt".

use std::fmt;

/// Failure classes surfaced by the sensor.
///
/// Degraded input (short label lists, unknown class indices) is deliberately
/// absent: it always resolves to a fallback value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelError {
    /// Bad model file, shape mismatch, invalid settings. Fatal at startup.
    Configuration(String),
    /// A single frame's inference call failed. The frame is skipped.
    TransientInference(String),
    /// The save sink or the durable counter failed. Fatal.
    Persistence(String),
}

impl SentinelError {
    pub fn configuration(message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Self::Configuration(message.into()))
    }

    pub fn transient(message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Self::TransientInference(message.into()))
    }

    pub fn persistence(message: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(Self::Persistence(message.into()))
    }

    /// Returns true when the failure must terminate operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::TransientInference(_))
    }

    /// Classify an arbitrary error. Unclassified errors are treated as fatal.
    pub fn classify(err: &anyhow::Error) -> Option<&SentinelError> {
        err.chain().find_map(|cause| cause.downcast_ref::<SentinelError>())
    }

    pub fn error_is_fatal(err: &anyhow::Error) -> bool {
        Self::classify(err).map_or(true, SentinelError::is_fatal)
    }
}

impl fmt::Display for SentinelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Self::TransientInference(msg) => write!(f, "inference failed: {}", msg),
            Self::Persistence(msg) => write!(f, "persistence failure: {}", msg),
        }
    }
}

impl std::error::Error for SentinelError {}
