//! Throttle, quota and allow-list settings for the admission controller.

use anyhow::Result;

use crate::detect::Detection;
use crate::error::SentinelError;

pub const DEFAULT_FRAME_RATE: u32 = 3;
pub const DEFAULT_MAX_IMAGES: u32 = 64;
pub const DEFAULT_PERIOD_HOURS: u32 = 8;
pub const DEFAULT_ALLOW_LIST: [&str; 3] = ["person", "cat", "dog"];

/// Matches every class name when present in the allow-list.
pub const ALLOW_ANY: &str = "*";

const MS_PER_HOUR: u64 = 3_600_000;

/// Class names that count as hits. Matching is exact and case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassAllowList {
    names: Vec<String>,
    any: bool,
}

impl ClassAllowList {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .map(|n: String| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(SentinelError::configuration(
                "class allow-list must name at least one class",
            ));
        }
        let any = names.iter().any(|n| n == ALLOW_ANY);
        Ok(Self { names, any })
    }

    pub fn allows(&self, class_name: &str) -> bool {
        self.any || self.names.iter().any(|n| n == class_name)
    }

    /// Keep only detections whose class is allowed, preserving order.
    pub fn filter(&self, detections: Vec<Detection>) -> Vec<Detection> {
        if self.any {
            return detections;
        }
        detections
            .into_iter()
            .filter(|d| self.allows(d.class_name()))
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for ClassAllowList {
    fn default() -> Self {
        Self {
            names: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
            any: false,
        }
    }
}

/// Validated, derived controller policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Minimum spacing between admitted frames.
    pub frame_interval_ms: u64,
    /// Minimum spacing between saves.
    pub save_interval_ms: u64,
    pub allow_list: ClassAllowList,
}

impl CapturePolicy {
    /// Build from the user-facing knobs.
    ///
    /// `debug_interval_secs` replaces the quota-derived save interval when set.
    pub fn new(
        frame_rate: u32,
        max_images_per_period: u32,
        period_hours: u32,
        debug_interval_secs: Option<u64>,
        allow_list: ClassAllowList,
    ) -> Result<Self> {
        if frame_rate == 0 {
            return Err(SentinelError::configuration("frame rate must be greater than zero"));
        }
        if max_images_per_period == 0 {
            return Err(SentinelError::configuration(
                "max images per period must be greater than zero",
            ));
        }
        if period_hours == 0 {
            return Err(SentinelError::configuration("period hours must be greater than zero"));
        }

        let save_interval_ms = match debug_interval_secs {
            Some(0) => {
                return Err(SentinelError::configuration(
                    "debug save interval must be greater than zero",
                ))
            }
            Some(secs) => secs.saturating_mul(1000),
            None => period_hours as u64 * MS_PER_HOUR / max_images_per_period as u64,
        };

        Ok(Self {
            frame_interval_ms: 1000 / frame_rate as u64,
            save_interval_ms,
            allow_list,
        })
    }
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000 / DEFAULT_FRAME_RATE as u64,
            save_interval_ms: DEFAULT_PERIOD_HOURS as u64 * MS_PER_HOUR / DEFAULT_MAX_IMAGES as u64,
            allow_list: ClassAllowList::default(),
        }
    }
}
