//! Frame sources.
//!
//! - `stub://<name>`: synthetic frames, for tests and dry runs
//! - `dir://<path>` or a plain local path: every image in a directory, in
//!   file-name order
//!
//! Sources are pulled by the processing loop, so there is never more than one
//! pending frame: the loop always receives the latest frame available.

mod directory;
mod synthetic;

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

pub use directory::DirectorySource;
pub use synthetic::SyntheticSource;

use crate::frame::{now_ms, Frame};

pub const STUB_SCHEME: &str = "stub://";
pub const DIR_SCHEME: &str = "dir://";

/// Configuration shared by all sources.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub url: String,
    /// Frames per second delivered to the loop.
    pub target_fps: u32,
    /// Size of synthetic frames. Directory sources use each image's own size.
    pub width: u32,
    pub height: u32,
    /// When true, sources sleep to hold `target_fps` and stamp frames with the
    /// wall clock. Otherwise frames come back immediately on a virtual clock
    /// that advances by one frame interval per frame.
    pub realtime: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            realtime: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_skipped: u64,
    pub url: String,
}

pub trait FrameSource {
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once a finite source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Open the source named by `config.url`.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.target_fps == 0 {
        return Err(anyhow!("source target fps must be greater than zero"));
    }
    let url = config.url.trim();
    if url.starts_with(STUB_SCHEME) {
        Ok(Box::new(SyntheticSource::new(config)))
    } else if url.starts_with(DIR_SCHEME) || !url.contains("://") {
        Ok(Box::new(DirectorySource::new(config)?))
    } else {
        Err(anyhow!("unsupported source url: {}", config.url))
    }
}

/// Timestamps and pacing for a source.
#[derive(Debug)]
pub(crate) struct FrameClock {
    interval: Duration,
    realtime: bool,
    virtual_ms: Option<u64>,
    last_emit: Option<Instant>,
}

impl FrameClock {
    pub(crate) fn new(target_fps: u32, realtime: bool) -> Self {
        Self {
            interval: Duration::from_millis(1000 / target_fps.max(1) as u64),
            realtime,
            virtual_ms: None,
            last_emit: None,
        }
    }

    /// Wait for the next slot if pacing, then return the frame timestamp.
    pub(crate) fn tick(&mut self) -> Result<u64> {
        if !self.realtime {
            let next = match self.virtual_ms {
                Some(prev) => prev + self.interval.as_millis() as u64,
                None => now_ms()?,
            };
            self.virtual_ms = Some(next);
            return Ok(next);
        }

        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
        now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_steps_by_interval() -> Result<()> {
        let mut clock = FrameClock::new(4, false);
        let a = clock.tick()?;
        let b = clock.tick()?;
        let c = clock.tick()?;
        assert_eq!((b - a, c - b), (250, 250));
        Ok(())
    }

    #[test]
    fn rejects_remote_urls_and_zero_fps() {
        let remote = SourceConfig {
            url: "rtsp://10.0.0.2/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(open_source(remote).is_err());

        let zero = SourceConfig {
            target_fps: 0,
            ..SourceConfig::default()
        };
        assert!(open_source(zero).is_err());
    }
}
