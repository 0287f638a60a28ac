use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameClock, FrameSource, SourceConfig, SourceStats, DIR_SCHEME};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Plays back the images of a local directory, sorted by file name.
///
/// Files that fail to decode are skipped with a warning.
pub struct DirectorySource {
    config: SourceConfig,
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    clock: FrameClock,
    frame_count: u64,
    skipped: u64,
    last_error: Option<String>,
}

impl DirectorySource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let raw = config.url.trim();
        let dir = PathBuf::from(raw.strip_prefix(DIR_SCHEME).unwrap_or(raw));
        if dir.as_os_str().is_empty() {
            return Err(anyhow!("directory source requires a path"));
        }
        let clock = FrameClock::new(config.target_fps, config.realtime);
        Ok(Self {
            config,
            dir,
            files: Vec::new(),
            next: 0,
            clock,
            frame_count: 0,
            skipped: 0,
            last_error: None,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.next)
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to read source dir {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<()> {
        self.files = Self::list_images(&self.dir)?;
        self.next = 0;
        log::info!(
            "DirectorySource: connected to {} ({} images)",
            self.dir.display(),
            self.files.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(path) = self.files.get(self.next) {
            self.next += 1;
            match image::open(path) {
                Ok(img) => {
                    let timestamp_ms = self.clock.tick()?;
                    self.frame_count += 1;
                    self.last_error = None;
                    return Ok(Some(Frame::new(img.to_rgb8(), timestamp_ms)));
                }
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("skipping {}: {}", path.display(), e);
                    self.last_error = Some(e.to_string());
                }
            }
        }
        Ok(None)
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_skipped: self.skipped,
            url: self.config.url.clone(),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
