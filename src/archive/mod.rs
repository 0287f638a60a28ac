//! Persisted capture artifacts.
//!
//! A saved hit is a JPEG resized to the reference resolution plus a sidecar
//! `.txt` with one label line per detection. Both files are staged as
//! synced temp files before either is renamed into place, so a failed save
//! never leaves an image without its labels.

pub mod format;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};

use crate::detect::Detection;
use crate::frame::Frame;

pub use format::{format_float, label_line, label_lines, parse_label_line, parse_label_lines};

pub const DEFAULT_SAVE_DIR: &str = "captures";
pub const DEFAULT_REFERENCE_SIZE: u32 = 640;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Destination for saved hits.
pub trait PersistenceSink {
    fn save(&mut self, frame: &Frame, detections: &[Detection]) -> Result<SavedArtifact>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedArtifact {
    pub image_path: PathBuf,
    pub labels_path: PathBuf,
    pub detections: usize,
}

#[derive(Clone, Debug)]
pub struct DirectorySinkConfig {
    pub root: PathBuf,
    /// Saved images are resized to `reference_size` x `reference_size`.
    pub reference_size: u32,
    pub jpeg_quality: u8,
}

impl Default for DirectorySinkConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_SAVE_DIR),
            reference_size: DEFAULT_REFERENCE_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Writes artifacts into a local directory.
pub struct DirectorySink {
    cfg: DirectorySinkConfig,
}

impl DirectorySink {
    pub fn new(cfg: DirectorySinkConfig) -> Result<Self> {
        if cfg.reference_size == 0 {
            return Err(anyhow!("reference size must be greater than zero"));
        }
        if !(1..=100).contains(&cfg.jpeg_quality) {
            return Err(anyhow!("jpeg quality must be within 1..=100"));
        }
        fs::create_dir_all(&cfg.root)
            .with_context(|| format!("failed to create save dir {}", cfg.root.display()))?;
        Ok(Self { cfg })
    }

    pub fn root(&self) -> &Path {
        &self.cfg.root
    }

    /// `YYYYMMDD_HHMMSS` (UTC), with `_N` appended until the name is free.
    fn artifact_stem(&self, timestamp_ms: u64) -> Result<String> {
        let millis = i64::try_from(timestamp_ms)
            .map_err(|_| anyhow!("timestamp {} exceeds i64 range", timestamp_ms))?;
        let when = chrono::DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("timestamp {} out of range", timestamp_ms))?;
        let base = when.format("%Y%m%d_%H%M%S").to_string();

        let mut stem = base.clone();
        let mut n = 1u32;
        while self.image_path(&stem).exists() || self.labels_path(&stem).exists() {
            stem = format!("{}_{}", base, n);
            n += 1;
        }
        Ok(stem)
    }

    fn image_path(&self, stem: &str) -> PathBuf {
        self.cfg.root.join(format!("{}.jpg", stem))
    }

    fn labels_path(&self, stem: &str) -> PathBuf {
        self.cfg.root.join(format!("{}.txt", stem))
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>> {
        let size = self.cfg.reference_size;
        let resized = imageops::resize(frame.image(), size, size, FilterType::Triangle);
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.cfg.jpeg_quality)
            .encode_image(&resized)
            .context("failed to encode JPEG")?;
        Ok(encoded)
    }
}

impl PersistenceSink for DirectorySink {
    fn save(&mut self, frame: &Frame, detections: &[Detection]) -> Result<SavedArtifact> {
        let stem = self.artifact_stem(frame.timestamp_ms)?;
        let image_path = self.image_path(&stem);
        let labels_path = self.labels_path(&stem);

        let jpeg = self.encode_jpeg(frame)?;
        let image_tmp = tmp_path(&image_path);
        let labels_tmp = tmp_path(&labels_path);

        // Stage both files before either name becomes visible.
        let staged = write_synced(&image_tmp, &jpeg)
            .with_context(|| format!("failed to write {}", image_path.display()))
            .and_then(|()| {
                write_synced(&labels_tmp, label_lines(detections).as_bytes())
                    .with_context(|| format!("failed to write {}", labels_path.display()))
            });
        if let Err(e) = staged {
            discard(&image_tmp);
            discard(&labels_tmp);
            return Err(e);
        }

        if let Err(e) = fs::rename(&image_tmp, &image_path) {
            discard(&image_tmp);
            discard(&labels_tmp);
            return Err(e).with_context(|| format!("failed to write {}", image_path.display()));
        }
        if let Err(e) = fs::rename(&labels_tmp, &labels_path) {
            discard(&labels_tmp);
            discard(&image_path);
            return Err(e).with_context(|| format!("failed to write {}", labels_path.display()));
        }

        Ok(SavedArtifact {
            image_path,
            labels_path,
            detections: detections.len(),
        })
    }
}

/// `20231114_221320.jpg` -> `20231114_221320.jpg.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(data)?;
    file.flush()?;
    file.get_ref().sync_all()?;
    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
