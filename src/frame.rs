//! Decoded frames as they arrive from a source.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// One decoded RGB frame and its capture time.
///
/// Frames are moved, not cloned, through the pipeline: a dropped frame is
/// released immediately and a hit frame is moved into the capture cache.
#[derive(Debug)]
pub struct Frame {
    image: RgbImage,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp_ms: u64) -> Self {
        Self {
            image,
            timestamp_ms,
        }
    }

    /// Wrap packed RGB24 bytes.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("invalid RGB buffer for {}x{}", width, height))?;
        Ok(Self::new(image, timestamp_ms))
    }

    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], timestamp_ms: u64) -> Self {
        Self::new(
            RgbImage::from_pixel(width, height, image::Rgb(rgb)),
            timestamp_ms,
        )
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> Result<u64> {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| anyhow!("system clock before Unix epoch: {}", e))?;
    u64::try_from(elapsed.as_millis()).map_err(|_| anyhow!("timestamp exceeds u64 range"))
}
