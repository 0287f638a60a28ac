use anyhow::Result;

use super::{FrameClock, FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

/// Endless generated frames for `stub://` urls.
///
/// The pixel pattern shifts every frame and the "scene" changes every 50
/// frames, so consecutive frames are never identical.
pub struct SyntheticSource {
    config: SourceConfig,
    clock: FrameClock,
    frame_count: u64,
    scene_state: u8,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        let clock = FrameClock::new(config.target_fps, config.realtime);
        Self {
            config,
            clock,
            frame_count: 0,
            scene_state: 0,
            connected: false,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{} @ {} fps)",
            self.config.url,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let timestamp_ms = self.clock.tick()?;
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_rgb(pixels, self.config.width, self.config.height, timestamp_ms).map(Some)
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_skipped: 0,
            url: self.config.url.clone(),
        }
    }
}
