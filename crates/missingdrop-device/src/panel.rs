//! In-memory RGB24 panel, the host stand-in for the LED matrix driver.

use missingdrop_common::{decode_frame, FrameError, Rgb24};

use crate::link::FrameSink;

/// Shown until the first frame arrives, so a powered panel is visible.
const STARTUP_COLOR: Rgb24 = Rgb24 { r: 0, g: 0, b: 30 };

/// Back buffer the decoder writes into, swapped to the front on success.
#[derive(Debug, Clone)]
pub struct PanelBuffer {
    width: usize,
    height: usize,
    front: Vec<Rgb24>,
    back: Vec<Rgb24>,
    frame_count: u64,
}

impl PanelBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            front: vec![STARTUP_COLOR; width * height],
            back: vec![Rgb24::BLACK; width * height],
            frame_count: 0,
        }
    }

    /// Pixel of the currently shown frame, row-major.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb24> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.front.get(y * self.width + x).copied()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSink for PanelBuffer {
    fn present(&mut self, frame: &[u8]) -> Result<(), FrameError> {
        decode_frame(frame, &mut self.back)?;
        std::mem::swap(&mut self.front, &mut self.back);
        self.frame_count += 1;
        if self.frame_count % 300 == 0 {
            tracing::debug!(frames = self.frame_count, "Panel frames shown");
        }
        Ok(())
    }
}
