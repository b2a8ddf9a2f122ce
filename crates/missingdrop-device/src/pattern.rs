//! Moving test pattern for producer mode.

use bytes::Bytes;
use missingdrop_common::{encode_frame, Rgb24};

/// Diagonal color bands that shift by one pixel per frame.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: usize,
    height: usize,
    phase: usize,
    pixels: Vec<Rgb24>,
}

impl TestPattern {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            phase: 0,
            pixels: vec![Rgb24::BLACK; width * height],
        }
    }

    /// Render the next frame as RGB565 wire bytes.
    pub fn next_frame(&mut self) -> Bytes {
        let span = (self.width + self.height).max(1);
        for y in 0..self.height {
            for x in 0..self.width {
                let t = (x + y + self.phase) % span;
                self.pixels[y * self.width + x] = band(t * 768 / span);
            }
        }
        self.phase = (self.phase + 1) % span;
        Bytes::from(encode_frame(&self.pixels))
    }
}

/// Red → green → blue ramp over `0..768`.
fn band(v: usize) -> Rgb24 {
    let step = (v % 256) as u8;
    match v / 256 {
        0 => Rgb24::new(255 - step, step, 0),
        1 => Rgb24::new(0, 255 - step, step),
        _ => Rgb24::new(step, 0, 255 - step),
    }
}
