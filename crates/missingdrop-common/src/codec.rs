//! RGB565 frame codec.
//!
//! Frames are row-major, two bytes per pixel, most significant byte first.

use serde::{Deserialize, Serialize};

use crate::errors::FrameError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb24 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb24 {
    pub const BLACK: Rgb24 = Rgb24 { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Number of bytes in a `width × height` RGB565 frame.
pub fn frame_len(width: usize, height: usize) -> usize {
    width * height * 2
}

/// Pack a 24-bit color into 5/6/5 bits, dropping the low bits of each channel.
pub fn pack_rgb565(color: Rgb24) -> u16 {
    ((color.r as u16 >> 3) << 11) | ((color.g as u16 >> 2) << 5) | (color.b as u16 >> 3)
}

/// Expand a packed sample. The dropped low bits come back as zero, so
/// full-scale red (31) unpacks to 248, not 255.
pub fn unpack_rgb565(value: u16) -> Rgb24 {
    Rgb24 {
        r: (((value >> 11) & 0x1f) << 3) as u8,
        g: (((value >> 5) & 0x3f) << 2) as u8,
        b: ((value & 0x1f) << 3) as u8,
    }
}

/// Decode a whole frame into `out`. The byte length must be exactly
/// `out.len() * 2`.
pub fn decode_frame(bytes: &[u8], out: &mut [Rgb24]) -> Result<(), FrameError> {
    let expected = out.len() * 2;
    if bytes.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    for (pixel, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *pixel = unpack_rgb565(u16::from_be_bytes([pair[0], pair[1]]));
    }
    Ok(())
}

pub fn encode_frame(pixels: &[Rgb24]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(pixels.len() * 2);
    for pixel in pixels {
        bytes.extend_from_slice(&pack_rgb565(*pixel).to_be_bytes());
    }
    bytes
}
