// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image-encoding callback handed to the import routine.

use image::{ImageFormat, RgbaImage};

use crate::error::{EngineError, EngineResult};

/// Turns a decoded raster layer into bytes the engine can use as a fill.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, width: u32, height: u32, rgba: Vec<u8>) -> EngineResult<Vec<u8>>;
}

/// Encodes raw RGBA pixels as PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(&self, width: u32, height: u32, rgba: Vec<u8>) -> EngineResult<Vec<u8>> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| {
                EngineError::Call(format!("{width}x{height} RGBA overflows the pixel buffer size"))
            })?;
        let actual = rgba.len();
        let image = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            EngineError::Call(format!(
                "pixel buffer of {actual} bytes does not match {width}x{height} RGBA ({expected} bytes)"
            ))
        })?;

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| EngineError::Call(format!("png encoding failed: {err}")))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_png_signature() {
        let png = PngEncoder.encode(2, 2, vec![255; 16]).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(PngEncoder.encode(4, 4, vec![0; 8]).is_err());
    }

    #[test]
    fn huge_dimensions_are_an_error_not_a_panic() {
        let err = PngEncoder.encode(u32::MAX, u32::MAX, Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Call(_)));
    }
}
