//! Coordinate mapping between linear byte buffers and 2-D pixel surfaces
//!
//! Every device buffer is a contiguous run of `f32` elements packed four to a
//! pixel (one per RGBA lane, 16 bytes per pixel). This module decides the 2-D
//! shape a buffer occupies on a surface with a fixed maximum width and height:
//! small buffers become a single row, larger buffers wrap at the maximum width
//! and grow downward. A buffer whose last pixel is only partially used is
//! flagged `padded` so transfers can compensate.

use crate::error::{BlasError, Result};

/// Elements packed into a single pixel (RGBA lanes).
pub const FLOATS_PER_PIXEL: usize = 4;

/// Bytes occupied by one fully packed pixel.
pub const BYTES_PER_PIXEL: usize = FLOATS_PER_PIXEL * std::mem::size_of::<f32>();

/// The 2-D pixel footprint of a linear buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceShape {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// True when the byte size does not fill the last pixel exactly
    pub padded: bool,
}

impl SurfaceShape {
    /// Total pixel count of this shape.
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Total lane (element) count of this shape.
    pub fn lanes(&self) -> usize {
        self.pixels() * FLOATS_PER_PIXEL
    }
}

/// Compute the surface shape holding `byte_size` bytes.
///
/// Buffers of up to `max_width` pixels occupy a single row; anything larger
/// is laid out at full width with as many rows as needed. Shapes that would
/// exceed `max_height` rows fail with [`BlasError::DimensionOverflow`].
pub fn shape_for(byte_size: usize, max_width: usize, max_height: usize) -> Result<SurfaceShape> {
    let count = byte_size.div_ceil(BYTES_PER_PIXEL);
    let padded = byte_size % BYTES_PER_PIXEL != 0;

    if count <= max_width {
        return Ok(SurfaceShape {
            width: count,
            height: 1,
            padded,
        });
    }

    let height = count.div_ceil(max_width);
    if height > max_height {
        return Err(BlasError::DimensionOverflow(format!(
            "{byte_size} bytes need {height} rows, surface has {max_height}"
        )));
    }

    Ok(SurfaceShape {
        width: max_width,
        height,
        padded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let s = shape_for(8 * 16, 16, 16).unwrap();
        assert_eq!((s.width, s.height), (8, 1));
        assert!(!s.padded);
    }

    #[test]
    fn test_padded_flag() {
        // 5 floats = 20 bytes: two pixels, last one half empty
        let s = shape_for(20, 16, 16).unwrap();
        assert_eq!((s.width, s.height), (2, 1));
        assert!(s.padded);
    }

    #[test]
    fn test_wraps_at_max_width() {
        // 40 pixels on a 16-wide surface: 16x3
        let s = shape_for(40 * 16, 16, 16).unwrap();
        assert_eq!((s.width, s.height), (16, 3));
    }

    #[test]
    fn test_exact_capacity_fits() {
        let s = shape_for(16 * 16 * 16, 16, 16).unwrap();
        assert_eq!((s.width, s.height), (16, 16));
    }

    #[test]
    fn test_overflow() {
        let err = shape_for(16 * 16 * 16 + 1, 16, 16).unwrap_err();
        assert!(matches!(err, BlasError::DimensionOverflow(_)));
    }

    #[test]
    fn test_shape_covers_request() {
        for byte_size in 1..=(16 * 16 * 16) {
            let s = shape_for(byte_size, 16, 16).unwrap();
            assert!(s.pixels() * BYTES_PER_PIXEL >= byte_size);
            assert!(s.width <= 16 && s.height <= 16);
        }
    }
}
