//! Synthetic frames for link bring-up without a camera

use xrlink_core::XrlinkResult;

use crate::{Frame, PixelFormat};

/// Side-by-side stereo test card whose gradient scrolls with `tick`.
///
/// The left half scrolls right and the right half scrolls left, so a viewer
/// can tell the eyes apart and see dropped frames as jumps.
pub fn stereo_test_pattern(width: u32, height: u32, tick: u64) -> XrlinkResult<Frame> {
    let half = (width / 2).max(1);
    let shift = (tick % 256) as u32;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);

    for y in 0..height {
        for x in 0..width {
            let (local_x, dir_shift) = if x < half {
                (x, shift)
            } else {
                (x - half, 256 - shift)
            };
            let r = ((local_x * 255 / half + dir_shift) % 256) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = if x < half { 64 } else { 192 };
            pixels.extend_from_slice(&[r, g, b]);
        }
    }

    Frame::new(width, height, PixelFormat::Rgb8, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_dimensions() {
        let frame = stereo_test_pattern(64, 24, 3).unwrap();
        assert!(frame.has_size(64, 24));
        assert_eq!(frame.format(), PixelFormat::Rgb8);
    }

    #[test]
    fn test_pattern_changes_with_tick() {
        let a = stereo_test_pattern(32, 8, 0).unwrap();
        let b = stereo_test_pattern(32, 8, 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_eyes_are_distinguishable() {
        let frame = stereo_test_pattern(4, 1, 0).unwrap();
        assert_eq!(frame.pixels()[2], 64);
        assert_eq!(frame.pixels()[3 * 2 + 2], 192);
    }
}
