//! Raw frame as produced by the camera layer

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, RgbImage, RgbaImage};

use xrlink_core::{XrlinkError, XrlinkResult};

/// Pixel layout of a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// An uncompressed image with its declared dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a pixel buffer; its length must match the declared dimensions
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> XrlinkResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if width == 0 || height == 0 {
            return Err(XrlinkError::InvalidConfig(format!(
                "frame dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if pixels.len() != expected {
            return Err(XrlinkError::BufferTooShort {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Solid-color RGB frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> XrlinkResult<Self> {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(width, height, PixelFormat::Rgb8, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn has_size(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Return a copy scaled to `width`×`height`, or `self` unchanged when it
    /// already has that size
    pub fn resized(self, width: u32, height: u32) -> XrlinkResult<Frame> {
        if self.has_size(width, height) {
            return Ok(self);
        }
        if width == 0 || height == 0 {
            return Err(XrlinkError::InvalidConfig(format!(
                "target dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let pixels = match self.format {
            PixelFormat::Gray8 => {
                resize_buffer::<image::Luma<u8>>(self.width, self.height, self.pixels, width, height)?
            }
            PixelFormat::Rgb8 => {
                resize_buffer::<image::Rgb<u8>>(self.width, self.height, self.pixels, width, height)?
            }
            PixelFormat::Rgba8 => {
                resize_buffer::<image::Rgba<u8>>(self.width, self.height, self.pixels, width, height)?
            }
        };

        Frame::new(width, height, self.format, pixels)
    }

    /// Drop alpha; JPEG has no use for it
    pub(crate) fn into_jpeg_source(self) -> XrlinkResult<Frame> {
        match self.format {
            PixelFormat::Gray8 | PixelFormat::Rgb8 => Ok(self),
            PixelFormat::Rgba8 => {
                let rgba: RgbaImage = ImageBuffer::from_raw(self.width, self.height, self.pixels)
                    .ok_or_else(|| XrlinkError::EncodeFailed("rgba buffer size mismatch".into()))?;
                let rgb: RgbImage = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
                Frame::new(self.width, self.height, PixelFormat::Rgb8, rgb.into_raw())
            }
        }
    }
}

fn resize_buffer<P>(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    target_width: u32,
    target_height: u32,
) -> XrlinkResult<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(width, height, pixels)
        .ok_or_else(|| XrlinkError::EncodeFailed("pixel buffer size mismatch".into()))?;
    Ok(imageops::resize(&src, target_width, target_height, FilterType::Triangle).into_raw())
}
