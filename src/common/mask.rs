use image::{GrayImage, Luma};
use std::fmt;
use std::sync::Arc;

use crate::error::AreaError;

/// Per-frame left-ventricle mask as returned by a segmentation backend.
///
/// Pixels are 8-bit labels or scaled probabilities; `AreaComputer` decides
/// which values count as foreground.
#[derive(Clone)]
pub struct SegmentationMask {
    pixels: Arc<GrayImage>,
}

impl SegmentationMask {
    pub fn new(pixels: GrayImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Builds a mask from a row-major byte buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AreaError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(AreaError::InvalidMask(format!(
                "buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        GrayImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| AreaError::InvalidMask("buffer does not fit dimensions".to_string()))
    }

    /// Builds a mask from a row-major probability matte (0.0 = background, 1.0 = foreground).
    pub fn from_probabilities(width: u32, height: u32, matte: &[f32]) -> Result<Self, AreaError> {
        if let Some(bad) = matte.iter().find(|p| !p.is_finite()) {
            return Err(AreaError::InvalidMask(format!(
                "matte contains non-finite probability {}",
                bad
            )));
        }
        let data = matte
            .iter()
            .map(|p| (p.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        Self::from_raw(width, height, data)
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(GrayImage::from_pixel(width, height, Luma([value])))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }
}

impl fmt::Debug for SegmentationMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationMask")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
