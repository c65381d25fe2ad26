use serde::Serialize;

use crate::common::SegmentationMask;
use crate::error::AreaError;

pub const DEFAULT_FOREGROUND_THRESHOLD: u8 = 127;

/// Converts a mask into a left-ventricle pixel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaComputer {
    threshold: u8,
}

impl Default for AreaComputer {
    fn default() -> Self {
        Self::new(DEFAULT_FOREGROUND_THRESHOLD)
    }
}

impl AreaComputer {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Counts pixels strictly above the threshold.
    ///
    /// A mask with no foreground is a successful area of `0`; whether zero is
    /// usable is up to the caller.
    pub fn compute_area(&self, mask: &SegmentationMask) -> Result<u64, AreaError> {
        let (width, height) = (mask.width(), mask.height());
        if width == 0 || height == 0 {
            return Err(AreaError::InvalidMask(format!(
                "mask has empty dimensions {}x{}",
                width, height
            )));
        }

        let pixels = mask.pixels();
        if pixels.as_raw().len() != width as usize * height as usize {
            return Err(AreaError::InvalidMask(
                "pixel buffer does not match mask dimensions".to_string(),
            ));
        }

        let area = pixels
            .as_raw()
            .iter()
            .filter(|&&value| value > self.threshold)
            .count();
        Ok(area as u64)
    }
}

/// Area of one frame's mask, or why it could not be measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AreaSample {
    Valid { frame_index: usize, area: u64 },
    Invalid { frame_index: usize, reason: String },
}

impl AreaSample {
    pub fn frame_index(&self) -> usize {
        match self {
            AreaSample::Valid { frame_index, .. } | AreaSample::Invalid { frame_index, .. } => {
                *frame_index
            }
        }
    }

    pub fn area(&self) -> Option<u64> {
        match self {
            AreaSample::Valid { area, .. } => Some(*area),
            AreaSample::Invalid { .. } => None,
        }
    }
}
