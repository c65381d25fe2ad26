use async_trait::async_trait;
use image::{GrayImage, Luma};

use crate::common::{Frame, SegmentationMask};
use crate::error::SegmentationError;
use crate::segmentation::backend::SegmentationBackend;

/// Rectangle of the frame the backend is allowed to label, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

/// Non-neural backend: labels dark (blood pool) pixels as left ventricle.
///
/// Useful to run the pipeline end to end without a model.
#[derive(Debug, Clone)]
pub struct IntensityThresholdBackend {
    max_intensity: u8,
    region: Option<Region>,
}

impl IntensityThresholdBackend {
    pub fn new(max_intensity: u8) -> Self {
        Self {
            max_intensity,
            region: None,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    fn label(&self, frame: &Frame) -> GrayImage {
        let luma = frame.image().to_luma8();
        GrayImage::from_fn(luma.width(), luma.height(), |x, y| {
            let inside = self.region.map_or(true, |region| region.contains(x, y));
            if inside && luma.get_pixel(x, y).0[0] <= self.max_intensity {
                Luma([u8::MAX])
            } else {
                Luma([0])
            }
        })
    }
}

#[async_trait]
impl SegmentationBackend for IntensityThresholdBackend {
    async fn segment(&self, frame: &Frame) -> Result<Option<SegmentationMask>, SegmentationError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(SegmentationError::BackendFailure(format!(
                "frame {} has no pixels",
                frame.index()
            )));
        }

        let backend = self.clone();
        let frame = frame.clone();
        let labels = tokio::task::spawn_blocking(move || backend.label(&frame))
            .await
            .map_err(|e| SegmentationError::BackendFailure(e.to_string()))?;
        Ok(Some(SegmentationMask::new(labels)))
    }

    fn name(&self) -> &'static str {
        "intensity-threshold"
    }
}
