use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::pipeline::epoch::PipelineEpoch;

/// One sampled video frame. Cloning shares the pixel buffer.
#[derive(Clone)]
pub struct Frame {
    index: usize,
    image: Arc<DynamicImage>,
    timestamp: Duration,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(index: usize, image: DynamicImage, timestamp: Duration) -> Self {
        Self {
            index,
            image: Arc::new(image),
            timestamp,
            frame_id: Uuid::new_v4(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Offset of this frame from the start of the video.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("timestamp", &self.timestamp)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

/// Ordered frames of one pipeline run, tagged with the epoch that produced them.
///
/// Frame `i` of the batch always reports `index() == i`.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    epoch: PipelineEpoch,
    frames: Arc<[Frame]>,
}

impl FrameBatch {
    pub fn new(epoch: PipelineEpoch, frames: Vec<Frame>) -> Self {
        let frames: Vec<Frame> = frames
            .into_iter()
            .enumerate()
            .map(|(index, frame)| frame.with_index(index))
            .collect();
        Self {
            epoch,
            frames: frames.into(),
        }
    }

    pub fn epoch(&self) -> PipelineEpoch {
        self.epoch
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
