use async_trait::async_trait;

use crate::common::{Frame, SegmentationMask};
use crate::error::SegmentationError;

/// Call contract of a left-ventricle segmentation model.
///
/// `Ok(None)` is a response carrying neither a mask nor an error; the
/// orchestrator records it as `SegmentationError::UnknownFailure`.
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    async fn segment(&self, frame: &Frame) -> Result<Option<SegmentationMask>, SegmentationError>;

    fn name(&self) -> &'static str;
}
