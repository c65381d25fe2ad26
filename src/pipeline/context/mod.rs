pub mod mask_batch;
pub mod metrics;
pub mod state;

pub use mask_batch::{MaskBatch, MaskSlot, SlotWrite};
pub use metrics::SegmentationMetrics;
pub use state::{ErrorKind, ErrorState, Phase, PipelineState, Stage};
