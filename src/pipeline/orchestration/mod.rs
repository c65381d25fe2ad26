pub mod aggregation;
pub mod segmentation_orchestrator;
pub mod service;

pub use aggregation::{Aggregation, SegmentationEvent, SegmentationOutcome, SegmentationProgress};
pub use segmentation_orchestrator::{
    SegmentationOrchestrator, SegmentationOrchestratorBuilder, SegmentationRun, SegmentationStack,
};
