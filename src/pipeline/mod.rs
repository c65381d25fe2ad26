pub mod context;
pub mod domain;
pub mod epoch;
pub mod orchestration;
pub mod report;

pub use context::{ErrorKind, ErrorState, MaskBatch, MaskSlot, Phase, PipelineState, Stage};
pub use domain::{AreaComputer, CardiacCycleAnalyzer, CardiacCycleResult, EfEngine, EfResult};
pub use epoch::{EpochClock, PipelineEpoch};
pub use orchestration::{Aggregation, SegmentationOrchestrator, SegmentationProgress};
pub use report::{RunOutcome, RunReport};
