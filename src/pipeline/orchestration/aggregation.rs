use serde::{Deserialize, Serialize};

use crate::pipeline::context::{MaskBatch, SegmentationMetrics};
use crate::pipeline::epoch::PipelineEpoch;

/// Running "N of M frames segmented" count for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationProgress {
    pub epoch: PipelineEpoch,
    pub segmented: usize,
    pub failed: usize,
    pub total: usize,
}

impl SegmentationProgress {
    pub fn started(epoch: PipelineEpoch, total: usize) -> Self {
        Self {
            epoch,
            segmented: 0,
            failed: 0,
            total,
        }
    }

    pub fn completed(&self) -> usize {
        self.segmented + self.failed
    }
}

/// Terminal summary emitted once every dispatched frame has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    AllSucceeded,
    PartialFailure { succeeded: usize, total: usize },
    AllFailed,
}

impl Aggregation {
    /// An empty submission counts as `AllSucceeded`.
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            Aggregation::AllSucceeded
        } else if succeeded == 0 {
            Aggregation::AllFailed
        } else {
            Aggregation::PartialFailure { succeeded, total }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    pub batch: MaskBatch,
    pub aggregation: Aggregation,
    pub metrics: SegmentationMetrics,
}

impl SegmentationOutcome {
    pub fn epoch(&self) -> PipelineEpoch {
        self.batch.epoch()
    }
}

#[derive(Debug, Clone)]
pub enum SegmentationEvent {
    Progress(SegmentationProgress),
    Finished(SegmentationOutcome),
}
