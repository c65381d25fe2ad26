use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::intake::VideoHandle;
use crate::pipeline::context::ErrorState;
use crate::pipeline::domain::{AreaSample, CardiacCycleResult, EfResult};
use crate::pipeline::epoch::PipelineEpoch;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Done { result: EfResult },
    Failed { error: ErrorState },
}

/// Immutable record of one finished pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub epoch: PipelineEpoch,
    pub video: VideoHandle,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub frames_total: usize,
    pub frames_segmented: usize,
    pub cycle: Option<CardiacCycleResult>,
    pub area_trace: Vec<AreaSample>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn result(&self) -> Option<&EfResult> {
        match &self.outcome {
            RunOutcome::Done { result } => Some(result),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorState> {
        match &self.outcome {
            RunOutcome::Done { .. } => None,
            RunOutcome::Failed { error } => Some(error),
        }
    }
}

/// Fields of a report collected while the run is still in progress.
#[derive(Debug)]
pub(crate) struct ReportDraft {
    run_id: Uuid,
    epoch: PipelineEpoch,
    video: VideoHandle,
    started_at: DateTime<Utc>,
    pub(crate) frames_total: usize,
    pub(crate) frames_segmented: usize,
    pub(crate) cycle: Option<CardiacCycleResult>,
    pub(crate) area_trace: Vec<AreaSample>,
}

impl ReportDraft {
    pub(crate) fn start(epoch: PipelineEpoch, video: VideoHandle) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            epoch,
            video,
            started_at: Utc::now(),
            frames_total: 0,
            frames_segmented: 0,
            cycle: None,
            area_trace: Vec::new(),
        }
    }

    pub(crate) fn finish(self, outcome: RunOutcome) -> RunReport {
        RunReport {
            run_id: self.run_id,
            epoch: self.epoch,
            video: self.video,
            started_at: self.started_at,
            finished_at: Utc::now(),
            frames_total: self.frames_total,
            frames_segmented: self.frames_segmented,
            cycle: self.cycle,
            area_trace: self.area_trace,
            outcome,
        }
    }
}
