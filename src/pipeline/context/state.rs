use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::domain::ejection_fraction::EfResult;
use crate::pipeline::orchestration::aggregation::SegmentationProgress;

/// Pipeline stage that can fail a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extracting,
    Segmenting,
    Analyzing,
    EfEngine,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "Extracting",
            Stage::Segmenting => "Segmenting",
            Stage::Analyzing => "Analyzing",
            Stage::EfEngine => "EfEngine",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NoFrames,
    DecodeFailure,
    BackendFailure,
    UnknownFailure,
    Timeout,
    NoMasksSegmented,
    InsufficientMasks,
    InvalidMask,
    DegenerateCycle,
    DivisionByZero,
    InvalidAreaRelationship,
}

/// Terminal failure of one run, handed to the presenter as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorState {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorState {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({:?}): {}", self.stage, self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Extracting,
    Segmenting,
    Analyzing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Extracting => "Extracting",
            Phase::Segmenting => "Segmenting",
            Phase::Analyzing => "Analyzing",
            Phase::Done => "Done",
            Phase::Failed => "Failed",
        }
    }
}

/// Controller state for the active epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Segmenting(SegmentationProgress),
    Analyzing,
    Done(EfResult),
    Failed(ErrorState),
}

impl PipelineState {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineState::Idle => Phase::Idle,
            PipelineState::Extracting => Phase::Extracting,
            PipelineState::Segmenting(_) => Phase::Segmenting,
            PipelineState::Analyzing => Phase::Analyzing,
            PipelineState::Done(_) => Phase::Done,
            PipelineState::Failed(_) => Phase::Failed,
        }
    }

    /// `Done` and `Failed` can only be left by selecting a new video.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done(_) | PipelineState::Failed(_))
    }
}
