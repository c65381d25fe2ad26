use std::time::Duration;

use thiserror::Error;

use crate::pipeline::context::state::ErrorKind;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Extraction Error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Segmentation Error: {0}")]
    Segmentation(#[from] SegmentationError),
    #[error("Area Error: {0}")]
    Area(#[from] AreaError),
    #[error("Cardiac Cycle Error: {0}")]
    Cycle(#[from] CycleError),
    #[error("Ejection Fraction Error: {0}")]
    Ef(#[from] EfError),
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Pipeline Error: {0}")]
    Pipeline(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("The video produced no frames")]
    NoFrames,
    #[error("Failed to decode video: {0}")]
    DecodeFailure(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::NoFrames => ErrorKind::NoFrames,
            ExtractionError::DecodeFailure(_) => ErrorKind::DecodeFailure,
        }
    }
}

/// Per-frame failure. Absorbed into an `Absent` slot, never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("Segmentation backend failed: {0}")]
    BackendFailure(String),
    #[error("Segmentation backend returned neither a mask nor an error")]
    UnknownFailure,
    #[error("Segmentation timed out after {0:?}")]
    Timeout(Duration),
}

impl SegmentationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SegmentationError::BackendFailure(_) => ErrorKind::BackendFailure,
            SegmentationError::UnknownFailure => ErrorKind::UnknownFailure,
            SegmentationError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AreaError {
    #[error("Invalid mask: {0}")]
    InvalidMask(String),
}

impl AreaError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidMask
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("At least 2 usable masks are required, found {candidates}")]
    InsufficientMasks { candidates: usize },
    #[error("End-diastole (frame {ed_index}) and end-systole (frame {es_index}) do not form a cycle")]
    DegenerateCycle { ed_index: usize, es_index: usize },
}

impl CycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CycleError::InsufficientMasks { .. } => ErrorKind::InsufficientMasks,
            CycleError::DegenerateCycle { .. } => ErrorKind::DegenerateCycle,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EfError {
    #[error("End-diastolic area is zero")]
    DivisionByZero,
    #[error("End-systolic area {es_area} exceeds end-diastolic area {ed_area}")]
    InvalidAreaRelationship { ed_area: u64, es_area: u64 },
}

impl EfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EfError::DivisionByZero => ErrorKind::DivisionByZero,
            EfError::InvalidAreaRelationship { .. } => ErrorKind::InvalidAreaRelationship,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
