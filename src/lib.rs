pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod intake;
pub mod pipeline;
pub mod presenter;
pub mod segmentation;

#[cfg(test)]
mod test_support;

pub use config::Configuration;
pub use coordinator::{PipelineController, PipelineControllerBuilder, RunHandle};
pub use error::{AppError, AreaError, ConfigError, CycleError, EfError, ExtractionError, SegmentationError};
pub use intake::{FrameSource, VideoHandle};
pub use presenter::{EjectionFractionDisplay, Presenter, PresenterEvent};
pub use segmentation::SegmentationBackend;
