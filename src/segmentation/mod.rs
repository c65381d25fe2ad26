pub mod backend;
pub mod intensity_threshold;

pub use backend::SegmentationBackend;
pub use intensity_threshold::{IntensityThresholdBackend, Region};
