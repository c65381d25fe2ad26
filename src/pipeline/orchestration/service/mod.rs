pub mod instrumented;
pub mod segmentation_service;

pub use instrumented::{Instrumented, InstrumentedLayer};
pub use segmentation_service::{classify_failure, SegmentationService};
