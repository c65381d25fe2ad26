pub mod frame;
pub mod mask;

pub use frame::{Frame, FrameBatch};
pub use mask::SegmentationMask;
