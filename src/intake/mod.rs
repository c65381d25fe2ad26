pub mod frame_source;
pub mod image_sequence;

pub use frame_source::{FrameSource, VideoHandle};
pub use image_sequence::ImageSequenceSource;
