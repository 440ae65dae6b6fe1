pub mod biquad;
pub mod error;
pub mod frame_queue;
pub mod types;

pub use biquad::{Biquad, FilterKind};
pub use error::DspError;
pub use frame_queue::{frame_queue, FrameConsumer, FrameProducer};
pub use types::FilteredFrame;
