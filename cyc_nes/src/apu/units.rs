//! Clocked building blocks shared by the channels.

mod divider;
mod envelope;
mod frame;
mod lencounter;
mod sweep;

pub use divider::Divider;
pub use envelope::Envelope;
pub use frame::{FrameCounter, Step};
pub use lencounter::LengthCounter;
pub use sweep::Sweep;
