//! Frame timing and the sketch driver.

pub mod clock;
pub mod demo_loop;
pub mod fps;

pub use clock::{FrameClock, FrameTime};
pub use demo_loop::{DemoLoop, LoopState, Sketch};
pub use fps::FpsCounter;
