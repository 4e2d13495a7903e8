//! libretro bridge for yearn
//!
//! This crate hosts libretro cores behind a uniform interface:
//! - Core registry populated at link time
//! - Core adapter with an explicit lifecycle state machine
//! - Callback routing for video, audio, input and environment requests
//! - A built-in test pattern core

pub mod adapter;
pub mod audio;
mod context;
pub mod cores;
pub mod environment;
pub mod input;
pub mod registry;
pub mod test_pattern;
pub mod video;

pub use adapter::{AdapterState, CoreAdapter, CoreInfo, MemoryKind, Region};
pub use audio::{AudioChunk, AudioQueue, AudioSink};
pub use context::FrameOutput;
pub use environment::EnvironmentConfig;
pub use input::{
    device_id, Axis, Button, InputSnapshot, InputState, JoypadButtons, Stick, MAX_PORTS,
};
pub use registry::{CoreDescriptor, CoreRegistry, System};
pub use video::{AvInfo, Geometry, LatestFrame, PixelFormat, Timing, VideoFrame, VideoSink};
