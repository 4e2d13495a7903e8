//! Core types for the yearn libretro frontend
//!
//! This crate provides the foundational types, error handling,
//! configuration, logging and frame pacing shared by the other crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod pacing;

pub use config::Config;
pub use error::{CoreError, EmulatorError, Result, RewindError, StorageError};
pub use pacing::FramePacer;
