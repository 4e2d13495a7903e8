//! Rewind support for yearn
//!
//! Periodic save states are kept in a bounded, RLE-compressed history that
//! the session can walk backwards and forwards.

pub mod history;
pub mod rle;

pub use history::{Encoding, RewindManager, Snapshot};
