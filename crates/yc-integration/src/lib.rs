//! Session layer for the yearn frontend
//!
//! This crate ties the core adapter, save storage and rewind history into
//! a single game session driven by the host's clock.

pub mod game;
pub mod session;

pub use game::{game_id, Game};
pub use session::{SessionManager, AUTO_SAVE_SLOT};
