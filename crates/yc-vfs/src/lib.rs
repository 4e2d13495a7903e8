//! Persistent storage for yearn
//!
//! Save-state slots and battery RAM, laid out per game id.

pub mod savedata;

pub use savedata::{validate_game_id, write_atomic, SaveStore, SlotInfo};
