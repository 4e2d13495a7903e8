//! Error types for the yearn frontend

use thiserror::Error;

/// Main error type for the frontend
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Rewind error: {0}")]
    Rewind(#[from] RewindError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),
}

/// Errors raised by the libretro bridge
#[derive(Error, Debug)]
pub enum CoreError {
    /// No registered core handles the requested system or id.
    #[error("No core registered for '{0}'")]
    NotFound(String),

    /// The core rejected the content, or the content could not be read.
    #[error("Failed to load content: {0}")]
    Load(String),

    /// An operation was invoked outside the states where it is valid.
    #[error("Cannot {operation} while core is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// `retro_serialize` / `retro_unserialize` failed, or the core has no state.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Unsupported by core: {0}")]
    Unsupported(String),
}

/// Persisted state errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid game id: {0:?}")]
    InvalidGameId(String),

    #[error("No save state in slot {slot} for {game_id}")]
    SlotNotFound { game_id: String, slot: u32 },

    #[error("{path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rewind buffer errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RewindError {
    #[error("Truncated run token at offset {0}")]
    TruncatedToken(usize),

    #[error("Zero-length run at offset {0}")]
    EmptyRun(usize),
}

/// Result type alias for frontend operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidState {
            operation: "run",
            state: "uninitialized".to_string(),
        };
        assert_eq!(format!("{}", err), "Cannot run while core is uninitialized");

        let err = StorageError::SlotNotFound {
            game_id: "abc".to_string(),
            slot: 3,
        };
        assert_eq!(format!("{}", err), "No save state in slot 3 for abc");
    }

    #[test]
    fn test_error_conversion() {
        let core_err = CoreError::NotFound("snes".to_string());
        let emu_err: EmulatorError = core_err.into();
        assert!(matches!(emu_err, EmulatorError::Core(CoreError::NotFound(_))));

        let rewind_err = RewindError::EmptyRun(4);
        let emu_err: EmulatorError = rewind_err.into();
        assert!(matches!(emu_err, EmulatorError::Rewind(_)));
    }
}
