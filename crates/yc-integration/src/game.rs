//! Game identification
//!
//! A game is keyed by a hash of its ROM contents, so save slots follow the
//! content rather than the file name.

use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use yc_core::{CoreError, EmulatorError, Result};
use yc_libretro::System;

/// Hex digits of the SHA-1 kept in a game id
const ID_LEN: usize = 16;

/// A ROM on disk, identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// First 16 hex digits of the ROM's SHA-1
    pub id: String,
    /// File stem, for display
    pub title: String,
    pub path: PathBuf,
    pub system: System,
    /// ROM size in bytes
    pub size: u64,
}

impl Game {
    /// Identify a ROM, inferring the system from its extension
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let system = System::from_extension(&ext).ok_or_else(|| {
            CoreError::NotFound(format!("system for {:?} files", ext))
        })?;
        Self::open_as(path, system)
    }

    /// Identify a ROM for an explicit system
    pub fn open_as<P: AsRef<Path>>(path: P, system: System) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                EmulatorError::GameNotFound(path.display().to_string())
            }
            _ => EmulatorError::Io(e),
        })?;

        let id = game_id(&data);
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());
        debug!("{} hashed to {}", path.display(), id);
        info!("Identified {} ({}, {} bytes)", title, system, data.len());

        Ok(Self {
            id,
            title,
            path: path.to_path_buf(),
            system,
            size: data.len() as u64,
        })
    }
}

/// Stable id for ROM contents
pub fn game_id(data: &[u8]) -> String {
    let digest = Sha1::digest(data);
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_game_id() {
        // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(game_id(b"abc"), "a9993e364706816a");
        // SHA-1("") = da39a3ee5e6b4b0d3255bfef95601890afd80709
        assert_eq!(game_id(b""), "da39a3ee5e6b4b0d");
    }

    #[test]
    fn test_open_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pattern Demo.tp");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"abc")
            .unwrap();

        let game = Game::open(&path).unwrap();
        assert_eq!(game.id, "a9993e364706816a");
        assert_eq!(game.title, "Pattern Demo");
        assert_eq!(game.system, System::TestPattern);
        assert_eq!(game.size, 3);
    }

    #[test]
    fn test_id_ignores_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.gb");
        let b = dir.path().join("renamed.gbc");
        std::fs::write(&a, [1, 2, 3]).unwrap();
        std::fs::write(&b, [1, 2, 3]).unwrap();
        assert_eq!(Game::open(&a).unwrap().id, Game::open(&b).unwrap().id);
    }

    #[test]
    fn test_open_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Game::open(dir.path().join("missing.tp")),
            Err(EmulatorError::GameNotFound(_))
        ));

        let unknown = dir.path().join("rom.xyz");
        std::fs::write(&unknown, [0]).unwrap();
        assert!(matches!(
            Game::open(&unknown),
            Err(EmulatorError::Core(CoreError::NotFound(_)))
        ));
        assert_eq!(
            Game::open_as(&unknown, System::Nes).unwrap().system,
            System::Nes
        );
    }
}
