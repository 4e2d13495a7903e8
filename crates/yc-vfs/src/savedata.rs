//! Save data management
//!
//! Persists save-state slots and battery RAM on the host file system:
//!
//! ```text
//! <save_states>/<game-id>/slot<N>.state
//! <saves>/<game-id>.sav
//! ```
//!
//! Files hold the raw core bytes with no header. Every write goes through a
//! temporary file that is synced and renamed over the target, so a crash
//! leaves either the old or the new contents.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use yc_core::config::PathConfig;
use yc_core::StorageError;

type Result<T> = std::result::Result<T, StorageError>;

const STATE_EXTENSION: &str = "state";
const BATTERY_EXTENSION: &str = "sav";

/// A save-state slot present on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: u32,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: Option<SystemTime>,
}

/// Save-state and battery RAM storage
#[derive(Debug, Clone)]
pub struct SaveStore {
    saves_dir: PathBuf,
    states_dir: PathBuf,
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reject ids that could escape the storage directories
pub fn validate_game_id(game_id: &str) -> Result<()> {
    let bad = game_id.is_empty()
        || game_id == "."
        || game_id.contains("..")
        || game_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c == ':');
    if bad {
        Err(StorageError::InvalidGameId(game_id.to_string()))
    } else {
        Ok(())
    }
}

/// Write `data` to `path` durably: temp file, fsync, rename
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(path, e));
    }

    // Persist the rename itself
    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

fn parse_slot(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("slot")?
        .strip_suffix(".state")?
        .parse()
        .ok()
}

impl SaveStore {
    pub fn new(saves_dir: impl Into<PathBuf>, states_dir: impl Into<PathBuf>) -> Self {
        Self {
            saves_dir: saves_dir.into(),
            states_dir: states_dir.into(),
        }
    }

    pub fn from_paths(paths: &PathConfig) -> Self {
        Self::new(&paths.saves, &paths.save_states)
    }

    pub fn saves_dir(&self) -> &Path {
        &self.saves_dir
    }

    pub fn states_dir(&self) -> &Path {
        &self.states_dir
    }

    /// `<save_states>/<game-id>/slot<N>.state`
    pub fn state_path(&self, game_id: &str, slot: u32) -> Result<PathBuf> {
        validate_game_id(game_id)?;
        Ok(self
            .states_dir
            .join(game_id)
            .join(format!("slot{}.{}", slot, STATE_EXTENSION)))
    }

    /// `<saves>/<game-id>.sav`
    pub fn battery_path(&self, game_id: &str) -> Result<PathBuf> {
        validate_game_id(game_id)?;
        Ok(self
            .saves_dir
            .join(format!("{}.{}", game_id, BATTERY_EXTENSION)))
    }

    /// Store a save state, replacing the slot's previous contents
    pub fn write_state(&self, game_id: &str, slot: u32, data: &[u8]) -> Result<PathBuf> {
        let path = self.state_path(game_id, slot)?;
        write_atomic(&path, data)?;
        tracing::info!("Saved state slot {} for {} ({} bytes)", slot, game_id, data.len());
        Ok(path)
    }

    pub fn read_state(&self, game_id: &str, slot: u32) -> Result<Vec<u8>> {
        let path = self.state_path(game_id, slot)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::SlotNotFound {
                game_id: game_id.to_string(),
                slot,
            },
            _ => io_error(&path, e),
        })
    }

    pub fn has_state(&self, game_id: &str, slot: u32) -> bool {
        self.state_path(game_id, slot)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    pub fn delete_state(&self, game_id: &str, slot: u32) -> Result<()> {
        let path = self.state_path(game_id, slot)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::SlotNotFound {
                game_id: game_id.to_string(),
                slot,
            },
            _ => io_error(&path, e),
        })?;
        tracing::info!("Deleted state slot {} for {}", slot, game_id);
        Ok(())
    }

    /// Slots present for a game, ordered by slot number
    pub fn list_states(&self, game_id: &str) -> Result<Vec<SlotInfo>> {
        validate_game_id(game_id)?;
        let dir = self.states_dir.join(game_id);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut slots = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(slot) = parse_slot(&name) else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            slots.push(SlotInfo {
                slot,
                path: entry.path(),
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        slots.sort_by_key(|s| s.slot);
        Ok(slots)
    }

    /// Store battery RAM. Empty images are written too.
    pub fn write_battery(&self, game_id: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.battery_path(game_id)?;
        write_atomic(&path, data)?;
        tracing::debug!("Wrote {} bytes of battery RAM to {:?}", data.len(), path);
        Ok(path)
    }

    /// Battery RAM image, or `None` if the game has never saved
    pub fn read_battery(&self, game_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.battery_path(game_id)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> SaveStore {
        SaveStore::new(dir.join("Saves"), dir.join("SaveStates"))
    }

    #[test]
    fn test_layout() {
        let store = SaveStore::new("/data/Saves", "/data/SaveStates");
        assert_eq!(
            store.state_path("abcd", 3).unwrap(),
            PathBuf::from("/data/SaveStates/abcd/slot3.state")
        );
        assert_eq!(
            store.battery_path("abcd").unwrap(),
            PathBuf::from("/data/Saves/abcd.sav")
        );
    }

    #[test]
    fn test_game_id_validation() {
        assert!(validate_game_id("0123456789abcdef").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "x..y", "nul\0"] {
            assert!(
                matches!(validate_game_id(bad), Err(StorageError::InvalidGameId(_))),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.write_state("game", 1, b"first").unwrap();
        store.write_state("game", 1, b"second").unwrap();
        assert_eq!(store.read_state("game", 1).unwrap(), b"second");
        assert!(store.has_state("game", 1));
        assert!(!store.has_state("game", 2));

        // No temp files left behind
        let names: Vec<_> = fs::read_dir(dir.path().join("SaveStates/game"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_missing_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.read_state("game", 4),
            Err(StorageError::SlotNotFound { slot: 4, .. })
        ));
        assert!(matches!(
            store.delete_state("game", 4),
            Err(StorageError::SlotNotFound { .. })
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.list_states("game").unwrap().is_empty());

        for slot in [10, 2, 5] {
            store.write_state("game", slot, &[slot as u8; 8]).unwrap();
        }
        fs::write(dir.path().join("SaveStates/game/notes.txt"), b"x").unwrap();

        let slots: Vec<u32> = store
            .list_states("game")
            .unwrap()
            .iter()
            .map(|s| s.slot)
            .collect();
        assert_eq!(slots, vec![2, 5, 10]);

        store.delete_state("game", 5).unwrap();
        let listed = store.list_states("game").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].size, 8);
    }

    #[test]
    fn test_battery() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.read_battery("game").unwrap(), None);

        store.write_battery("game", &[]).unwrap();
        assert_eq!(store.read_battery("game").unwrap(), Some(Vec::new()));

        store.write_battery("game", &[1, 2, 3]).unwrap();
        assert_eq!(store.read_battery("game").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_slot() {
        assert_eq!(parse_slot("slot0.state"), Some(0));
        assert_eq!(parse_slot("slot99.state"), Some(99));
        assert_eq!(parse_slot("slot.state"), None);
        assert_eq!(parse_slot("slot1.state.tmp"), None);
    }
}
