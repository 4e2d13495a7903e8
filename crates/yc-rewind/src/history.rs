//! Bounded history of recent save states

use crate::rle;
use std::collections::VecDeque;
use tracing::{debug, trace};
use yc_core::config::RewindConfig;
use yc_core::RewindError;

/// How a snapshot is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Rle,
}

/// One captured state
#[derive(Debug, Clone)]
pub struct Snapshot {
    encoding: Encoding,
    data: Vec<u8>,
}

impl Snapshot {
    /// Store `state`, RLE-compressed when that is smaller
    pub fn capture(state: &[u8]) -> Self {
        let packed = rle::compress(state);
        if packed.len() < state.len() {
            Self {
                encoding: Encoding::Rle,
                data: packed,
            }
        } else {
            Self {
                encoding: Encoding::Raw,
                data: state.to_vec(),
            }
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bytes held in memory
    pub fn stored_len(&self) -> usize {
        self.data.len()
    }

    /// The original state bytes
    pub fn restore(&self) -> Result<Vec<u8>, RewindError> {
        match self.encoding {
            Encoding::Raw => Ok(self.data.clone()),
            Encoding::Rle => rle::decompress(&self.data),
        }
    }
}

/// Ring of snapshots capped by count and by memory
#[derive(Debug)]
pub struct RewindManager {
    history: VecDeque<Snapshot>,
    total_bytes: usize,
    max_states: usize,
    max_memory: usize,
    interval: u32,
    frames_since_capture: u32,
    /// Selected snapshot while rewinding
    cursor: Option<usize>,
}

impl RewindManager {
    pub fn new(max_states: usize, max_memory: usize, interval: u32) -> Self {
        Self {
            history: VecDeque::new(),
            total_bytes: 0,
            max_states: max_states.max(1),
            max_memory,
            interval: interval.max(1),
            frames_since_capture: 0,
            cursor: None,
        }
    }

    pub fn from_config(config: &RewindConfig) -> Self {
        Self::new(
            config.max_states,
            config.max_memory_bytes(),
            config.interval_frames,
        )
    }

    /// Count a frame; true when a capture is due. Never due while rewinding.
    pub fn should_capture(&mut self) -> bool {
        if self.is_rewinding() {
            return false;
        }
        self.frames_since_capture += 1;
        if self.frames_since_capture >= self.interval {
            self.frames_since_capture = 0;
            true
        } else {
            false
        }
    }

    /// Append a state, evicting the oldest entries past either cap
    pub fn capture_state(&mut self, state: &[u8]) {
        if self.is_rewinding() {
            trace!("Ignoring capture while rewinding");
            return;
        }
        let snapshot = Snapshot::capture(state);
        trace!(
            "Captured {} bytes as {} ({:?})",
            state.len(),
            snapshot.stored_len(),
            snapshot.encoding()
        );
        self.total_bytes += snapshot.stored_len();
        self.history.push_back(snapshot);
        self.trim();
    }

    fn trim(&mut self) {
        while self.history.len() > self.max_states || self.total_bytes > self.max_memory {
            match self.history.pop_front() {
                Some(old) => self.total_bytes -= old.stored_len(),
                None => break,
            }
        }
    }

    /// Enter rewind mode at the newest snapshot and return it
    pub fn start_rewind(&mut self) -> Result<Option<Vec<u8>>, RewindError> {
        if self.history.is_empty() {
            return Ok(None);
        }
        let newest = self.history.len() - 1;
        self.cursor = Some(newest);
        debug!("Rewind started with {} snapshots", self.history.len());
        self.history[newest].restore().map(Some)
    }

    /// Move one snapshot back in time. `None` at the oldest entry or when
    /// not rewinding.
    pub fn step_back(&mut self) -> Result<Option<Vec<u8>>, RewindError> {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                self.history[cursor - 1].restore().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Move one snapshot forward again. `None` at the newest entry.
    pub fn step_forward(&mut self) -> Result<Option<Vec<u8>>, RewindError> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.history.len() => {
                self.cursor = Some(cursor + 1);
                self.history[cursor + 1].restore().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Leave rewind mode; the future past the cursor is discarded
    pub fn stop_rewind(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            for dropped in self.history.drain(cursor + 1..) {
                self.total_bytes -= dropped.stored_len();
            }
            self.frames_since_capture = 0;
            debug!("Rewind stopped, {} snapshots kept", self.history.len());
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.total_bytes = 0;
        self.cursor = None;
        self.frames_since_capture = 0;
    }

    pub fn is_rewinding(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Stored (possibly compressed) bytes across all snapshots
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_states(&self) -> usize {
        self.max_states
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tag: u8) -> Vec<u8> {
        let mut s = vec![0u8; 64];
        s[0] = tag;
        s
    }

    #[test]
    fn test_snapshot_picks_smaller_encoding() {
        let zeros = Snapshot::capture(&[0u8; 100]);
        assert_eq!(zeros.encoding(), Encoding::Rle);
        assert_eq!(zeros.stored_len(), 3);

        let noise: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
        let raw = Snapshot::capture(&noise);
        assert_eq!(raw.encoding(), Encoding::Raw);
        assert_eq!(raw.restore().unwrap(), noise);
    }

    #[test]
    fn test_interval() {
        let mut rm = RewindManager::new(10, usize::MAX, 3);
        let due: Vec<bool> = (0..6).map(|_| rm.should_capture()).collect();
        assert_eq!(due, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_count_cap() {
        let mut rm = RewindManager::new(3, usize::MAX, 1);
        for tag in 1..=5 {
            rm.capture_state(&state(tag));
        }
        assert_eq!(rm.len(), 3);
        assert_eq!(rm.start_rewind().unwrap().unwrap()[0], 5);
        assert_eq!(rm.step_back().unwrap().unwrap()[0], 4);
        assert_eq!(rm.step_back().unwrap().unwrap()[0], 3);
        assert!(rm.step_back().unwrap().is_none());
    }

    #[test]
    fn test_memory_cap() {
        let noise: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
        let mut rm = RewindManager::new(100, 250, 1);
        for _ in 0..5 {
            rm.capture_state(&noise);
        }
        assert_eq!(rm.len(), 2);
        assert_eq!(rm.total_bytes(), 200);
    }

    #[test]
    fn test_branch_truncation() {
        let mut rm = RewindManager::new(10, usize::MAX, 1);
        for tag in 1..=5 {
            rm.capture_state(&state(tag));
        }
        rm.start_rewind().unwrap();
        rm.step_back().unwrap();
        rm.step_back().unwrap();
        assert_eq!(rm.step_forward().unwrap().unwrap()[0], 4);
        rm.step_back().unwrap();
        rm.stop_rewind();

        assert!(!rm.is_rewinding());
        assert_eq!(rm.len(), 3);
        rm.capture_state(&state(9));
        assert_eq!(rm.start_rewind().unwrap().unwrap()[0], 9);
        assert_eq!(rm.step_back().unwrap().unwrap()[0], 3);
    }

    #[test]
    fn test_no_capture_while_rewinding() {
        let mut rm = RewindManager::new(10, usize::MAX, 1);
        rm.capture_state(&state(1));
        rm.start_rewind().unwrap();
        assert!(!rm.should_capture());
        rm.capture_state(&state(2));
        assert_eq!(rm.len(), 1);
        assert!(rm.step_forward().unwrap().is_none());
    }

    #[test]
    fn test_empty_history() {
        let mut rm = RewindManager::new(10, usize::MAX, 1);
        assert!(rm.start_rewind().unwrap().is_none());
        assert!(!rm.is_rewinding());
        assert!(rm.step_back().unwrap().is_none());
        rm.stop_rewind();
    }

    #[test]
    fn test_clear() {
        let mut rm = RewindManager::new(10, usize::MAX, 1);
        rm.capture_state(&state(1));
        rm.clear();
        assert!(rm.is_empty());
        assert_eq!(rm.total_bytes(), 0);
    }
}
