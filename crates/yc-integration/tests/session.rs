//! Session tests against the built-in test pattern core

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use yc_core::config::PathConfig;
use yc_core::{Config, CoreError, EmulatorError, StorageError};
use yc_integration::{Game, SessionManager, AUTO_SAVE_SLOT};
use yc_libretro::test_pattern::{self, AUDIO_FRAMES, SAVE_RAM_SIZE, WIDTH};
use yc_libretro::{
    AdapterState, AudioQueue, AvInfo, Button, MemoryKind, PixelFormat, VideoFrame, VideoSink,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

fn config(dir: &Path) -> Config {
    Config {
        paths: PathConfig::with_base(dir),
        ..Config::default()
    }
}

fn write_rom(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn started(dir: &TempDir, config: Config) -> (SessionManager, Game) {
    init_logging();
    let rom = write_rom(dir.path(), "pattern.tp", 64 * 1024);
    let game = Game::open(&rom).unwrap();
    let mut manager = SessionManager::from_config(config);
    manager.start(&game).unwrap();
    (manager, game)
}

fn frame_counter(manager: &mut SessionManager) -> u64 {
    let ram = manager.memory(MemoryKind::SystemRam).unwrap();
    u64::from_le_bytes(ram[..8].try_into().unwrap())
}

#[test]
fn test_play_save_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, game) = started(&dir, config(dir.path()));
    assert!(manager.is_active());
    assert_eq!(manager.game().unwrap().id, game.id);

    for _ in 0..60 {
        manager.run_frame().unwrap();
    }
    assert_eq!(manager.frame_count(), 60);
    assert_eq!(manager.state(), Some(AdapterState::Running));

    let blob = manager.save_state(1).unwrap();
    manager.stop().unwrap();
    assert!(!manager.is_active());

    let slot = dir
        .path()
        .join("SaveStates")
        .join(&game.id)
        .join("slot1.state");
    assert_eq!(std::fs::read(slot).unwrap(), blob);

    let battery = dir.path().join("Saves").join(format!("{}.sav", game.id));
    assert_eq!(std::fs::read(battery).unwrap().len(), SAVE_RAM_SIZE);
}

#[test]
fn test_rejected_rom_writes_nothing() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let rom = write_rom(dir.path(), "empty.tp", 0);
    let game = Game::open(&rom).unwrap();

    let mut manager = SessionManager::from_config(config(dir.path()));
    let err = manager.start(&game).unwrap_err();
    assert!(matches!(err, EmulatorError::Core(CoreError::Load(_))));
    assert!(!manager.is_active());
    assert!(!dir.path().join("Saves").exists());
    assert!(!dir.path().join("SaveStates").exists());
}

#[test]
fn test_operations_need_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = SessionManager::from_config(config(dir.path()));
    assert!(matches!(
        manager.run_frame(),
        Err(EmulatorError::Core(CoreError::InvalidState { .. }))
    ));
    assert!(manager.stop().is_err());
    assert!(manager.save_state(0).is_err());
    assert_eq!(manager.frame_count(), 0);
    assert!(manager.input_handle().is_none());
}

#[test]
fn test_second_start_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, game) = started(&dir, config(dir.path()));
    let err = manager.start(&game).unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::Core(CoreError::InvalidState { .. })
    ));
    // The first session is untouched
    manager.run_frame().unwrap();
    assert_eq!(manager.frame_count(), 1);
}

#[test]
fn test_state_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));

    for _ in 0..10 {
        manager.run_frame().unwrap();
    }
    manager.save_state(3).unwrap();
    let saved_ram = manager.memory(MemoryKind::SaveRam).unwrap();

    for _ in 0..25 {
        manager.run_frame().unwrap();
    }
    assert_eq!(frame_counter(&mut manager), 35);

    manager.load_state(3).unwrap();
    assert_eq!(frame_counter(&mut manager), 10);
    assert_eq!(manager.memory(MemoryKind::SaveRam).unwrap(), saved_ram);
}

#[test]
fn test_missing_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));
    assert!(matches!(
        manager.load_state(7),
        Err(EmulatorError::Storage(StorageError::SlotNotFound { slot: 7, .. }))
    ));
}

#[test]
fn test_corrupt_slot_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, game) = started(&dir, config(dir.path()));
    for _ in 0..5 {
        manager.run_frame().unwrap();
    }

    manager
        .store()
        .write_state(&game.id, 2, b"not a state")
        .unwrap();
    let err = manager.load_state(2).unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::Core(CoreError::Serialization(_))
    ));
    assert_eq!(frame_counter(&mut manager), 5);

    manager.run_frame().unwrap();
    assert_eq!(frame_counter(&mut manager), 6);
}

#[test]
fn test_battery_survives_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, game) = started(&dir, config(dir.path()));

    manager.set_input(0, Button::A, true).unwrap();
    for _ in 0..20 {
        manager.run_frame().unwrap();
    }
    let before = manager.memory(MemoryKind::SaveRam).unwrap();
    manager.stop().unwrap();

    manager.start(&game).unwrap();
    assert_eq!(manager.memory(MemoryKind::SaveRam).unwrap(), before);
    assert_eq!(manager.frame_count(), 0);
}

#[test]
fn test_empty_battery_written_without_save_ram() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.cores
        .options
        .insert(test_pattern::SAVE_RAM_OPTION.to_string(), "disabled".to_string());
    let (mut manager, game) = started(&dir, cfg);

    for _ in 0..5 {
        manager.run_frame().unwrap();
    }
    manager.stop().unwrap();

    let battery = dir.path().join("Saves").join(format!("{}.sav", game.id));
    assert_eq!(std::fs::metadata(&battery).unwrap().len(), 0);

    // Restarting with the empty image is not an error
    manager.start(&game).unwrap();
    manager.run_frame().unwrap();
    manager.stop().unwrap();
}

#[test]
fn test_list_and_delete_slots() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));
    manager.run_frame().unwrap();

    assert!(manager.list_states().unwrap().is_empty());
    for slot in [4, 1] {
        manager.save_state(slot).unwrap();
    }
    let slots: Vec<u32> = manager
        .list_states()
        .unwrap()
        .iter()
        .map(|s| s.slot)
        .collect();
    assert_eq!(slots, vec![1, 4]);

    manager.delete_state(4).unwrap();
    assert_eq!(manager.list_states().unwrap().len(), 1);
    assert!(manager.delete_state(4).is_err());
}

#[test]
fn test_auto_save_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.general.auto_save_state = true;
    let (mut manager, game) = started(&dir, cfg);

    for _ in 0..3 {
        manager.run_frame().unwrap();
    }
    manager.stop().unwrap();
    assert!(manager.store().has_state(&game.id, AUTO_SAVE_SLOT));
}

#[test]
fn test_tick_follows_the_clock() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.emulation.max_catch_up_frames = 4;
    let (mut manager, _) = started(&dir, cfg);

    let t0 = Instant::now();
    assert_eq!(manager.tick(t0).unwrap(), 1);
    assert_eq!(manager.tick(t0).unwrap(), 0);

    // A long stall is capped
    let later = t0 + Duration::from_secs(1);
    assert_eq!(manager.tick(later).unwrap(), 4);
    assert_eq!(manager.frame_count(), 5);
    assert!(manager.dropped_frames() > 0);
}

#[test]
fn test_paused_session_does_not_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.general.start_paused = true;
    let (mut manager, _) = started(&dir, cfg);
    assert_eq!(manager.state(), Some(AdapterState::Paused));

    let t0 = Instant::now();
    assert_eq!(manager.tick(t0).unwrap(), 0);
    assert_eq!(manager.tick(t0 + Duration::from_secs(1)).unwrap(), 0);

    manager.resume().unwrap();
    assert_eq!(manager.tick(t0 + Duration::from_secs(2)).unwrap(), 1);
    assert_eq!(manager.frame_count(), 1);
}

#[test]
fn test_rewind() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.rewind.enabled = true;
    cfg.rewind.interval_frames = 1;
    let (mut manager, _) = started(&dir, cfg);

    assert!(!manager.start_rewind().unwrap());
    for _ in 0..10 {
        manager.run_frame().unwrap();
    }
    assert_eq!(manager.rewind_len(), 10);

    assert!(manager.start_rewind().unwrap());
    assert!(manager.is_rewinding());
    assert!(manager.step_back().unwrap());
    assert!(manager.step_back().unwrap());
    // Snapshot after frame 8, plus the preview frame
    assert_eq!(frame_counter(&mut manager), 9);

    // No frames run from the clock while rewinding
    assert_eq!(manager.tick(Instant::now()).unwrap(), 0);

    manager.stop_rewind().unwrap();
    assert!(!manager.is_rewinding());
    assert_eq!(manager.rewind_len(), 8);

    manager.run_frame().unwrap();
    assert_eq!(manager.rewind_len(), 9);
}

#[test]
fn test_rewind_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));
    manager.run_frame().unwrap();
    assert!(matches!(
        manager.start_rewind(),
        Err(EmulatorError::Core(CoreError::Unsupported(_)))
    ));
    assert_eq!(manager.rewind_len(), 0);
}

#[test]
fn test_fast_forward_mutes_audio() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));
    let queue = Arc::new(AudioQueue::new(AUDIO_FRAMES * 2 * 8));
    manager.attach_audio_queue(&queue);

    manager.run_frame().unwrap();
    assert_eq!(queue.len(), AUDIO_FRAMES * 2);

    assert_eq!(manager.set_speed(2.0).unwrap(), 2.0);
    manager.run_frame().unwrap();
    assert_eq!(queue.len(), AUDIO_FRAMES * 2);

    assert_eq!(manager.set_speed(100.0).unwrap(), 8.0);
    manager.set_speed(1.0).unwrap();
    manager.run_frame().unwrap();
    assert_eq!(queue.len(), AUDIO_FRAMES * 4);
}

struct CountingSink {
    presented: Arc<AtomicUsize>,
    width: Arc<AtomicUsize>,
}

impl VideoSink for CountingSink {
    fn configure(&mut self, av: &AvInfo, _format: PixelFormat) {
        self.width
            .store(av.geometry.base_width as usize, Ordering::SeqCst);
    }

    fn present(&mut self, _frame: &Arc<VideoFrame>) {
        self.presented.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_video_sink_sees_every_frame() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let rom = write_rom(dir.path(), "pattern.tp", 4096);
    let game = Game::open(&rom).unwrap();

    let presented = Arc::new(AtomicUsize::new(0));
    let width = Arc::new(AtomicUsize::new(0));
    let mut manager = SessionManager::from_config(config(dir.path()));
    manager.set_video_sink(Box::new(CountingSink {
        presented: Arc::clone(&presented),
        width: Arc::clone(&width),
    }));
    manager.start(&game).unwrap();
    assert_eq!(width.load(Ordering::SeqCst), WIDTH as usize);

    for _ in 0..3 {
        manager.run_frame().unwrap();
    }
    // Duplicate frames are presented again
    assert_eq!(presented.load(Ordering::SeqCst), 3);
}

#[test]
fn test_input_handle_drives_core() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = started(&dir, config(dir.path()));
    let input = manager.input_handle().unwrap();

    manager.run_frame().unwrap();
    let x_before = manager.memory(MemoryKind::SystemRam).unwrap()[8..12].to_vec();

    let writer = std::thread::spawn(move || input.set_button(0, Button::Right, true));
    assert!(writer.join().unwrap());

    manager.run_frame().unwrap();
    let x_after = manager.memory(MemoryKind::SystemRam).unwrap()[8..12].to_vec();
    assert_ne!(x_before, x_after);
}
