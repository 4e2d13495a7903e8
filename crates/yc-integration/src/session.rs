//! Session lifecycle
//!
//! The [`SessionManager`] ties the frontend together for one game at a time:
//! - Picks and loads a core through the registry
//! - Drives frames from the host clock through the frame pacer
//! - Hands video and audio to the host sinks
//! - Persists battery RAM, save-state slots and rewind history

use crate::game::Game;
use std::sync::Arc;
use std::time::Instant;
use yc_core::{Config, CoreError, EmulatorError, FramePacer, Result, RewindError};
use yc_libretro::{
    device_id, AdapterState, AudioQueue, AudioSink, AvInfo, Axis, Button, CoreAdapter,
    CoreRegistry, EnvironmentConfig, FrameOutput, InputState, MemoryKind, PixelFormat, Stick,
    VideoSink, MAX_PORTS,
};
use yc_rewind::RewindManager;
use yc_vfs::{SaveStore, SlotInfo};

/// Slot written on stop when auto-save is enabled
pub const AUTO_SAVE_SLOT: u32 = 99;

/// Host-side consumers of frames and samples
#[derive(Default)]
struct Sinks {
    video: Option<Box<dyn VideoSink>>,
    audio: Option<Box<dyn AudioSink>>,
}

impl Sinks {
    fn configure(&mut self, av: &AvInfo, format: PixelFormat) {
        if let Some(video) = self.video.as_mut() {
            video.configure(av, format);
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.configure(av.timing.sample_rate);
        }
    }

    fn deliver(&mut self, output: &FrameOutput, with_audio: bool) {
        if let (Some(video), Some(frame)) = (self.video.as_mut(), output.video.as_ref()) {
            video.present(frame);
        }
        if with_audio && !output.audio.is_empty() {
            if let Some(audio) = self.audio.as_mut() {
                audio.push(&output.audio.samples);
            }
        }
    }
}

/// One loaded game
struct Session {
    game: Game,
    adapter: CoreAdapter,
    pacer: FramePacer,
    rewind: Option<RewindManager>,
}

/// Owns at most one active game session
pub struct SessionManager {
    config: Config,
    registry: CoreRegistry,
    store: SaveStore,
    sinks: Sinks,
    session: Option<Session>,
}

fn no_session(operation: &'static str) -> EmulatorError {
    CoreError::InvalidState {
        operation,
        state: "stopped".to_string(),
    }
    .into()
}

impl SessionManager {
    pub fn new(config: Config, registry: CoreRegistry, store: SaveStore) -> Self {
        Self {
            config,
            registry,
            store,
            sinks: Sinks::default(),
            session: None,
        }
    }

    /// Manager over every linked core, storing under the configured paths
    pub fn from_config(config: Config) -> Self {
        let store = SaveStore::from_paths(&config.paths);
        Self::new(config, CoreRegistry::builtin(), store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    pub fn set_video_sink(&mut self, sink: Box<dyn VideoSink>) {
        self.sinks.video = Some(sink);
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.sinks.audio = Some(sink);
    }

    /// Feed audio into `queue`, applying the configured volume
    pub fn attach_audio_queue(&mut self, queue: &Arc<AudioQueue>) {
        queue.set_volume(self.config.audio.volume);
        self.sinks.audio = Some(Box::new(Arc::clone(queue)));
    }

    fn session(&mut self, operation: &'static str) -> Result<&mut Session> {
        self.session.as_mut().ok_or_else(|| no_session(operation))
    }

    /// Load `game` and make it the active session
    pub fn start(&mut self, game: &Game) -> Result<()> {
        if let Some(active) = &self.session {
            return Err(CoreError::InvalidState {
                operation: "start a session",
                state: active.adapter.state().to_string(),
            }
            .into());
        }

        let preferred = self
            .config
            .cores
            .preferred
            .get(game.system.short_name())
            .map(String::as_str);
        let core = self.registry.for_system(game.system, preferred)?;
        tracing::info!("Starting {} with core {}", game.title, core.id);

        let env = EnvironmentConfig {
            system_directory: self.config.paths.system.clone(),
            save_directory: self.config.paths.saves.clone(),
            language: self.config.cores.language.retro_id(),
            options: self.config.cores.options.clone(),
        };
        let mut adapter = CoreAdapter::new(core, &env);
        adapter.load(&game.path)?;

        if let Some(battery) = self.store.read_battery(&game.id)? {
            if adapter.memory_size(MemoryKind::SaveRam) > 0 {
                adapter.write_memory(MemoryKind::SaveRam, &battery)?;
                tracing::info!("Restored {} bytes of battery RAM", battery.len());
            } else {
                tracing::warn!("Battery RAM file present but core exposes no save RAM");
            }
        }

        for (port, device) in self
            .config
            .input
            .port_devices
            .iter()
            .enumerate()
            .take(MAX_PORTS)
        {
            adapter.set_controller_port_device(port, device_id(*device))?;
        }

        let av = adapter.av_info();
        adapter.take_av_change();
        self.sinks.configure(&av, adapter.pixel_format());

        let emulation = &self.config.emulation;
        let pacer = FramePacer::new(av.timing.fps, emulation.speed, emulation.max_catch_up_frames);
        adapter.set_fast_forwarding(pacer.is_fast_forwarding());

        let rewind = self
            .config
            .rewind
            .enabled
            .then(|| RewindManager::from_config(&self.config.rewind));

        if self.config.general.start_paused {
            adapter.pause()?;
        }

        self.session = Some(Session {
            game: game.clone(),
            adapter,
            pacer,
            rewind,
        });
        Ok(())
    }

    /// Stop the session: persist battery RAM (and the auto-save slot), then
    /// unload. The session is detached first, so it is gone even on error.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Err(no_session("stop"));
        };
        let game_id = session.game.id.clone();
        let mut first_error: Option<EmulatorError> = None;

        let battery = if session.adapter.memory_size(MemoryKind::SaveRam) > 0 {
            match session.adapter.memory(MemoryKind::SaveRam) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Could not read battery RAM: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        if let Err(e) = self.store.write_battery(&game_id, &battery) {
            tracing::error!("Failed to persist battery RAM: {}", e);
            first_error.get_or_insert(e.into());
        }

        if self.config.general.auto_save_state {
            let saved = session
                .adapter
                .save_state()
                .map_err(EmulatorError::from)
                .and_then(|blob| {
                    self.store
                        .write_state(&game_id, AUTO_SAVE_SLOT, &blob)
                        .map_err(EmulatorError::from)
                });
            if let Err(e) = saved {
                tracing::warn!("Auto-save failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = session.adapter.unload() {
            first_error.get_or_insert(e.into());
        }
        tracing::info!(
            "Stopped {} after {} frames",
            session.game.title,
            session.adapter.frame_count()
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run the frames due at `now`. Returns how many ran.
    pub fn tick(&mut self, now: Instant) -> Result<u32> {
        let session = self.session.as_mut().ok_or_else(|| no_session("tick"))?;
        if session.adapter.state() == AdapterState::Paused
            || session.rewind.as_ref().is_some_and(RewindManager::is_rewinding)
        {
            return Ok(0);
        }

        let due = session.pacer.frames_due(now);
        for _ in 0..due {
            Self::step(session, &mut self.sinks, &self.config)?;
        }
        Ok(due)
    }

    /// Run exactly one frame regardless of the clock
    pub fn run_frame(&mut self) -> Result<FrameOutput> {
        let session = self.session.as_mut().ok_or_else(|| no_session("run a frame"))?;
        Self::step(session, &mut self.sinks, &self.config)
    }

    fn step(session: &mut Session, sinks: &mut Sinks, config: &Config) -> Result<FrameOutput> {
        let output = session.adapter.run()?;

        if let Some(av) = session.adapter.take_av_change() {
            tracing::debug!("Reconfiguring sinks for {:?}", av);
            session.pacer.set_fps(av.timing.fps);
            sinks.configure(&av, session.adapter.pixel_format());
        }

        let muted = !config.audio.enable
            || (config.emulation.mute_when_fast_forwarding && session.pacer.is_fast_forwarding());
        sinks.deliver(&output, !muted);

        let capture = session
            .rewind
            .as_mut()
            .is_some_and(RewindManager::should_capture);
        if capture {
            match session.adapter.save_state() {
                Ok(state) => {
                    if let Some(rewind) = session.rewind.as_mut() {
                        rewind.capture_state(&state);
                    }
                }
                Err(e) => {
                    tracing::warn!("Disabling rewind, core cannot save state: {}", e);
                    session.rewind = None;
                }
            }
        }

        Ok(output)
    }

    /// Serialize the core into `slot`. Nothing is written if serialization
    /// fails.
    pub fn save_state(&mut self, slot: u32) -> Result<Vec<u8>> {
        let session = self.session.as_mut().ok_or_else(|| no_session("save state"))?;
        let blob = session.adapter.save_state()?;
        self.store.write_state(&session.game.id, slot, &blob)?;
        Ok(blob)
    }

    /// Restore `slot`. The slot store is only read.
    pub fn load_state(&mut self, slot: u32) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(|| no_session("load state"))?;
        let blob = self.store.read_state(&session.game.id, slot)?;
        session.adapter.load_state(&blob)?;
        if let Some(rewind) = session.rewind.as_mut() {
            rewind.stop_rewind();
        }
        tracing::info!("Loaded state slot {} for {}", slot, session.game.id);
        Ok(())
    }

    pub fn delete_state(&mut self, slot: u32) -> Result<()> {
        let session = self.session("delete state")?;
        let game_id = session.game.id.clone();
        self.store.delete_state(&game_id, slot)?;
        Ok(())
    }

    pub fn list_states(&mut self) -> Result<Vec<SlotInfo>> {
        let session = self.session("list states")?;
        let game_id = session.game.id.clone();
        Ok(self.store.list_states(&game_id)?)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.session("pause")?.adapter.pause()?;
        tracing::info!("Paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let session = self.session("resume")?;
        session.adapter.resume()?;
        session.pacer.reset();
        tracing::info!("Resumed");
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        let session = self.session("reset")?;
        session.adapter.reset()?;
        if let Some(rewind) = session.rewind.as_mut() {
            rewind.clear();
        }
        Ok(())
    }

    pub fn set_input(&mut self, port: usize, button: Button, pressed: bool) -> Result<()> {
        self.session("set input")?
            .adapter
            .set_input(port, button, pressed)?;
        Ok(())
    }

    pub fn set_analog(&mut self, port: usize, stick: Stick, axis: Axis, value: i16) -> Result<()> {
        self.session("set input")?
            .adapter
            .set_analog(port, stick, axis, value)?;
        Ok(())
    }

    /// Input state writable from other threads
    pub fn input_handle(&self) -> Option<Arc<InputState>> {
        self.session.as_ref().map(|s| s.adapter.input_handle())
    }

    /// Change emulation speed; returns the clamped value
    pub fn set_speed(&mut self, speed: f32) -> Result<f32> {
        let session = self.session("set speed")?;
        let applied = session.pacer.set_speed(speed);
        session.adapter.set_fast_forwarding(session.pacer.is_fast_forwarding());
        tracing::debug!("Speed set to {}x", applied);
        Ok(applied)
    }

    pub fn speed(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.pacer.speed())
    }

    /// Copy of a core memory region
    pub fn memory(&mut self, kind: MemoryKind) -> Result<Vec<u8>> {
        Ok(self.session("access memory")?.adapter.memory(kind)?)
    }

    /// Enter rewind mode at the newest snapshot; false if none is held yet
    pub fn start_rewind(&mut self) -> Result<bool> {
        self.rewind_step(RewindManager::start_rewind)
    }

    /// Step one snapshot back; false at the oldest snapshot
    pub fn step_back(&mut self) -> Result<bool> {
        self.rewind_step(RewindManager::step_back)
    }

    /// Step one snapshot forward; false at the newest snapshot
    pub fn step_forward(&mut self) -> Result<bool> {
        self.rewind_step(RewindManager::step_forward)
    }

    fn rewind_step(
        &mut self,
        step: fn(&mut RewindManager) -> std::result::Result<Option<Vec<u8>>, RewindError>,
    ) -> Result<bool> {
        let session = self.session.as_mut().ok_or_else(|| no_session("rewind"))?;
        let Some(rewind) = session.rewind.as_mut() else {
            return Err(CoreError::Unsupported("rewind is disabled".to_string()).into());
        };
        match step(rewind)? {
            Some(state) => {
                Self::apply_rewind(session, &mut self.sinks, &state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resume normal play from the selected snapshot
    pub fn stop_rewind(&mut self) -> Result<()> {
        let session = self.session("rewind")?;
        if let Some(rewind) = session.rewind.as_mut() {
            rewind.stop_rewind();
        }
        session.pacer.reset();
        Ok(())
    }

    /// Load a snapshot and show one silent preview frame of it
    fn apply_rewind(session: &mut Session, sinks: &mut Sinks, state: &[u8]) -> Result<()> {
        session.adapter.load_state(state)?;
        if matches!(
            session.adapter.state(),
            AdapterState::Loaded | AdapterState::Running
        ) {
            session.adapter.set_audio_enabled(false);
            let preview = session.adapter.run();
            session.adapter.set_audio_enabled(true);
            sinks.deliver(&preview?, false);
        }
        Ok(())
    }

    pub fn is_rewinding(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.rewind.as_ref())
            .is_some_and(RewindManager::is_rewinding)
    }

    /// Snapshots currently held for rewind
    pub fn rewind_len(&self) -> usize {
        self.session
            .as_ref()
            .and_then(|s| s.rewind.as_ref())
            .map_or(0, RewindManager::len)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn game(&self) -> Option<&Game> {
        self.session.as_ref().map(|s| &s.game)
    }

    pub fn state(&self) -> Option<AdapterState> {
        self.session.as_ref().map(|s| s.adapter.state())
    }

    pub fn frame_count(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.adapter.frame_count())
    }

    pub fn av_info(&self) -> Option<AvInfo> {
        self.session.as_ref().map(|s| s.adapter.av_info())
    }

    pub fn dropped_frames(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.pacer.dropped_frames())
    }

    /// The core asked to be shut down
    pub fn shutdown_requested(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.adapter.shutdown_requested())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!("Failed to stop session on drop: {}", e);
            }
        }
    }
}
