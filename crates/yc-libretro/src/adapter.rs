//! Core adapter
//!
//! Owns one libretro core for the length of a session: wires its callbacks,
//! loads content, steps frames and moves state in and out of it. Every call
//! into the core runs inside a [`CallbackScope`] so the core's callbacks land
//! in this adapter's [`FrontendState`].

use crate::context::{self, CallbackScope, FrameOutput, FrontendState};
use crate::environment::{EnvironmentConfig, EnvironmentState};
use crate::input::{Axis, Button, InputState, Stick, MAX_PORTS};
use crate::registry::CoreDescriptor;
use crate::video::{AvInfo, PixelFormat};
use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use yc_core::CoreError;
use yc_ffi::types::*;
use yc_ffi::CoreApi;

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Nothing loaded yet
    Uninitialized,
    /// Content loaded, no frame run yet
    Loaded,
    Running,
    Paused,
    /// Content unloaded; the adapter cannot be reused
    Unloaded,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Unloaded => "unloaded",
        };
        f.write_str(name)
    }
}

/// Memory regions a core may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Battery-backed cartridge RAM
    SaveRam,
    Rtc,
    SystemRam,
    VideoRam,
}

impl MemoryKind {
    fn raw(self) -> u32 {
        match self {
            Self::SaveRam => MEMORY_SAVE_RAM,
            Self::Rtc => MEMORY_RTC,
            Self::SystemRam => MEMORY_SYSTEM_RAM,
            Self::VideoRam => MEMORY_VIDEO_RAM,
        }
    }
}

/// Video standard reported by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ntsc,
    Pal,
}

/// Static description from `retro_get_system_info`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreInfo {
    pub library_name: String,
    pub library_version: String,
    pub valid_extensions: Vec<String>,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl CoreInfo {
    fn from_raw(info: &SystemInfo) -> Self {
        // SAFETY: the core returns static NUL-terminated strings or null
        let text = |ptr: *const libc::c_char| {
            if ptr.is_null() {
                String::new()
            } else {
                unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
            }
        };
        Self {
            library_name: text(info.library_name),
            library_version: text(info.library_version),
            valid_extensions: text(info.valid_extensions)
                .split('|')
                .filter(|e| !e.is_empty())
                .map(str::to_owned)
                .collect(),
            need_fullpath: info.need_fullpath,
            block_extract: info.block_extract,
        }
    }
}

/// Buffers the core may still point into after `retro_load_game`
struct LoadedContent {
    _path: CString,
    _data: Vec<u8>,
}

/// One libretro core bound to one piece of content
pub struct CoreAdapter {
    descriptor: &'static CoreDescriptor,
    api: CoreApi,
    state: AdapterState,
    frontend: Box<FrontendState>,
    input: Arc<InputState>,
    info: Option<CoreInfo>,
    content: Option<LoadedContent>,
    initialized: bool,
    frame_count: u64,
    // Callback routing is thread-local
    _not_send: PhantomData<*const ()>,
}

impl CoreAdapter {
    pub fn new(descriptor: &'static CoreDescriptor, env: &EnvironmentConfig) -> Self {
        Self {
            descriptor,
            api: (descriptor.api)(),
            state: AdapterState::Uninitialized,
            frontend: Box::new(FrontendState::new(EnvironmentState::new(env))),
            input: Arc::new(InputState::new()),
            info: None,
            content: None,
            initialized: false,
            frame_count: 0,
            _not_send: PhantomData,
        }
    }

    /// Run `f` against the core with callbacks routed here
    fn call<R>(&mut self, f: impl FnOnce(&CoreApi) -> R) -> R {
        let api = self.api;
        let _scope = CallbackScope::enter(&mut self.frontend);
        f(&api)
    }

    fn invalid(&self, operation: &'static str) -> CoreError {
        CoreError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    fn ensure(&self, operation: &'static str, allowed: &[AdapterState]) -> Result<(), CoreError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), CoreError> {
        self.ensure(
            operation,
            &[AdapterState::Loaded, AdapterState::Running, AdapterState::Paused],
        )
    }

    fn ensure_loadable(&self) -> Result<(), CoreError> {
        match self.state {
            AdapterState::Uninitialized => Ok(()),
            AdapterState::Unloaded => Err(CoreError::Load(
                "adapter was unloaded and cannot be reused".to_string(),
            )),
            _ => Err(self.invalid("load")),
        }
    }

    /// Read a ROM from disk and load it
    pub fn load(&mut self, rom_path: &Path) -> Result<(), CoreError> {
        self.ensure_loadable()?;
        let data = std::fs::read(rom_path)
            .map_err(|e| CoreError::Load(format!("{}: {}", rom_path.display(), e)))?;
        self.load_content(rom_path, data)
    }

    /// Load content already read into memory. `path` is still handed to
    /// cores that need a full path.
    pub fn load_content(&mut self, path: &Path, data: Vec<u8>) -> Result<(), CoreError> {
        self.ensure_loadable()?;

        let version = unsafe { (self.api.retro_api_version)() };
        if version != API_VERSION {
            return Err(CoreError::Load(format!(
                "{} speaks libretro API {} (expected {})",
                self.descriptor.id, version, API_VERSION
            )));
        }

        let path_c = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| CoreError::Load(format!("{}: path contains NUL", path.display())))?;

        self.call(|api| unsafe {
            (api.retro_set_environment)(context::environment_cb);
            (api.retro_set_video_refresh)(context::video_refresh_cb);
            (api.retro_set_audio_sample)(context::audio_sample_cb);
            (api.retro_set_audio_sample_batch)(context::audio_sample_batch_cb);
            (api.retro_set_input_poll)(context::input_poll_cb);
            (api.retro_set_input_state)(context::input_state_cb);
            (api.retro_init)();
        });
        self.initialized = true;

        let mut raw_info = SystemInfo::default();
        self.call(|api| unsafe { (api.retro_get_system_info)(&mut raw_info) });
        let info = CoreInfo::from_raw(&raw_info);
        debug!(
            "{} {} (need_fullpath: {})",
            info.library_name, info.library_version, info.need_fullpath
        );

        let game = GameInfo {
            path: path_c.as_ptr(),
            data: if info.need_fullpath {
                std::ptr::null()
            } else {
                data.as_ptr() as *const libc::c_void
            },
            size: if info.need_fullpath { 0 } else { data.len() },
            meta: std::ptr::null(),
        };

        let loaded = self.call(|api| unsafe { (api.retro_load_game)(&game) });
        if !loaded {
            self.call(|api| unsafe { (api.retro_deinit)() });
            self.initialized = false;
            return Err(CoreError::Load(format!(
                "{} rejected {}",
                self.descriptor.id,
                path.display()
            )));
        }

        let mut av = SystemAvInfo::default();
        self.call(|api| unsafe { (api.retro_get_system_av_info)(&mut av) });
        self.frontend.av_info = av.into();
        self.frontend.av_changed = true;

        self.info = Some(info);
        self.content = Some(LoadedContent {
            _path: path_c,
            _data: data,
        });
        self.state = AdapterState::Loaded;
        info!(
            "Loaded {} with {} ({}x{} @ {:.2} fps)",
            path.display(),
            self.descriptor.display_name,
            av.geometry.base_width,
            av.geometry.base_height,
            av.timing.fps
        );
        Ok(())
    }

    /// Run one frame with the input held at this moment
    pub fn run(&mut self) -> Result<FrameOutput, CoreError> {
        self.ensure("run", &[AdapterState::Loaded, AdapterState::Running])?;
        self.state = AdapterState::Running;

        let snapshot = self.input.snapshot();
        self.frontend.begin_frame(snapshot);
        self.call(|api| unsafe { (api.retro_run)() });
        self.frame_count += 1;

        let output = self.frontend.finish_frame();
        trace!(
            "Frame {}: duplicate={} audio_frames={}",
            self.frame_count,
            output.duplicate,
            output.audio.frames()
        );
        Ok(output)
    }

    pub fn reset(&mut self) -> Result<(), CoreError> {
        self.ensure("reset", &[AdapterState::Loaded, AdapterState::Running])?;
        self.call(|api| unsafe { (api.retro_reset)() });
        debug!("Core reset");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), CoreError> {
        self.ensure("pause", &[AdapterState::Loaded, AdapterState::Running])?;
        self.state = AdapterState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CoreError> {
        self.ensure("resume", &[AdapterState::Paused])?;
        self.state = AdapterState::Running;
        Ok(())
    }

    /// Serialize the core; the size is queried fresh every time
    pub fn save_state(&mut self) -> Result<Vec<u8>, CoreError> {
        self.ensure_active("save state")?;

        let size = self.call(|api| unsafe { (api.retro_serialize_size)() });
        if size == 0 {
            return Err(CoreError::Serialization(format!(
                "{} does not support save states",
                self.descriptor.id
            )));
        }

        let mut blob = vec![0u8; size];
        let ok = self.call(|api| unsafe {
            (api.retro_serialize)(blob.as_mut_ptr() as *mut libc::c_void, size)
        });
        if !ok {
            return Err(CoreError::Serialization("retro_serialize failed".to_string()));
        }
        Ok(blob)
    }

    /// Restore a serialized state. On failure the core is returned to the
    /// state it had before the call.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.ensure_active("load state")?;
        if data.is_empty() {
            return Err(CoreError::Serialization("empty save state".to_string()));
        }

        let backup = match self.save_state() {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!("No rollback snapshot before loading state: {}", e);
                None
            }
        };

        if self.unserialize(data) {
            return Ok(());
        }

        if let Some(backup) = backup {
            if !self.unserialize(&backup) {
                warn!("Failed to restore rollback snapshot");
            }
        }
        Err(CoreError::Serialization("retro_unserialize rejected the state".to_string()))
    }

    fn unserialize(&mut self, data: &[u8]) -> bool {
        self.call(|api| unsafe {
            (api.retro_unserialize)(data.as_ptr() as *const libc::c_void, data.len())
        })
    }

    /// Unload content and deinitialise the core. Unloading twice is a no-op.
    pub fn unload(&mut self) -> Result<(), CoreError> {
        match self.state {
            AdapterState::Uninitialized => Err(self.invalid("unload")),
            AdapterState::Unloaded => Ok(()),
            _ => {
                self.call(|api| unsafe {
                    (api.retro_unload_game)();
                    (api.retro_deinit)();
                });
                self.initialized = false;
                self.content = None;
                self.state = AdapterState::Unloaded;
                info!("Unloaded {}", self.descriptor.display_name);
                Ok(())
            }
        }
    }

    /// Update the held state of one button; applied from the next frame
    pub fn set_input(
        &mut self,
        port: usize,
        button: Button,
        pressed: bool,
    ) -> Result<(), CoreError> {
        self.ensure_active("set input")?;
        if self.input.set_button(port, button, pressed) {
            Ok(())
        } else {
            Err(CoreError::Unsupported(format!("controller port {}", port)))
        }
    }

    pub fn set_analog(
        &mut self,
        port: usize,
        stick: Stick,
        axis: Axis,
        value: i16,
    ) -> Result<(), CoreError> {
        self.ensure_active("set input")?;
        if self.input.set_analog(port, stick, axis, value) {
            Ok(())
        } else {
            Err(CoreError::Unsupported(format!("controller port {}", port)))
        }
    }

    /// Shared input state for writers on other threads
    pub fn input_handle(&self) -> Arc<InputState> {
        Arc::clone(&self.input)
    }

    pub fn set_controller_port_device(
        &mut self,
        port: usize,
        device: u32,
    ) -> Result<(), CoreError> {
        self.ensure_active("set controller")?;
        if port >= MAX_PORTS {
            return Err(CoreError::Unsupported(format!("controller port {}", port)));
        }
        self.input.set_device(port, device);
        self.call(|api| unsafe { (api.retro_set_controller_port_device)(port as u32, device) });
        debug!("Port {} device set to {}", port, device);
        Ok(())
    }

    /// Size of a memory region, 0 when the core does not expose it
    pub fn memory_size(&mut self, kind: MemoryKind) -> usize {
        if !self.initialized {
            return 0;
        }
        self.call(|api| unsafe { (api.retro_get_memory_size)(kind.raw()) })
    }

    fn memory_region(&mut self, kind: MemoryKind) -> Result<(*mut u8, usize), CoreError> {
        self.ensure_active("access memory")?;
        let (ptr, size) = self.call(|api| unsafe {
            (
                (api.retro_get_memory_data)(kind.raw()),
                (api.retro_get_memory_size)(kind.raw()),
            )
        });
        if ptr.is_null() || size == 0 {
            return Err(CoreError::Unsupported(format!("{:?} memory", kind)));
        }
        Ok((ptr as *mut u8, size))
    }

    /// Copy of a memory region
    pub fn memory(&mut self, kind: MemoryKind) -> Result<Vec<u8>, CoreError> {
        let (ptr, size) = self.memory_region(kind)?;
        // SAFETY: the core guarantees `size` readable bytes while loaded
        Ok(unsafe { std::slice::from_raw_parts(ptr, size) }.to_vec())
    }

    /// Overwrite a memory region; returns the number of bytes copied
    pub fn write_memory(&mut self, kind: MemoryKind, data: &[u8]) -> Result<usize, CoreError> {
        let (ptr, size) = self.memory_region(kind)?;
        if data.len() != size {
            warn!(
                "{:?} image is {} bytes, core expects {}",
                kind,
                data.len(),
                size
            );
        }
        let n = data.len().min(size);
        // SAFETY: as above, and `n <= size`
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, n) };
        Ok(n)
    }

    pub fn cheat_reset(&mut self) -> Result<(), CoreError> {
        self.ensure_active("reset cheats")?;
        self.call(|api| unsafe { (api.retro_cheat_reset)() });
        Ok(())
    }

    pub fn cheat_set(&mut self, index: u32, enabled: bool, code: &str) -> Result<(), CoreError> {
        self.ensure_active("set cheat")?;
        let code = CString::new(code)
            .map_err(|_| CoreError::Unsupported("cheat code contains NUL".to_string()))?;
        self.call(|api| unsafe { (api.retro_cheat_set)(index, enabled, code.as_ptr()) });
        Ok(())
    }

    pub fn region(&mut self) -> Result<Region, CoreError> {
        self.ensure_active("query region")?;
        let raw = self.call(|api| unsafe { (api.retro_get_region)() });
        Ok(if raw == REGION_PAL {
            Region::Pal
        } else {
            Region::Ntsc
        })
    }

    /// Override a core option
    pub fn set_option(&mut self, key: &str, value: &str) {
        self.frontend.env.set_option(key, value);
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.frontend.env.option_value(key)
    }

    /// Reported to the core through `GET_FASTFORWARDING`
    pub fn set_fast_forwarding(&mut self, enabled: bool) {
        self.frontend.env.fast_forwarding = enabled;
    }

    /// Reported to the core through `GET_AUDIO_VIDEO_ENABLE`
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.frontend.env.audio_enabled = enabled;
    }

    /// AV info if it changed since the last call
    pub fn take_av_change(&mut self) -> Option<AvInfo> {
        if std::mem::take(&mut self.frontend.av_changed) {
            Some(self.frontend.av_info)
        } else {
            None
        }
    }

    pub fn av_info(&self) -> AvInfo {
        self.frontend.av_info
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.frontend.pixel_format
    }

    pub fn core_info(&self) -> Option<&CoreInfo> {
        self.info.as_ref()
    }

    pub fn descriptor(&self) -> &'static CoreDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of `input_poll` callbacks received
    pub fn input_polls(&self) -> u64 {
        self.frontend.polls
    }

    /// Rotation requested through `SET_ROTATION`, in quarter turns
    pub fn rotation(&self) -> u32 {
        self.frontend.env.rotation
    }

    pub fn shutdown_requested(&self) -> bool {
        self.frontend.env.shutdown_requested
    }
}

impl fmt::Debug for CoreAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreAdapter")
            .field("core", &self.descriptor.id)
            .field("state", &self.state)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

impl Drop for CoreAdapter {
    fn drop(&mut self) {
        if matches!(
            self.state,
            AdapterState::Loaded | AdapterState::Running | AdapterState::Paused
        ) {
            if let Err(e) = self.unload() {
                warn!("Failed to unload core on drop: {}", e);
            }
        }
    }
}
