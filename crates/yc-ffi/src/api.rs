//! Function table for one libretro core
//!
//! Every core, whether linked from a prefixed static archive or implemented
//! in Rust, is reached through a [`CoreApi`]. The table has the fixed shape of
//! the libretro entry points; only the symbols behind it differ.

use crate::types::*;
use libc::{c_char, c_uint, c_void, size_t};

/// libretro entry points of a single core
#[derive(Clone, Copy)]
pub struct CoreApi {
    pub retro_set_environment: unsafe extern "C" fn(EnvironmentFn),
    pub retro_set_video_refresh: unsafe extern "C" fn(VideoRefreshFn),
    pub retro_set_audio_sample: unsafe extern "C" fn(AudioSampleFn),
    pub retro_set_audio_sample_batch: unsafe extern "C" fn(AudioSampleBatchFn),
    pub retro_set_input_poll: unsafe extern "C" fn(InputPollFn),
    pub retro_set_input_state: unsafe extern "C" fn(InputStateFn),

    pub retro_init: unsafe extern "C" fn(),
    pub retro_deinit: unsafe extern "C" fn(),
    pub retro_api_version: unsafe extern "C" fn() -> c_uint,
    pub retro_get_system_info: unsafe extern "C" fn(*mut SystemInfo),
    pub retro_get_system_av_info: unsafe extern "C" fn(*mut SystemAvInfo),
    pub retro_set_controller_port_device: unsafe extern "C" fn(c_uint, c_uint),

    pub retro_reset: unsafe extern "C" fn(),
    pub retro_run: unsafe extern "C" fn(),

    pub retro_serialize_size: unsafe extern "C" fn() -> size_t,
    pub retro_serialize: unsafe extern "C" fn(*mut c_void, size_t) -> bool,
    pub retro_unserialize: unsafe extern "C" fn(*const c_void, size_t) -> bool,

    pub retro_cheat_reset: unsafe extern "C" fn(),
    pub retro_cheat_set: unsafe extern "C" fn(c_uint, bool, *const c_char),

    pub retro_load_game: unsafe extern "C" fn(*const GameInfo) -> bool,
    pub retro_load_game_special: unsafe extern "C" fn(c_uint, *const GameInfo, size_t) -> bool,
    pub retro_unload_game: unsafe extern "C" fn(),

    pub retro_get_region: unsafe extern "C" fn() -> c_uint,
    pub retro_get_memory_data: unsafe extern "C" fn(c_uint) -> *mut c_void,
    pub retro_get_memory_size: unsafe extern "C" fn(c_uint) -> size_t,
}

impl std::fmt::Debug for CoreApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreApi")
            .field("retro_init", &(self.retro_init as *const ()))
            .field("retro_run", &(self.retro_run as *const ()))
            .finish_non_exhaustive()
    }
}
