//! Statically linked, symbol-prefixed cores
//!
//! The core build renames every `retro_*` export of a core to
//! `<prefix>_retro_*` so several cores can share one binary. Each enabled
//! cargo feature declares one such core and exposes its [`CoreApi`].

/// Declare the prefixed entry points of one core and build its function table.
macro_rules! static_core {
    ($module:ident, $prefix:literal) => {
        pub mod $module {
            use crate::api::CoreApi;
            use crate::types::*;
            use libc::{c_char, c_uint, c_void, size_t};

            extern "C" {
                #[link_name = concat!($prefix, "_retro_set_environment")]
                fn retro_set_environment(cb: EnvironmentFn);
                #[link_name = concat!($prefix, "_retro_set_video_refresh")]
                fn retro_set_video_refresh(cb: VideoRefreshFn);
                #[link_name = concat!($prefix, "_retro_set_audio_sample")]
                fn retro_set_audio_sample(cb: AudioSampleFn);
                #[link_name = concat!($prefix, "_retro_set_audio_sample_batch")]
                fn retro_set_audio_sample_batch(cb: AudioSampleBatchFn);
                #[link_name = concat!($prefix, "_retro_set_input_poll")]
                fn retro_set_input_poll(cb: InputPollFn);
                #[link_name = concat!($prefix, "_retro_set_input_state")]
                fn retro_set_input_state(cb: InputStateFn);
                #[link_name = concat!($prefix, "_retro_init")]
                fn retro_init();
                #[link_name = concat!($prefix, "_retro_deinit")]
                fn retro_deinit();
                #[link_name = concat!($prefix, "_retro_api_version")]
                fn retro_api_version() -> c_uint;
                #[link_name = concat!($prefix, "_retro_get_system_info")]
                fn retro_get_system_info(info: *mut SystemInfo);
                #[link_name = concat!($prefix, "_retro_get_system_av_info")]
                fn retro_get_system_av_info(info: *mut SystemAvInfo);
                #[link_name = concat!($prefix, "_retro_set_controller_port_device")]
                fn retro_set_controller_port_device(port: c_uint, device: c_uint);
                #[link_name = concat!($prefix, "_retro_reset")]
                fn retro_reset();
                #[link_name = concat!($prefix, "_retro_run")]
                fn retro_run();
                #[link_name = concat!($prefix, "_retro_serialize_size")]
                fn retro_serialize_size() -> size_t;
                #[link_name = concat!($prefix, "_retro_serialize")]
                fn retro_serialize(data: *mut c_void, size: size_t) -> bool;
                #[link_name = concat!($prefix, "_retro_unserialize")]
                fn retro_unserialize(data: *const c_void, size: size_t) -> bool;
                #[link_name = concat!($prefix, "_retro_cheat_reset")]
                fn retro_cheat_reset();
                #[link_name = concat!($prefix, "_retro_cheat_set")]
                fn retro_cheat_set(index: c_uint, enabled: bool, code: *const c_char);
                #[link_name = concat!($prefix, "_retro_load_game")]
                fn retro_load_game(game: *const GameInfo) -> bool;
                #[link_name = concat!($prefix, "_retro_load_game_special")]
                fn retro_load_game_special(
                    game_type: c_uint,
                    info: *const GameInfo,
                    num_info: size_t,
                ) -> bool;
                #[link_name = concat!($prefix, "_retro_unload_game")]
                fn retro_unload_game();
                #[link_name = concat!($prefix, "_retro_get_region")]
                fn retro_get_region() -> c_uint;
                #[link_name = concat!($prefix, "_retro_get_memory_data")]
                fn retro_get_memory_data(id: c_uint) -> *mut c_void;
                #[link_name = concat!($prefix, "_retro_get_memory_size")]
                fn retro_get_memory_size(id: c_uint) -> size_t;
            }

            /// Function table for this core
            pub fn api() -> CoreApi {
                CoreApi {
                    retro_set_environment,
                    retro_set_video_refresh,
                    retro_set_audio_sample,
                    retro_set_audio_sample_batch,
                    retro_set_input_poll,
                    retro_set_input_state,
                    retro_init,
                    retro_deinit,
                    retro_api_version,
                    retro_get_system_info,
                    retro_get_system_av_info,
                    retro_set_controller_port_device,
                    retro_reset,
                    retro_run,
                    retro_serialize_size,
                    retro_serialize,
                    retro_unserialize,
                    retro_cheat_reset,
                    retro_cheat_set,
                    retro_load_game,
                    retro_load_game_special,
                    retro_unload_game,
                    retro_get_region,
                    retro_get_memory_data,
                    retro_get_memory_size,
                }
            }
        }
    };
}

// FCEUmm (NES)
#[cfg(feature = "fceumm")]
static_core!(fceumm, "fceumm");

// bsnes (SNES)
#[cfg(feature = "bsnes")]
static_core!(bsnes, "bsnes");

// Gambatte (GB/GBC)
#[cfg(feature = "gambatte")]
static_core!(gambatte, "gambatte");

// mGBA (GBA)
#[cfg(feature = "mgba")]
static_core!(mgba, "mgba");

// ClownMDEmu (Genesis/Mega Drive)
#[cfg(feature = "clownmdemu")]
static_core!(clownmdemu, "clownmdemu");

// melonDS (NDS)
#[cfg(feature = "melonds")]
static_core!(melonds, "melonds");

// Mupen64Plus-Next (N64)
#[cfg(feature = "mupen64plus_next")]
static_core!(mupen64plus_next, "mupen64plus_next");

// PCSX ReARMed (PS1)
#[cfg(feature = "pcsx_rearmed")]
static_core!(pcsx_rearmed, "pcsx_rearmed");
