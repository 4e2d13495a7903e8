//! libretro ABI constants and `#[repr(C)]` structures
//!
//! Mirrors the subset of `libretro.h` the frontend speaks. Values must not
//! change; they are the wire contract with every core.

use libc::{c_char, c_int, c_uint, c_void, size_t};

/// `RETRO_API_VERSION`
pub const API_VERSION: c_uint = 1;

// Pixel formats
pub const PIXEL_FORMAT_0RGB1555: c_uint = 0;
pub const PIXEL_FORMAT_XRGB8888: c_uint = 1;
pub const PIXEL_FORMAT_RGB565: c_uint = 2;

// Device types
pub const DEVICE_TYPE_SHIFT: c_uint = 8;
pub const DEVICE_MASK: c_uint = (1 << DEVICE_TYPE_SHIFT) - 1;
pub const DEVICE_NONE: c_uint = 0;
pub const DEVICE_JOYPAD: c_uint = 1;
pub const DEVICE_MOUSE: c_uint = 2;
pub const DEVICE_KEYBOARD: c_uint = 3;
pub const DEVICE_LIGHTGUN: c_uint = 4;
pub const DEVICE_ANALOG: c_uint = 5;
pub const DEVICE_POINTER: c_uint = 6;

// Joypad ids
pub const DEVICE_ID_JOYPAD_B: c_uint = 0;
pub const DEVICE_ID_JOYPAD_Y: c_uint = 1;
pub const DEVICE_ID_JOYPAD_SELECT: c_uint = 2;
pub const DEVICE_ID_JOYPAD_START: c_uint = 3;
pub const DEVICE_ID_JOYPAD_UP: c_uint = 4;
pub const DEVICE_ID_JOYPAD_DOWN: c_uint = 5;
pub const DEVICE_ID_JOYPAD_LEFT: c_uint = 6;
pub const DEVICE_ID_JOYPAD_RIGHT: c_uint = 7;
pub const DEVICE_ID_JOYPAD_A: c_uint = 8;
pub const DEVICE_ID_JOYPAD_X: c_uint = 9;
pub const DEVICE_ID_JOYPAD_L: c_uint = 10;
pub const DEVICE_ID_JOYPAD_R: c_uint = 11;
pub const DEVICE_ID_JOYPAD_L2: c_uint = 12;
pub const DEVICE_ID_JOYPAD_R2: c_uint = 13;
pub const DEVICE_ID_JOYPAD_L3: c_uint = 14;
pub const DEVICE_ID_JOYPAD_R3: c_uint = 15;
/// Query all joypad buttons at once as a bitmask (needs `GET_INPUT_BITMASKS`)
pub const DEVICE_ID_JOYPAD_MASK: c_uint = 256;

// Analog
pub const DEVICE_INDEX_ANALOG_LEFT: c_uint = 0;
pub const DEVICE_INDEX_ANALOG_RIGHT: c_uint = 1;
pub const DEVICE_ID_ANALOG_X: c_uint = 0;
pub const DEVICE_ID_ANALOG_Y: c_uint = 1;

// Memory regions
pub const MEMORY_SAVE_RAM: c_uint = 0;
pub const MEMORY_RTC: c_uint = 1;
pub const MEMORY_SYSTEM_RAM: c_uint = 2;
pub const MEMORY_VIDEO_RAM: c_uint = 3;

// Regions
pub const REGION_NTSC: c_uint = 0;
pub const REGION_PAL: c_uint = 1;

/// Marks a command as experimental; masked off before dispatch
pub const ENVIRONMENT_EXPERIMENTAL: c_uint = 0x10000;
/// Marks a frontend-private command
pub const ENVIRONMENT_PRIVATE: c_uint = 0x20000;

// Environment commands
pub const ENVIRONMENT_SET_ROTATION: c_uint = 1;
pub const ENVIRONMENT_GET_OVERSCAN: c_uint = 2;
pub const ENVIRONMENT_GET_CAN_DUPE: c_uint = 3;
pub const ENVIRONMENT_SET_MESSAGE: c_uint = 6;
pub const ENVIRONMENT_SHUTDOWN: c_uint = 7;
pub const ENVIRONMENT_SET_PERFORMANCE_LEVEL: c_uint = 8;
pub const ENVIRONMENT_GET_SYSTEM_DIRECTORY: c_uint = 9;
pub const ENVIRONMENT_SET_PIXEL_FORMAT: c_uint = 10;
pub const ENVIRONMENT_SET_INPUT_DESCRIPTORS: c_uint = 11;
pub const ENVIRONMENT_SET_KEYBOARD_CALLBACK: c_uint = 12;
pub const ENVIRONMENT_SET_DISK_CONTROL_INTERFACE: c_uint = 13;
pub const ENVIRONMENT_SET_HW_RENDER: c_uint = 14;
pub const ENVIRONMENT_GET_VARIABLE: c_uint = 15;
pub const ENVIRONMENT_SET_VARIABLES: c_uint = 16;
pub const ENVIRONMENT_GET_VARIABLE_UPDATE: c_uint = 17;
pub const ENVIRONMENT_SET_SUPPORT_NO_GAME: c_uint = 18;
pub const ENVIRONMENT_GET_LIBRETRO_PATH: c_uint = 19;
pub const ENVIRONMENT_SET_FRAME_TIME_CALLBACK: c_uint = 21;
pub const ENVIRONMENT_SET_AUDIO_CALLBACK: c_uint = 22;
pub const ENVIRONMENT_GET_RUMBLE_INTERFACE: c_uint = 23;
pub const ENVIRONMENT_GET_INPUT_DEVICE_CAPABILITIES: c_uint = 24;
pub const ENVIRONMENT_GET_LOG_INTERFACE: c_uint = 27;
pub const ENVIRONMENT_GET_PERF_INTERFACE: c_uint = 28;
pub const ENVIRONMENT_GET_CORE_ASSETS_DIRECTORY: c_uint = 30;
pub const ENVIRONMENT_GET_SAVE_DIRECTORY: c_uint = 31;
pub const ENVIRONMENT_SET_SYSTEM_AV_INFO: c_uint = 32;
pub const ENVIRONMENT_SET_PROC_ADDRESS_CALLBACK: c_uint = 33;
pub const ENVIRONMENT_SET_SUBSYSTEM_INFO: c_uint = 34;
pub const ENVIRONMENT_SET_CONTROLLER_INFO: c_uint = 35;
pub const ENVIRONMENT_SET_MEMORY_MAPS: c_uint = 36;
pub const ENVIRONMENT_SET_GEOMETRY: c_uint = 37;
pub const ENVIRONMENT_GET_USERNAME: c_uint = 38;
pub const ENVIRONMENT_GET_LANGUAGE: c_uint = 39;
pub const ENVIRONMENT_SET_SUPPORT_ACHIEVEMENTS: c_uint = 42;
pub const ENVIRONMENT_SET_SERIALIZATION_QUIRKS: c_uint = 44;
pub const ENVIRONMENT_GET_AUDIO_VIDEO_ENABLE: c_uint = 47;
pub const ENVIRONMENT_GET_FASTFORWARDING: c_uint = 49;
pub const ENVIRONMENT_GET_INPUT_BITMASKS: c_uint = 51;
pub const ENVIRONMENT_GET_CORE_OPTIONS_VERSION: c_uint = 52;
pub const ENVIRONMENT_GET_INPUT_MAX_USERS: c_uint = 61;

/// `RETRO_HW_FRAME_BUFFER_VALID`: video refresh sentinel for GPU-rendered frames
pub const HW_FRAME_BUFFER_VALID: *const c_void = usize::MAX as *const c_void;

/// `retro_game_info`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GameInfo {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: size_t,
    pub meta: *const c_char,
}

/// `retro_system_info`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            library_name: std::ptr::null(),
            library_version: std::ptr::null(),
            valid_extensions: std::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        }
    }
}

/// `retro_game_geometry`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameGeometry {
    pub base_width: c_uint,
    pub base_height: c_uint,
    pub max_width: c_uint,
    pub max_height: c_uint,
    pub aspect_ratio: f32,
}

/// `retro_system_timing`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

/// `retro_system_av_info`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemAvInfo {
    pub geometry: GameGeometry,
    pub timing: SystemTiming,
}

/// `retro_variable`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Variable {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// `retro_message`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Message {
    pub msg: *const c_char,
    pub frames: c_uint,
}

/// `retro_log_level`
pub type LogLevel = c_int;

pub type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
pub type VideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: size_t);
pub type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
pub type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: size_t) -> size_t;
pub type InputPollFn = unsafe extern "C" fn();
pub type InputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;
