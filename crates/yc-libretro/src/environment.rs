//! `retro_environment` negotiation
//!
//! Cores ask the frontend for capabilities and report their requirements
//! through a single `(cmd, data)` callback. Everything the answers depend on
//! lives in [`EnvironmentState`], owned by the adapter for the whole session
//! so returned string pointers stay valid.

use crate::context::FrontendState;
use crate::input::MAX_PORTS;
use crate::video::PixelFormat;
use libc::{c_char, c_int, c_uint, c_void};
use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use yc_ffi::types::*;

/// `GET_AUDIO_VIDEO_ENABLE` bits
const AV_ENABLE_VIDEO: c_int = 1 << 0;
const AV_ENABLE_AUDIO: c_int = 1 << 1;

/// Host settings answered to the core
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    pub system_directory: PathBuf,
    pub save_directory: PathBuf,
    /// `RETRO_LANGUAGE_*`
    pub language: u32,
    /// Core option overrides by key
    pub options: BTreeMap<String, String>,
}

/// A core option declared through `SET_VARIABLES`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreVariable {
    pub description: String,
    pub values: Vec<String>,
}

impl CoreVariable {
    /// Parse `"Description; first|second|third"`
    pub fn parse(definition: &str) -> Option<Self> {
        let (description, values) = definition.split_once(';')?;
        let values: Vec<String> = values
            .trim_start()
            .split('|')
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(Self {
            description: description.trim().to_owned(),
            values,
        })
    }

    pub fn default_value(&self) -> &str {
        &self.values[0]
    }
}

/// Everything the environment callback reads or records
#[derive(Debug)]
pub struct EnvironmentState {
    system_dir: CString,
    save_dir: CString,
    pub language: u32,
    overrides: BTreeMap<String, String>,
    pub variables: BTreeMap<String, CoreVariable>,
    /// Backing storage for pointers handed out by `GET_VARIABLE`
    answered: BTreeMap<String, CString>,
    pub variables_dirty: bool,
    pub fast_forwarding: bool,
    pub audio_enabled: bool,
    pub rotation: u32,
    pub supports_no_game: bool,
    pub shutdown_requested: bool,
}

impl EnvironmentState {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            system_dir: path_cstring(&config.system_directory),
            save_dir: path_cstring(&config.save_directory),
            language: config.language,
            overrides: config.options.clone(),
            variables: BTreeMap::new(),
            answered: BTreeMap::new(),
            variables_dirty: false,
            fast_forwarding: false,
            audio_enabled: true,
            rotation: 0,
            supports_no_game: false,
            shutdown_requested: false,
        }
    }

    /// Override a core option; the core sees it after `GET_VARIABLE_UPDATE`
    pub fn set_option(&mut self, key: &str, value: &str) {
        if self.overrides.get(key).map(String::as_str) != Some(value) {
            self.overrides.insert(key.to_owned(), value.to_owned());
            self.variables_dirty = true;
        }
    }

    /// Current value of an option: override first, then the declared default
    pub fn option_value(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value);
        }
        self.variables.get(key).map(CoreVariable::default_value)
    }
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self::new(&EnvironmentConfig::default())
    }
}

fn path_cstring(path: &Path) -> CString {
    CString::new(path.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Dispatch one environment command.
///
/// # Safety
/// `data` must point to the type libretro documents for `cmd`.
pub(crate) unsafe fn handle(state: &mut FrontendState, cmd: c_uint, data: *mut c_void) -> bool {
    let cmd = cmd & !ENVIRONMENT_EXPERIMENTAL;
    let env = &mut state.env;

    match cmd {
        ENVIRONMENT_GET_CAN_DUPE => write(data, true),

        ENVIRONMENT_SET_PIXEL_FORMAT => {
            let Some(raw) = read::<c_uint>(data) else {
                return false;
            };
            match PixelFormat::from_raw(raw) {
                Some(format) => {
                    debug!("Core selected pixel format {:?}", format);
                    state.pixel_format = format;
                    true
                }
                None => {
                    warn!("Core requested unknown pixel format {}", raw);
                    false
                }
            }
        }

        ENVIRONMENT_SET_SYSTEM_AV_INFO => match read::<SystemAvInfo>(data) {
            Some(info) => {
                debug!(
                    "AV info changed: {}x{} @ {:.3} fps, {} Hz",
                    info.geometry.base_width,
                    info.geometry.base_height,
                    info.timing.fps,
                    info.timing.sample_rate
                );
                state.av_info = info.into();
                state.av_changed = true;
                true
            }
            None => false,
        },

        ENVIRONMENT_SET_GEOMETRY => match read::<GameGeometry>(data) {
            Some(geometry) => {
                state.av_info.geometry = geometry.into();
                state.av_changed = true;
                true
            }
            None => false,
        },

        ENVIRONMENT_GET_SYSTEM_DIRECTORY => write(data, env.system_dir.as_ptr()),
        ENVIRONMENT_GET_SAVE_DIRECTORY => write(data, env.save_dir.as_ptr()),

        ENVIRONMENT_GET_VARIABLE => get_variable(env, data as *mut Variable),

        ENVIRONMENT_SET_VARIABLES => {
            set_variables(env, data as *const Variable);
            true
        }

        ENVIRONMENT_GET_VARIABLE_UPDATE => {
            let dirty = env.variables_dirty;
            env.variables_dirty = false;
            write(data, dirty)
        }

        ENVIRONMENT_GET_LANGUAGE => write::<c_uint>(data, env.language),
        ENVIRONMENT_GET_INPUT_BITMASKS => true,
        ENVIRONMENT_GET_INPUT_MAX_USERS => write::<c_uint>(data, MAX_PORTS as c_uint),
        ENVIRONMENT_GET_CORE_OPTIONS_VERSION => write::<c_uint>(data, 0),
        ENVIRONMENT_GET_FASTFORWARDING => write(data, env.fast_forwarding),

        ENVIRONMENT_GET_AUDIO_VIDEO_ENABLE => {
            let mut flags = AV_ENABLE_VIDEO;
            if env.audio_enabled {
                flags |= AV_ENABLE_AUDIO;
            }
            write::<c_int>(data, flags)
        }

        ENVIRONMENT_SET_MESSAGE => {
            if let Some(msg) = read::<Message>(data) {
                if let Some(text) = cstr(msg.msg) {
                    info!("Core message: {}", text);
                }
            }
            true
        }

        ENVIRONMENT_SET_ROTATION => match read::<c_uint>(data) {
            Some(rotation) => {
                env.rotation = rotation % 4;
                true
            }
            None => false,
        },

        ENVIRONMENT_SET_SUPPORT_NO_GAME => match read::<bool>(data) {
            Some(supported) => {
                env.supports_no_game = supported;
                true
            }
            None => false,
        },

        ENVIRONMENT_SHUTDOWN => {
            info!("Core requested shutdown");
            env.shutdown_requested = true;
            true
        }

        // Informational; nothing to negotiate
        ENVIRONMENT_SET_INPUT_DESCRIPTORS
        | ENVIRONMENT_SET_CONTROLLER_INFO
        | ENVIRONMENT_SET_PERFORMANCE_LEVEL
        | ENVIRONMENT_SET_MEMORY_MAPS
        | ENVIRONMENT_SET_SUBSYSTEM_INFO
        | ENVIRONMENT_SET_SUPPORT_ACHIEVEMENTS => true,

        // Software rendering only
        ENVIRONMENT_SET_HW_RENDER => {
            warn!("Core requested hardware rendering, refusing");
            false
        }

        // The log callback is variadic C
        ENVIRONMENT_GET_LOG_INTERFACE => false,

        _ => {
            trace!("Unhandled environment command {}", cmd);
            false
        }
    }
}

unsafe fn write<T>(data: *mut c_void, value: T) -> bool {
    if data.is_null() {
        return false;
    }
    (data as *mut T).write_unaligned(value);
    true
}

unsafe fn read<T: Copy>(data: *mut c_void) -> Option<T> {
    if data.is_null() {
        None
    } else {
        Some((data as *const T).read_unaligned())
    }
}

unsafe fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

unsafe fn get_variable(env: &mut EnvironmentState, var: *mut Variable) -> bool {
    if var.is_null() {
        return false;
    }
    let Some(key) = cstr((*var).key) else {
        return false;
    };

    let value = match env.option_value(key) {
        Some(value) => value.to_owned(),
        None => {
            (*var).value = std::ptr::null();
            return false;
        }
    };

    let Ok(value) = CString::new(value) else {
        (*var).value = std::ptr::null();
        return false;
    };
    let slot = env.answered.entry(key.to_owned()).or_default();
    *slot = value;
    (*var).value = slot.as_ptr();
    true
}

unsafe fn set_variables(env: &mut EnvironmentState, mut var: *const Variable) {
    env.variables.clear();
    if var.is_null() {
        return;
    }
    while !(*var).key.is_null() {
        if let (Some(key), Some(definition)) = (cstr((*var).key), cstr((*var).value)) {
            match CoreVariable::parse(definition) {
                Some(parsed) => {
                    debug!("Core option {} = {:?}", key, parsed.values);
                    env.variables.insert(key.to_owned(), parsed);
                }
                None => warn!("Malformed core option {}: {:?}", key, definition),
            }
        }
        var = var.add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> FrontendState {
        let mut options = BTreeMap::new();
        options.insert("tp_palette".to_owned(), "green".to_owned());
        FrontendState::new(EnvironmentState::new(&EnvironmentConfig {
            system_directory: PathBuf::from("/bios"),
            save_directory: PathBuf::from("/saves"),
            language: 2,
            options,
        }))
    }

    #[test]
    fn test_parse_variable() {
        let var = CoreVariable::parse("Palette; grey|green|blue").unwrap();
        assert_eq!(var.description, "Palette");
        assert_eq!(var.values, vec!["grey", "green", "blue"]);
        assert_eq!(var.default_value(), "grey");
        assert!(CoreVariable::parse("no separator").is_none());
        assert!(CoreVariable::parse("Empty; ").is_none());
    }

    #[test]
    fn test_can_dupe_and_experimental_mask() {
        let mut s = state();
        let mut dupe = false;
        let cmd = ENVIRONMENT_GET_CAN_DUPE | ENVIRONMENT_EXPERIMENTAL;
        assert!(unsafe { handle(&mut s, cmd, &mut dupe as *mut bool as *mut c_void) });
        assert!(dupe);
    }

    #[test]
    fn test_pixel_format() {
        let mut s = state();
        let mut fmt: c_uint = PIXEL_FORMAT_RGB565;
        let data = &mut fmt as *mut c_uint as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_SET_PIXEL_FORMAT, data) });
        assert_eq!(s.pixel_format, PixelFormat::Rgb565);

        fmt = 7;
        assert!(!unsafe { handle(&mut s, ENVIRONMENT_SET_PIXEL_FORMAT, data) });
        assert_eq!(s.pixel_format, PixelFormat::Rgb565);
    }

    #[test]
    fn test_geometry_marks_av_change() {
        let mut s = state();
        let mut geometry = GameGeometry {
            base_width: 320,
            base_height: 240,
            max_width: 640,
            max_height: 480,
            aspect_ratio: 4.0 / 3.0,
        };
        let data = &mut geometry as *mut GameGeometry as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_SET_GEOMETRY, data) });
        assert!(s.av_changed);
        assert_eq!(s.av_info.geometry.base_width, 320);
    }

    #[test]
    fn test_directories() {
        let mut s = state();
        let mut ptr: *const c_char = std::ptr::null();
        let data = &mut ptr as *mut *const c_char as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_SYSTEM_DIRECTORY, data) });
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "/bios");
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_SAVE_DIRECTORY, data) });
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "/saves");
    }

    #[test]
    fn test_variables() {
        let mut s = state();
        let defs = [
            Variable {
                key: c"tp_palette".as_ptr(),
                value: c"Palette; grey|green|blue".as_ptr(),
            },
            Variable {
                key: c"tp_speed".as_ptr(),
                value: c"Scroll speed; 1|2|4".as_ptr(),
            },
            Variable {
                key: std::ptr::null(),
                value: std::ptr::null(),
            },
        ];
        assert!(unsafe {
            handle(&mut s, ENVIRONMENT_SET_VARIABLES, defs.as_ptr() as *mut c_void)
        });
        assert_eq!(s.env.variables.len(), 2);

        let mut query = Variable {
            key: c"tp_speed".as_ptr(),
            value: std::ptr::null(),
        };
        let data = &mut query as *mut Variable as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE, data) });
        assert_eq!(unsafe { CStr::from_ptr(query.value) }.to_str().unwrap(), "1");

        // Override wins over the declared default
        query.key = c"tp_palette".as_ptr();
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE, data) });
        assert_eq!(unsafe { CStr::from_ptr(query.value) }.to_str().unwrap(), "green");

        query.key = c"missing".as_ptr();
        assert!(!unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE, data) });
        assert!(query.value.is_null());
    }

    #[test]
    fn test_variable_update_flag() {
        let mut s = state();
        let mut updated = true;
        let data = &mut updated as *mut bool as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE_UPDATE, data) });
        assert!(!updated);

        s.env.set_option("tp_speed", "4");
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE_UPDATE, data) });
        assert!(updated);
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_VARIABLE_UPDATE, data) });
        assert!(!updated);
    }

    #[test]
    fn test_simple_queries() {
        let mut s = state();
        let mut value: c_uint = 99;
        let data = &mut value as *mut c_uint as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_LANGUAGE, data) });
        assert_eq!(value, 2);
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_INPUT_MAX_USERS, data) });
        assert_eq!(value, MAX_PORTS as c_uint);
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_CORE_OPTIONS_VERSION, data) });
        assert_eq!(value, 0);

        let mut flags: c_int = 0;
        let data = &mut flags as *mut c_int as *mut c_void;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_AUDIO_VIDEO_ENABLE, data) });
        assert_eq!(flags, 3);
        s.env.audio_enabled = false;
        assert!(unsafe { handle(&mut s, ENVIRONMENT_GET_AUDIO_VIDEO_ENABLE, data) });
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_recorded_settings() {
        let mut s = state();
        let mut rotation: c_uint = 1;
        assert!(unsafe {
            handle(
                &mut s,
                ENVIRONMENT_SET_ROTATION,
                &mut rotation as *mut c_uint as *mut c_void,
            )
        });
        assert_eq!(s.env.rotation, 1);

        let mut no_game = true;
        assert!(unsafe {
            handle(
                &mut s,
                ENVIRONMENT_SET_SUPPORT_NO_GAME,
                &mut no_game as *mut bool as *mut c_void,
            )
        });
        assert!(s.env.supports_no_game);

        assert!(unsafe { handle(&mut s, ENVIRONMENT_SHUTDOWN, std::ptr::null_mut()) });
        assert!(s.env.shutdown_requested);
    }

    #[test]
    fn test_refused_commands() {
        let mut s = state();
        let null = std::ptr::null_mut();
        assert!(!unsafe { handle(&mut s, ENVIRONMENT_SET_HW_RENDER, null) });
        assert!(!unsafe { handle(&mut s, ENVIRONMENT_GET_LOG_INTERFACE, null) });
        assert!(!unsafe { handle(&mut s, 0xBEEF, null) });
        // Queries need somewhere to write
        assert!(!unsafe { handle(&mut s, ENVIRONMENT_GET_CAN_DUPE, null) });
        assert!(unsafe { handle(&mut s, ENVIRONMENT_SET_INPUT_DESCRIPTORS, null) });
    }
}
