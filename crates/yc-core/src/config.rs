//! Configuration system for the yearn frontend

use crate::error::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Slowest supported emulation speed multiplier
pub const MIN_SPEED: f32 = 0.25;

/// Fastest supported emulation speed multiplier
pub const MAX_SPEED: f32 = 8.0;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub emulation: EmulationConfig,
    pub audio: AudioConfig,
    pub input: InputConfig,
    pub rewind: RewindConfig,
    pub cores: CoreConfig,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// General frontend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub start_paused: bool,
    /// Write a state to the auto-save slot when a session stops
    pub auto_save_state: bool,
}

/// Frame loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    /// Speed multiplier, clamped to `MIN_SPEED..=MAX_SPEED`
    pub speed: f32,
    /// Upper bound on frames run in a single tick after a stall, at 1x.
    /// Scaled by the speed multiplier when fast-forwarding.
    pub max_catch_up_frames: u32,
    pub mute_when_fast_forwarding: bool,
}

/// Audio settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enable: bool,
    pub volume: f32,
    pub buffer_duration_ms: u32,
}

/// Input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct InputConfig {
    /// Device plugged into each port, in port order. Ports past the end of
    /// the list keep the core's default device.
    pub port_devices: Vec<PortDevice>,
}

/// Device type reported to the core for a controller port
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum PortDevice {
    None,
    #[default]
    Joypad,
    Analog,
}

/// Rewind buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    pub enabled: bool,
    /// Capture a snapshot every this many frames
    pub interval_frames: u32,
    pub max_states: usize,
    pub max_memory_mb: usize,
}

/// Core selection and core option overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct CoreConfig {
    /// Preferred core id per system short name (e.g. `snes = "bsnes"`)
    pub preferred: BTreeMap<String, String>,
    /// Core option overrides answered through `GET_VARIABLE`
    pub options: BTreeMap<String, String>,
    pub language: Language,
}

/// Language reported to cores
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    English,
    Japanese,
    French,
    Spanish,
    German,
    Italian,
    Dutch,
    PortugueseBrazil,
    PortuguesePortugal,
    Russian,
    Korean,
    ChineseTraditional,
    ChineseSimplified,
}

impl Language {
    /// libretro `RETRO_LANGUAGE_*` value
    pub fn retro_id(self) -> u32 {
        self as u32
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Battery RAM files (`<game-id>.sav`)
    pub saves: PathBuf,
    /// Save-state slots (`<game-id>/slot<N>.state`)
    pub save_states: PathBuf,
    /// BIOS and companion files handed to cores
    pub system: PathBuf,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            start_paused: false,
            auto_save_state: false,
        }
    }
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            max_catch_up_frames: 4,
            mute_when_fast_forwarding: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enable: true,
            volume: 1.0,
            buffer_duration_ms: 100,
        }
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_frames: 2,
            max_states: 300,
            max_memory_mb: 64,
        }
    }
}

impl RewindConfig {
    /// Byte budget for the rewind history
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yearn");

        Self::with_base(&base)
    }
}

impl PathConfig {
    /// Standard layout rooted at `base`
    pub fn with_base(base: &Path) -> Self {
        Self {
            saves: base.join("Saves"),
            save_states: base.join("SaveStates"),
            system: base.join("System"),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_to_file: false,
            log_path: PathBuf::from("yearn.log"),
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| EmulatorError::Config(e.to_string()))?;
        config.sanitize();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| EmulatorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yearn")
            .join("config.toml")
    }

    /// Clamp values a hand-edited file may have pushed out of range
    pub fn sanitize(&mut self) {
        let speed = self.emulation.speed;
        self.emulation.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        self.emulation.max_catch_up_frames = self.emulation.max_catch_up_frames.max(1);
        self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
        self.rewind.interval_frames = self.rewind.interval_frames.max(1);
    }
}
