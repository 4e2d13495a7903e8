//! Core registry
//!
//! Every available core self-registers a [`CoreDescriptor`] through
//! [`inventory::submit!`]. The session looks cores up by id or by the system
//! a game targets, without a central list.

use std::fmt;
use tracing::warn;
use yc_core::CoreError;
use yc_ffi::CoreApi;

/// Game systems the frontend knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum System {
    Nes,
    Snes,
    GameBoy,
    GameBoyColor,
    GameBoyAdvance,
    NintendoDs,
    Nintendo64,
    PlayStation,
    Genesis,
    /// Built-in diagnostic core
    TestPattern,
}

impl System {
    pub const ALL: [System; 10] = [
        System::Nes,
        System::Snes,
        System::GameBoy,
        System::GameBoyColor,
        System::GameBoyAdvance,
        System::NintendoDs,
        System::Nintendo64,
        System::PlayStation,
        System::Genesis,
        System::TestPattern,
    ];

    /// Guess the system from a ROM file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "nes" | "fds" | "unf" => Some(Self::Nes),
            "sfc" | "smc" => Some(Self::Snes),
            "gb" => Some(Self::GameBoy),
            "gbc" => Some(Self::GameBoyColor),
            "gba" => Some(Self::GameBoyAdvance),
            "nds" => Some(Self::NintendoDs),
            "n64" | "z64" | "v64" => Some(Self::Nintendo64),
            "cue" | "pbp" | "chd" => Some(Self::PlayStation),
            "md" | "gen" | "smd" => Some(Self::Genesis),
            "tp" => Some(Self::TestPattern),
            _ => None,
        }
    }

    /// Key used in configuration (`[cores.preferred]`)
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Nes => "nes",
            Self::Snes => "snes",
            Self::GameBoy => "gb",
            Self::GameBoyColor => "gbc",
            Self::GameBoyAdvance => "gba",
            Self::NintendoDs => "nds",
            Self::Nintendo64 => "n64",
            Self::PlayStation => "psx",
            Self::Genesis => "genesis",
            Self::TestPattern => "testpattern",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.short_name() == name)
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Describes one available libretro core
pub struct CoreDescriptor {
    /// Stable id (e.g. "gambatte")
    pub id: &'static str,
    pub display_name: &'static str,
    pub systems: &'static [System],
    /// Builds the core's function table
    pub api: fn() -> CoreApi,
}

impl CoreDescriptor {
    pub const fn new(
        id: &'static str,
        display_name: &'static str,
        systems: &'static [System],
        api: fn() -> CoreApi,
    ) -> Self {
        Self {
            id,
            display_name,
            systems,
            api,
        }
    }

    pub fn supports(&self, system: System) -> bool {
        self.systems.contains(&system)
    }
}

impl fmt::Debug for CoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("systems", &self.systems)
            .finish()
    }
}

inventory::collect!(CoreDescriptor);

/// Set of cores a session may choose from
#[derive(Debug, Clone, Default)]
pub struct CoreRegistry {
    cores: Vec<&'static CoreDescriptor>,
}

impl CoreRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every core linked into the binary, sorted by id
    pub fn builtin() -> Self {
        let mut cores: Vec<_> = inventory::iter::<CoreDescriptor>.into_iter().collect();
        cores.sort_by_key(|c| c.id);
        Self { cores }
    }

    /// Add a core, replacing any existing core with the same id
    pub fn register(&mut self, descriptor: &'static CoreDescriptor) {
        self.cores.retain(|c| c.id != descriptor.id);
        self.cores.push(descriptor);
    }

    pub fn find(&self, id: &str) -> Option<&'static CoreDescriptor> {
        self.cores.iter().copied().find(|c| c.id == id)
    }

    /// Pick the core for `system`, honouring `preferred` when it can run it
    pub fn for_system(
        &self,
        system: System,
        preferred: Option<&str>,
    ) -> Result<&'static CoreDescriptor, CoreError> {
        if let Some(id) = preferred {
            match self.find(id) {
                Some(core) if core.supports(system) => return Ok(core),
                Some(_) => warn!("Preferred core {} does not support {}, ignoring", id, system),
                None => warn!("Preferred core {} is not available, ignoring", id),
            }
        }

        self.cores
            .iter()
            .copied()
            .find(|c| c.supports(system))
            .ok_or_else(|| CoreError::NotFound(system.short_name().to_string()))
    }

    pub fn all(&self) -> &[&'static CoreDescriptor] {
        &self.cores
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}
