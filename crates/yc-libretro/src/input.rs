//! Controller input held between frames
//!
//! The host writes button and stick changes into a shared [`InputState`] at
//! any time, from any thread. At the start of each frame the adapter copies
//! it into an [`InputSnapshot`]; the core's `input_state` callback only ever
//! reads that frozen copy.

use bitflags::bitflags;
use parking_lot::Mutex;
use yc_core::config::PortDevice;
use yc_ffi::types::*;

/// Number of controller ports the frontend exposes
pub const MAX_PORTS: usize = 4;

bitflags! {
    /// RetroPad buttons, bit N is joypad id N
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JoypadButtons: u16 {
        const B      = 1 << DEVICE_ID_JOYPAD_B;
        const Y      = 1 << DEVICE_ID_JOYPAD_Y;
        const SELECT = 1 << DEVICE_ID_JOYPAD_SELECT;
        const START  = 1 << DEVICE_ID_JOYPAD_START;
        const UP     = 1 << DEVICE_ID_JOYPAD_UP;
        const DOWN   = 1 << DEVICE_ID_JOYPAD_DOWN;
        const LEFT   = 1 << DEVICE_ID_JOYPAD_LEFT;
        const RIGHT  = 1 << DEVICE_ID_JOYPAD_RIGHT;
        const A      = 1 << DEVICE_ID_JOYPAD_A;
        const X      = 1 << DEVICE_ID_JOYPAD_X;
        const L      = 1 << DEVICE_ID_JOYPAD_L;
        const R      = 1 << DEVICE_ID_JOYPAD_R;
        const L2     = 1 << DEVICE_ID_JOYPAD_L2;
        const R2     = 1 << DEVICE_ID_JOYPAD_R2;
        const L3     = 1 << DEVICE_ID_JOYPAD_L3;
        const R3     = 1 << DEVICE_ID_JOYPAD_R3;
    }
}

/// A single RetroPad button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    B,
    Y,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
    A,
    X,
    L,
    R,
    L2,
    R2,
    L3,
    R3,
}

impl Button {
    pub const ALL: [Button; 16] = [
        Button::B,
        Button::Y,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::X,
        Button::L,
        Button::R,
        Button::L2,
        Button::R2,
        Button::L3,
        Button::R3,
    ];

    /// libretro joypad id
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn flag(self) -> JoypadButtons {
        JoypadButtons::from_bits_retain(1 << self.id())
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }
}

/// libretro device type for a configured port device
pub fn device_id(device: PortDevice) -> u32 {
    match device {
        PortDevice::None => DEVICE_NONE,
        PortDevice::Joypad => DEVICE_JOYPAD,
        PortDevice::Analog => DEVICE_ANALOG,
    }
}

/// Analog stick on a RetroPad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    Left,
    Right,
}

/// Stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// State of one controller port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortState {
    pub buttons: JoypadButtons,
    /// `[stick][axis]`, full i16 range, 0 = centre
    pub analog: [[i16; 2]; 2],
    /// libretro device type plugged into the port
    pub device: u32,
}

impl Default for PortState {
    fn default() -> Self {
        Self {
            buttons: JoypadButtons::empty(),
            analog: [[0; 2]; 2],
            device: DEVICE_JOYPAD,
        }
    }
}

impl PortState {
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons.set(button.flag(), pressed);
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.contains(button.flag())
    }

    pub fn set_analog(&mut self, stick: Stick, axis: Axis, value: i16) {
        self.analog[stick as usize][axis as usize] = value;
    }
}

/// Frozen input for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pub ports: [PortState; MAX_PORTS],
}

impl InputSnapshot {
    /// Answer a core `input_state` query
    pub fn query(&self, port: u32, device: u32, index: u32, id: u32) -> i16 {
        let Some(state) = self.ports.get(port as usize) else {
            return 0;
        };
        if state.device == DEVICE_NONE {
            return 0;
        }

        match device & DEVICE_MASK {
            DEVICE_JOYPAD => {
                if id == DEVICE_ID_JOYPAD_MASK {
                    state.buttons.bits() as i16
                } else if id <= DEVICE_ID_JOYPAD_R3 {
                    i16::from(state.buttons.bits() & (1 << id) != 0)
                } else {
                    0
                }
            }
            DEVICE_ANALOG => match (index, id) {
                (
                    DEVICE_INDEX_ANALOG_LEFT | DEVICE_INDEX_ANALOG_RIGHT,
                    DEVICE_ID_ANALOG_X | DEVICE_ID_ANALOG_Y,
                ) => state.analog[index as usize][id as usize],
                _ => 0,
            },
            _ => 0,
        }
    }
}

/// Input state shared between the host and the frame loop
#[derive(Debug, Default)]
pub struct InputState {
    inner: Mutex<InputSnapshot>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&self, port: usize, button: Button, pressed: bool) -> bool {
        let mut inner = self.inner.lock();
        match inner.ports.get_mut(port) {
            Some(state) => {
                state.set_button(button, pressed);
                true
            }
            None => false,
        }
    }

    pub fn set_buttons(&self, port: usize, buttons: JoypadButtons) -> bool {
        let mut inner = self.inner.lock();
        match inner.ports.get_mut(port) {
            Some(state) => {
                state.buttons = buttons;
                true
            }
            None => false,
        }
    }

    pub fn set_analog(&self, port: usize, stick: Stick, axis: Axis, value: i16) -> bool {
        let mut inner = self.inner.lock();
        match inner.ports.get_mut(port) {
            Some(state) => {
                state.set_analog(stick, axis, value);
                true
            }
            None => false,
        }
    }

    pub fn set_device(&self, port: usize, device: u32) -> bool {
        let mut inner = self.inner.lock();
        match inner.ports.get_mut(port) {
            Some(state) => {
                state.device = device;
                true
            }
            None => false,
        }
    }

    /// Release every button and centre every stick, keeping devices
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for state in inner.ports.iter_mut() {
            state.buttons = JoypadButtons::empty();
            state.analog = [[0; 2]; 2];
        }
    }

    /// Copy the current state for one frame
    pub fn snapshot(&self) -> InputSnapshot {
        *self.inner.lock()
    }
}
