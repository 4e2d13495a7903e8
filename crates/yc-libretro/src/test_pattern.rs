//! Built-in software core
//!
//! Draws a scrolling gradient with a square the first pad moves around, and
//! plays a square-wave tone. It speaks the same C ABI as the linked cores so
//! the whole bridge can be exercised without any emulator archive.
//!
//! Core state is thread-local: each thread owns an independent instance.

use crate::registry::{CoreDescriptor, System};
use libc::{c_char, c_uint, c_void, size_t};
use std::cell::RefCell;
use std::ffi::CStr;
use yc_ffi::types::*;
use yc_ffi::CoreApi;

pub const WIDTH: u32 = 160;
pub const HEIGHT: u32 = 144;
pub const FPS: f64 = 60.0;
pub const SAMPLE_RATE: f64 = 44100.0;
/// Stereo frames emitted per `retro_run`
pub const AUDIO_FRAMES: usize = 735;
pub const SAVE_RAM_SIZE: usize = 2048;
pub const SYSTEM_RAM_SIZE: usize = 256;

/// Core option: `disabled` hides battery RAM from the frontend
pub const SAVE_RAM_OPTION: &str = "tp_save_ram";
const SAVE_RAM_KEY: &CStr = c"tp_save_ram";

const STATE_MAGIC: &[u8; 4] = b"YCTP";
/// magic, frame counter, x, y, save RAM
pub const STATE_SIZE: usize = 4 + 8 + 4 + 4 + SAVE_RAM_SIZE;

const SQUARE: i32 = 8;

#[derive(Default)]
struct Callbacks {
    environment: Option<EnvironmentFn>,
    video: Option<VideoRefreshFn>,
    audio_sample: Option<AudioSampleFn>,
    audio_batch: Option<AudioSampleBatchFn>,
    input_poll: Option<InputPollFn>,
    input_state: Option<InputStateFn>,
}

struct Pattern {
    cb: Callbacks,
    initialized: bool,
    loaded: bool,
    can_dupe: bool,
    seed: u8,
    frame: u64,
    x: i32,
    y: i32,
    devices: [c_uint; 4],
    cheats: usize,
    /// Save RAM is reported to the frontend
    battery: bool,
    save_ram: Vec<u8>,
    system_ram: Vec<u8>,
    framebuffer: Vec<u32>,
    audio: Vec<i16>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            cb: Callbacks::default(),
            initialized: false,
            loaded: false,
            can_dupe: false,
            seed: 0,
            frame: 0,
            x: (WIDTH as i32 - SQUARE) / 2,
            y: (HEIGHT as i32 - SQUARE) / 2,
            devices: [DEVICE_JOYPAD; 4],
            cheats: 0,
            battery: true,
            save_ram: vec![0; SAVE_RAM_SIZE],
            system_ram: vec![0; SYSTEM_RAM_SIZE],
            framebuffer: vec![0; (WIDTH * HEIGHT) as usize],
            audio: vec![0; AUDIO_FRAMES * 2],
        }
    }
}

impl Pattern {
    fn reset_machine(&mut self) {
        self.frame = 0;
        self.x = (WIDTH as i32 - SQUARE) / 2;
        self.y = (HEIGHT as i32 - SQUARE) / 2;
        self.system_ram.fill(0);
    }

    fn step(&mut self, buttons: u16) {
        let pressed = |id: c_uint| buttons & (1 << id) != 0;
        if pressed(DEVICE_ID_JOYPAD_LEFT) {
            self.x -= 1;
        }
        if pressed(DEVICE_ID_JOYPAD_RIGHT) {
            self.x += 1;
        }
        if pressed(DEVICE_ID_JOYPAD_UP) {
            self.y -= 1;
        }
        if pressed(DEVICE_ID_JOYPAD_DOWN) {
            self.y += 1;
        }
        self.x = self.x.clamp(0, WIDTH as i32 - SQUARE);
        self.y = self.y.clamp(0, HEIGHT as i32 - SQUARE);

        // Battery RAM slowly fills with a pattern derived from the content
        let index = (self.frame as usize) % SAVE_RAM_SIZE;
        self.save_ram[index] = (self.frame as u8) ^ self.seed;
        if pressed(DEVICE_ID_JOYPAD_A) {
            self.save_ram[0] = self.save_ram[0].wrapping_add(1);
        }

        self.frame += 1;
        self.system_ram[..8].copy_from_slice(&self.frame.to_le_bytes());
        self.system_ram[8..12].copy_from_slice(&self.x.to_le_bytes());
        self.system_ram[12..16].copy_from_slice(&self.y.to_le_bytes());
    }

    fn render(&mut self) {
        let shift = self.frame as u32;
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let r = (x + shift) & 0xFF;
                let g = (y * 255 / HEIGHT) & 0xFF;
                let b = u32::from(self.seed);
                self.framebuffer[(y * WIDTH + x) as usize] = (r << 16) | (g << 8) | b;
            }
        }
        for y in self.y..self.y + SQUARE {
            for x in self.x..self.x + SQUARE {
                self.framebuffer[(y as u32 * WIDTH + x as u32) as usize] = 0x00FF_FFFF;
            }
        }
    }

    fn synthesize(&mut self) {
        // 441 Hz: 100 samples per period
        let base = self.frame as usize * AUDIO_FRAMES;
        for i in 0..AUDIO_FRAMES {
            let v: i16 = if (base + i) % 100 < 50 { 4000 } else { -4000 };
            self.audio[i * 2] = v;
            self.audio[i * 2 + 1] = v;
        }
    }

    fn serialize_into(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(STATE_MAGIC);
        out[4..12].copy_from_slice(&self.frame.to_le_bytes());
        out[12..16].copy_from_slice(&self.x.to_le_bytes());
        out[16..20].copy_from_slice(&self.y.to_le_bytes());
        out[20..].copy_from_slice(&self.save_ram);
    }

    fn unserialize_from(&mut self, data: &[u8]) -> bool {
        if data.len() != STATE_SIZE || &data[..4] != STATE_MAGIC {
            return false;
        }
        let mut frame = [0u8; 8];
        frame.copy_from_slice(&data[4..12]);
        let mut x = [0u8; 4];
        x.copy_from_slice(&data[12..16]);
        let mut y = [0u8; 4];
        y.copy_from_slice(&data[16..20]);

        self.frame = u64::from_le_bytes(frame);
        self.x = i32::from_le_bytes(x).clamp(0, WIDTH as i32 - SQUARE);
        self.y = i32::from_le_bytes(y).clamp(0, HEIGHT as i32 - SQUARE);
        self.save_ram.copy_from_slice(&data[20..]);
        true
    }
}

thread_local! {
    static PATTERN: RefCell<Pattern> = RefCell::new(Pattern::default());
}

fn with_pattern<R>(f: impl FnOnce(&mut Pattern) -> R) -> R {
    PATTERN.with(|p| f(&mut p.borrow_mut()))
}

unsafe extern "C" fn set_environment(cb: EnvironmentFn) {
    with_pattern(|p| p.cb.environment = Some(cb));
}

unsafe extern "C" fn set_video_refresh(cb: VideoRefreshFn) {
    with_pattern(|p| p.cb.video = Some(cb));
}

unsafe extern "C" fn set_audio_sample(cb: AudioSampleFn) {
    with_pattern(|p| p.cb.audio_sample = Some(cb));
}

unsafe extern "C" fn set_audio_sample_batch(cb: AudioSampleBatchFn) {
    with_pattern(|p| p.cb.audio_batch = Some(cb));
}

unsafe extern "C" fn set_input_poll(cb: InputPollFn) {
    with_pattern(|p| p.cb.input_poll = Some(cb));
}

unsafe extern "C" fn set_input_state(cb: InputStateFn) {
    with_pattern(|p| p.cb.input_state = Some(cb));
}

unsafe extern "C" fn init() {
    with_pattern(|p| {
        let cb = std::mem::take(&mut p.cb);
        *p = Pattern::default();
        p.cb = cb;
        p.initialized = true;
    });
}

unsafe extern "C" fn deinit() {
    with_pattern(|p| {
        p.initialized = false;
        p.loaded = false;
    });
}

unsafe extern "C" fn api_version() -> c_uint {
    API_VERSION
}

unsafe extern "C" fn get_system_info(info: *mut SystemInfo) {
    if info.is_null() {
        return;
    }
    *info = SystemInfo {
        library_name: c"Test Pattern".as_ptr(),
        library_version: c"1.0".as_ptr(),
        valid_extensions: c"tp|bin".as_ptr(),
        need_fullpath: false,
        block_extract: false,
    };
}

unsafe extern "C" fn get_system_av_info(info: *mut SystemAvInfo) {
    if info.is_null() {
        return;
    }
    *info = SystemAvInfo {
        geometry: GameGeometry {
            base_width: WIDTH,
            base_height: HEIGHT,
            max_width: WIDTH,
            max_height: HEIGHT,
            aspect_ratio: WIDTH as f32 / HEIGHT as f32,
        },
        timing: SystemTiming {
            fps: FPS,
            sample_rate: SAMPLE_RATE,
        },
    };
}

unsafe extern "C" fn set_controller_port_device(port: c_uint, device: c_uint) {
    with_pattern(|p| {
        if let Some(slot) = p.devices.get_mut(port as usize) {
            *slot = device;
        }
    });
}

unsafe extern "C" fn reset() {
    with_pattern(Pattern::reset_machine);
}

unsafe extern "C" fn run() {
    // Callbacks are copied out so none runs while the core state is borrowed
    let (poll, input, loaded, device) =
        with_pattern(|p| (p.cb.input_poll, p.cb.input_state, p.loaded, p.devices[0]));
    if !loaded {
        return;
    }

    if let Some(poll) = poll {
        poll();
    }
    let buttons = match input {
        Some(input) if device != DEVICE_NONE => {
            input(0, DEVICE_JOYPAD, 0, DEVICE_ID_JOYPAD_MASK) as u16
        }
        _ => 0,
    };

    let (video, batch, single, duplicate) = with_pattern(|p| {
        // Odd frames are left to the frontend when it can repeat frames
        let duplicate = p.can_dupe && p.frame % 2 == 1;
        if !duplicate {
            p.render();
        }
        p.synthesize();
        p.step(buttons);
        (p.cb.video, p.cb.audio_batch, p.cb.audio_sample, duplicate)
    });

    if let Some(video) = video {
        if duplicate {
            video(std::ptr::null(), WIDTH, HEIGHT, 0);
        } else {
            let ptr = with_pattern(|p| p.framebuffer.as_ptr());
            video(ptr as *const c_void, WIDTH, HEIGHT, WIDTH as size_t * 4);
        }
    }

    let audio = with_pattern(|p| p.audio.as_ptr());
    if let Some(batch) = batch {
        let mut sent = 0;
        while sent < AUDIO_FRAMES {
            let n = batch(audio.add(sent * 2), AUDIO_FRAMES - sent);
            if n == 0 {
                break;
            }
            sent += n;
        }
    } else if let Some(single) = single {
        for i in 0..AUDIO_FRAMES {
            single(*audio.add(i * 2), *audio.add(i * 2 + 1));
        }
    }
}

unsafe extern "C" fn serialize_size() -> size_t {
    STATE_SIZE
}

unsafe extern "C" fn serialize(data: *mut c_void, size: size_t) -> bool {
    if data.is_null() || size < STATE_SIZE {
        return false;
    }
    let out = std::slice::from_raw_parts_mut(data as *mut u8, STATE_SIZE);
    with_pattern(|p| p.serialize_into(out));
    true
}

unsafe extern "C" fn unserialize(data: *const c_void, size: size_t) -> bool {
    if data.is_null() {
        return false;
    }
    let input = std::slice::from_raw_parts(data as *const u8, size);
    with_pattern(|p| p.unserialize_from(input))
}

unsafe extern "C" fn cheat_reset() {
    with_pattern(|p| p.cheats = 0);
}

unsafe extern "C" fn cheat_set(_index: c_uint, enabled: bool, code: *const c_char) {
    if enabled && !code.is_null() {
        with_pattern(|p| p.cheats += 1);
    }
}

unsafe extern "C" fn load_game(game: *const GameInfo) -> bool {
    if game.is_null() {
        return false;
    }
    let game = &*game;
    if game.data.is_null() || game.size == 0 {
        return false;
    }
    let rom = std::slice::from_raw_parts(game.data as *const u8, game.size);
    let seed = rom.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));

    let Some(env) = with_pattern(|p| p.cb.environment) else {
        return false;
    };
    let mut format = PIXEL_FORMAT_XRGB8888;
    if !env(
        ENVIRONMENT_SET_PIXEL_FORMAT,
        &mut format as *mut c_uint as *mut c_void,
    ) {
        return false;
    }
    let mut can_dupe = false;
    if !env(
        ENVIRONMENT_GET_CAN_DUPE,
        &mut can_dupe as *mut bool as *mut c_void,
    ) {
        can_dupe = false;
    }

    let options = [
        Variable {
            key: SAVE_RAM_KEY.as_ptr(),
            value: c"Battery RAM; enabled|disabled".as_ptr(),
        },
        Variable {
            key: std::ptr::null(),
            value: std::ptr::null(),
        },
    ];
    env(ENVIRONMENT_SET_VARIABLES, options.as_ptr() as *mut c_void);
    let mut query = Variable {
        key: SAVE_RAM_KEY.as_ptr(),
        value: std::ptr::null(),
    };
    let answered = env(
        ENVIRONMENT_GET_VARIABLE,
        &mut query as *mut Variable as *mut c_void,
    );
    let battery = !(answered
        && !query.value.is_null()
        && CStr::from_ptr(query.value).to_bytes() == b"disabled");

    with_pattern(|p| {
        p.reset_machine();
        p.seed = seed;
        p.can_dupe = can_dupe;
        p.battery = battery;
        p.loaded = p.initialized;
        p.loaded
    })
}

unsafe extern "C" fn load_game_special(
    _game_type: c_uint,
    _info: *const GameInfo,
    _num_info: size_t,
) -> bool {
    false
}

unsafe extern "C" fn unload_game() {
    with_pattern(|p| p.loaded = false);
}

unsafe extern "C" fn get_region() -> c_uint {
    REGION_NTSC
}

unsafe extern "C" fn get_memory_data(id: c_uint) -> *mut c_void {
    with_pattern(|p| match id {
        MEMORY_SAVE_RAM if p.battery => p.save_ram.as_mut_ptr() as *mut c_void,
        MEMORY_SYSTEM_RAM => p.system_ram.as_mut_ptr() as *mut c_void,
        _ => std::ptr::null_mut(),
    })
}

unsafe extern "C" fn get_memory_size(id: c_uint) -> size_t {
    with_pattern(|p| match id {
        MEMORY_SAVE_RAM if p.battery => SAVE_RAM_SIZE,
        MEMORY_SYSTEM_RAM => SYSTEM_RAM_SIZE,
        _ => 0,
    })
}

/// Function table for the built-in core
pub fn api() -> CoreApi {
    CoreApi {
        retro_set_environment: set_environment,
        retro_set_video_refresh: set_video_refresh,
        retro_set_audio_sample: set_audio_sample,
        retro_set_audio_sample_batch: set_audio_sample_batch,
        retro_set_input_poll: set_input_poll,
        retro_set_input_state: set_input_state,
        retro_init: init,
        retro_deinit: deinit,
        retro_api_version: api_version,
        retro_get_system_info: get_system_info,
        retro_get_system_av_info: get_system_av_info,
        retro_set_controller_port_device: set_controller_port_device,
        retro_reset: reset,
        retro_run: run,
        retro_serialize_size: serialize_size,
        retro_serialize: serialize,
        retro_unserialize: unserialize,
        retro_cheat_reset: cheat_reset,
        retro_cheat_set: cheat_set,
        retro_load_game: load_game,
        retro_load_game_special: load_game_special,
        retro_unload_game: unload_game,
        retro_get_region: get_region,
        retro_get_memory_data: get_memory_data,
        retro_get_memory_size: get_memory_size,
    }
}

inventory::submit! {
    CoreDescriptor::new("testpattern", "Test Pattern", &[System::TestPattern], api)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let mut a = Pattern::default();
        a.seed = 7;
        for _ in 0..10 {
            a.step(1 << DEVICE_ID_JOYPAD_RIGHT);
        }
        let mut blob = vec![0u8; STATE_SIZE];
        a.serialize_into(&mut blob);

        let mut b = Pattern::default();
        assert!(b.unserialize_from(&blob));
        assert_eq!(b.frame, 10);
        assert_eq!(b.x, a.x);
        assert_eq!(b.save_ram, a.save_ram);
    }

    #[test]
    fn test_rejects_foreign_state() {
        let mut p = Pattern::default();
        assert!(!p.unserialize_from(&[0u8; STATE_SIZE]));
        assert!(!p.unserialize_from(b"YCTP"));
    }

    #[test]
    fn test_square_stays_on_screen() {
        let mut p = Pattern::default();
        for _ in 0..500 {
            p.step(1 << DEVICE_ID_JOYPAD_LEFT | 1 << DEVICE_ID_JOYPAD_DOWN);
        }
        assert_eq!(p.x, 0);
        assert_eq!(p.y, HEIGHT as i32 - SQUARE);
        p.render();
    }

    #[test]
    fn test_audio_is_a_tone() {
        let mut p = Pattern::default();
        p.synthesize();
        assert_eq!(p.audio[0], 4000);
        assert_eq!(p.audio[1], 4000);
        assert_eq!(p.audio[100], -4000);
    }
}
