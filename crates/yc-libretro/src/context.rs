//! Callback routing from C cores back into the adapter
//!
//! libretro callbacks carry no user pointer, so the adapter that is currently
//! calling into a core publishes its [`FrontendState`] in a thread-local slot
//! for the duration of the call. A [`CallbackScope`] installs the pointer and
//! restores the previous one when dropped.

use crate::audio::AudioChunk;
use crate::environment::{self, EnvironmentState};
use crate::input::InputSnapshot;
use crate::video::{AvInfo, PixelFormat, VideoFrame};
use libc::{c_uint, c_void, size_t};
use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;
use tracing::trace;
use yc_ffi::types::HW_FRAME_BUFFER_VALID;

thread_local! {
    static CURRENT: Cell<*mut FrontendState> = const { Cell::new(ptr::null_mut()) };
}

/// Per-adapter state the callbacks read and write
#[derive(Debug)]
pub struct FrontendState {
    pub env: EnvironmentState,
    pub pixel_format: PixelFormat,
    pub av_info: AvInfo,
    pub av_changed: bool,
    /// Input frozen at the start of the current frame
    pub input: InputSnapshot,
    /// Last frame the core produced; redelivered on duplicates
    pub last_frame: Option<Arc<VideoFrame>>,
    /// A new frame arrived during the current `retro_run`
    pub fresh_frame: bool,
    pub audio: Vec<i16>,
    pub polls: u64,
}

impl FrontendState {
    pub fn new(env: EnvironmentState) -> Self {
        Self {
            env,
            pixel_format: PixelFormat::default(),
            av_info: AvInfo::default(),
            av_changed: false,
            input: InputSnapshot::default(),
            last_frame: None,
            fresh_frame: false,
            audio: Vec::new(),
            polls: 0,
        }
    }

    /// Prepare for one `retro_run`
    pub fn begin_frame(&mut self, input: InputSnapshot) {
        self.input = input;
        self.fresh_frame = false;
        self.audio.clear();
    }

    /// Collect what the core produced during the frame
    pub fn finish_frame(&mut self) -> FrameOutput {
        let samples = std::mem::take(&mut self.audio);
        FrameOutput {
            video: self.last_frame.clone(),
            duplicate: !self.fresh_frame,
            audio: AudioChunk {
                samples,
                sample_rate: self.av_info.timing.sample_rate,
            },
        }
    }

    fn video_refresh(&mut self, data: *const c_void, width: c_uint, height: c_uint, pitch: size_t) {
        if data.is_null() || data == HW_FRAME_BUFFER_VALID || width == 0 || height == 0 {
            trace!("Duplicate frame");
            return;
        }

        let row = width as usize * self.pixel_format.bytes_per_pixel();
        if pitch < row {
            trace!("Rejecting frame with pitch {} < row {}", pitch, row);
            return;
        }
        let len = pitch * (height as usize - 1) + row;
        // SAFETY: the core guarantees `height` rows of `pitch` bytes, the
        // last of which is at least `row` long
        let src = unsafe { std::slice::from_raw_parts(data as *const u8, len) };
        if let Some(frame) = VideoFrame::copy_from(src, width, height, pitch, self.pixel_format) {
            self.last_frame = Some(Arc::new(frame));
            self.fresh_frame = true;
        }
    }
}

/// What one `run()` produced
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Newest frame, or the previous one when the core duplicated
    pub video: Option<Arc<VideoFrame>>,
    /// No new frame arrived this run
    pub duplicate: bool,
    pub audio: AudioChunk,
}

/// Routes callbacks to one [`FrontendState`] while alive
pub struct CallbackScope<'a> {
    previous: *mut FrontendState,
    _state: PhantomData<&'a mut FrontendState>,
}

impl<'a> CallbackScope<'a> {
    pub fn enter(state: &'a mut FrontendState) -> Self {
        let previous = CURRENT.with(|current| current.replace(state as *mut FrontendState));
        Self {
            previous,
            _state: PhantomData,
        }
    }
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}

fn with_state<R>(f: impl FnOnce(&mut FrontendState) -> R) -> Option<R> {
    let state = CURRENT.with(Cell::get);
    if state.is_null() {
        trace!("Core callback outside of a core call");
        return None;
    }
    // SAFETY: the pointer was installed by a live CallbackScope on this
    // thread, which holds the only borrow of the state
    Some(f(unsafe { &mut *state }))
}

pub(crate) unsafe extern "C" fn environment_cb(cmd: c_uint, data: *mut c_void) -> bool {
    with_state(|state| unsafe { environment::handle(state, cmd, data) }).unwrap_or(false)
}

pub(crate) unsafe extern "C" fn video_refresh_cb(
    data: *const c_void,
    width: c_uint,
    height: c_uint,
    pitch: size_t,
) {
    with_state(|state| state.video_refresh(data, width, height, pitch));
}

pub(crate) unsafe extern "C" fn audio_sample_cb(left: i16, right: i16) {
    with_state(|state| state.audio.extend_from_slice(&[left, right]));
}

pub(crate) unsafe extern "C" fn audio_sample_batch_cb(data: *const i16, frames: size_t) -> size_t {
    if data.is_null() {
        return 0;
    }
    with_state(|state| {
        let samples = unsafe { std::slice::from_raw_parts(data, frames * 2) };
        state.audio.extend_from_slice(samples);
        frames
    })
    .unwrap_or(0)
}

pub(crate) unsafe extern "C" fn input_poll_cb() {
    with_state(|state| state.polls += 1);
}

pub(crate) unsafe extern "C" fn input_state_cb(
    port: c_uint,
    device: c_uint,
    index: c_uint,
    id: c_uint,
) -> i16 {
    with_state(|state| state.input.query(port, device, index, id)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Button, InputState};
    use yc_ffi::types::{DEVICE_ID_JOYPAD_A, DEVICE_JOYPAD};

    fn state() -> FrontendState {
        FrontendState::new(EnvironmentState::default())
    }

    #[test]
    fn test_callbacks_without_scope_are_ignored() {
        assert!(!unsafe { environment_cb(3, ptr::null_mut()) });
        assert_eq!(unsafe { input_state_cb(0, DEVICE_JOYPAD, 0, DEVICE_ID_JOYPAD_A) }, 0);
        let samples = [1i16, 2];
        assert_eq!(unsafe { audio_sample_batch_cb(samples.as_ptr(), 1) }, 0);
    }

    #[test]
    fn test_scope_routes_and_restores() {
        let mut outer = state();
        let mut inner = state();
        {
            let _outer = CallbackScope::enter(&mut outer);
            unsafe { audio_sample_cb(1, 2) };
            {
                let _inner = CallbackScope::enter(&mut inner);
                unsafe { audio_sample_cb(3, 4) };
            }
            unsafe { audio_sample_cb(5, 6) };
        }
        assert_eq!(outer.audio, vec![1, 2, 5, 6]);
        assert_eq!(inner.audio, vec![3, 4]);
        assert!(CURRENT.with(Cell::get).is_null());
    }

    #[test]
    fn test_frame_and_duplicate() {
        let mut s = state();
        s.pixel_format = PixelFormat::Xrgb8888;
        let pixels = [0u32; 4];

        s.begin_frame(InputSnapshot::default());
        {
            let _scope = CallbackScope::enter(&mut s);
            unsafe { video_refresh_cb(pixels.as_ptr() as *const c_void, 2, 2, 8) };
        }
        let first = s.finish_frame();
        assert!(!first.duplicate);
        assert_eq!(first.video.as_ref().unwrap().width, 2);

        s.begin_frame(InputSnapshot::default());
        {
            let _scope = CallbackScope::enter(&mut s);
            unsafe { video_refresh_cb(ptr::null(), 2, 2, 8) };
            unsafe { video_refresh_cb(HW_FRAME_BUFFER_VALID, 2, 2, 8) };
        }
        let second = s.finish_frame();
        assert!(second.duplicate);
        assert!(Arc::ptr_eq(
            first.video.as_ref().unwrap(),
            second.video.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_input_reads_frozen_snapshot() {
        let input = InputState::new();
        input.set_button(0, Button::A, true);
        let mut s = state();
        s.begin_frame(input.snapshot());
        input.set_button(0, Button::A, false);

        let _scope = CallbackScope::enter(&mut s);
        assert_eq!(unsafe { input_state_cb(0, DEVICE_JOYPAD, 0, DEVICE_ID_JOYPAD_A) }, 1);
    }

    #[test]
    fn test_batch_audio_and_polls() {
        let mut s = state();
        s.av_info.timing.sample_rate = 32000.0;
        s.begin_frame(InputSnapshot::default());
        {
            let _scope = CallbackScope::enter(&mut s);
            let samples = [1i16, -1, 2, -2];
            assert_eq!(unsafe { audio_sample_batch_cb(samples.as_ptr(), 2) }, 2);
            unsafe { input_poll_cb() };
        }
        assert_eq!(s.polls, 1);
        let out = s.finish_frame();
        assert_eq!(out.audio.samples, vec![1, -1, 2, -2]);
        assert_eq!(out.audio.sample_rate, 32000.0);
        assert!(s.audio.is_empty());
    }
}
