//! Frame pacing for the cooperative frame loop
//!
//! The host calls [`FramePacer::frames_due`] from its clock tick. The pacer
//! keeps a deadline for the next emulated frame, derived from the core's
//! reported fps and the speed multiplier, and reports how many frames should
//! run on this tick. After a stall the backlog is capped and the remainder
//! is dropped. The cap is `max_catch_up` frames of real-time play, so it
//! grows with the speed multiplier and never throttles fast-forward.

use crate::config::{MAX_SPEED, MIN_SPEED};
use std::time::{Duration, Instant};

/// Fallback rate when a core reports a nonsensical fps
const DEFAULT_FPS: f64 = 60.0;

/// Frame scheduler for one session
#[derive(Debug, Clone)]
pub struct FramePacer {
    /// Core-reported frames per second
    base_fps: f64,
    /// Speed multiplier
    speed: f32,
    /// Wall-clock time per emulated frame at the current speed
    frame_period: Duration,
    /// When the next frame becomes due
    next_deadline: Option<Instant>,
    /// Most frames a single tick may run at 1x
    max_catch_up: u32,
    /// Frames skipped because the backlog exceeded `max_catch_up`
    dropped_frames: u64,
}

impl FramePacer {
    /// Create a pacer for a core running at `fps`
    pub fn new(fps: f64, speed: f32, max_catch_up: u32) -> Self {
        let base_fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            tracing::warn!("Core reported invalid fps {}, assuming {}", fps, DEFAULT_FPS);
            DEFAULT_FPS
        };
        let speed = clamp_speed(speed);

        Self {
            base_fps,
            speed,
            frame_period: period(base_fps, speed),
            next_deadline: None,
            max_catch_up: max_catch_up.max(1),
            dropped_frames: 0,
        }
    }

    /// Change the speed multiplier; returns the clamped value in effect
    pub fn set_speed(&mut self, speed: f32) -> f32 {
        self.speed = clamp_speed(speed);
        self.frame_period = period(self.base_fps, self.speed);
        tracing::debug!(
            "Speed set to {}x ({:?} per frame)",
            self.speed,
            self.frame_period
        );
        self.speed
    }

    /// Update the core-reported rate (after `SET_SYSTEM_AV_INFO`)
    pub fn set_fps(&mut self, fps: f64) {
        if fps.is_finite() && fps > 0.0 {
            self.base_fps = fps;
            self.frame_period = period(self.base_fps, self.speed);
        }
    }

    /// Current speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// True when running faster than real time
    pub fn is_fast_forwarding(&self) -> bool {
        self.speed > 1.0
    }

    /// Wall-clock duration of one emulated frame
    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Frames dropped by the catch-up cap so far
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Forget the deadline; the next tick starts a fresh schedule.
    ///
    /// Called on start, resume and after anything that blocked the loop.
    pub fn reset(&mut self) {
        self.next_deadline = None;
    }

    /// Frames one tick may run at the current speed
    pub fn tick_budget(&self) -> u32 {
        let scale = self.speed.ceil().max(1.0) as u32;
        self.max_catch_up.saturating_mul(scale)
    }

    /// Number of frames to run for a tick at `now`
    pub fn frames_due(&mut self, now: Instant) -> u32 {
        let deadline = match self.next_deadline {
            Some(deadline) => deadline,
            None => {
                self.next_deadline = Some(now + self.frame_period);
                return 1;
            }
        };

        if now < deadline {
            return 0;
        }

        let behind = now.duration_since(deadline);
        let owed = (behind.as_nanos() / self.frame_period.as_nanos().max(1)) as u64 + 1;

        let budget = self.tick_budget();
        if owed > budget as u64 {
            let dropped = owed - budget as u64;
            self.dropped_frames += dropped;
            tracing::trace!("Dropping {} frames of backlog", dropped);
            self.next_deadline = Some(now + self.frame_period);
            budget
        } else {
            self.next_deadline = Some(deadline + self.frame_period * owed as u32);
            owed as u32
        }
    }
}

fn clamp_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

fn period(fps: f64, speed: f32) -> Duration {
    Duration::from_secs_f64(1.0 / (fps * speed as f64))
}
