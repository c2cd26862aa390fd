// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame pacing for the kernel loop.

use crate::config::KernelConfig;
use std::time::{Duration, Instant};

/// Default upper bound of a reported frame time.
pub const DEFAULT_MAX_FRAME_TIME: Duration = Duration::from_millis(250);

/// Default amount subtracted from every sleep to absorb OS wake-up latency.
pub const DEFAULT_SLEEP_EPSILON: Duration = Duration::from_millis(1);

/// Keeps frames between a minimum and a maximum duration.
///
/// The limiter is used in two phases around the work of a frame:
///
/// ```text
/// start() -> get_last_frame_time() -> [frame work] -> limit() -> get_last_frame_time() -> ...
/// ```
///
/// [`get_last_frame_time`](Self::get_last_frame_time) closes the previous
/// frame and opens the next one; [`limit`](Self::limit) sleeps off whatever
/// remains of the minimum frame time, minus a small sleep epsilon.
#[derive(Debug, Clone)]
pub struct FrameRateLimiter {
    min_frame_time: Duration,
    max_frame_time: Duration,
    sleep_epsilon: Duration,
    frame_start: Option<Instant>,
}

impl FrameRateLimiter {
    /// Creates an unlimited limiter: no minimum frame time, frames reported
    /// as at most [`DEFAULT_MAX_FRAME_TIME`].
    pub fn new() -> Self {
        Self {
            min_frame_time: Duration::ZERO,
            max_frame_time: DEFAULT_MAX_FRAME_TIME,
            sleep_epsilon: DEFAULT_SLEEP_EPSILON,
            frame_start: None,
        }
    }

    /// Creates a limiter from the kernel settings.
    pub fn from_config(config: &KernelConfig) -> Self {
        let mut limiter = Self::new();
        limiter.set_max_frame_time(config.max_frame_time());
        limiter.set_sleep_epsilon(config.sleep_epsilon());
        match config.target_frame_rate {
            Some(fps) => limiter.set_target_frame_rate(fps),
            None => limiter.set_min_frame_time(Duration::ZERO),
        }
        limiter
    }

    /// Begins measuring. Until this is called, frame times are zero.
    pub fn start(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Returns true once [`start`](Self::start) was called.
    pub fn is_started(&self) -> bool {
        self.frame_start.is_some()
    }

    /// Returns the duration of the frame that just ended and starts timing
    /// the next one.
    ///
    /// The result is clamped to the maximum frame time, so a debugger break
    /// or a long load never feeds a huge step into the tasks.
    pub fn get_last_frame_time(&mut self) -> Duration {
        let Some(frame_start) = self.frame_start else {
            return Duration::ZERO;
        };
        let now = Instant::now();
        self.frame_start = Some(now);
        now.saturating_duration_since(frame_start)
            .min(self.max_frame_time)
    }

    /// Sleeps until the minimum frame time has elapsed since the last call
    /// to [`get_last_frame_time`](Self::get_last_frame_time).
    pub fn limit(&self) {
        let Some(frame_start) = self.frame_start else {
            return;
        };
        if self.min_frame_time.is_zero() {
            return;
        }
        let elapsed = frame_start.elapsed();
        let remaining = self
            .min_frame_time
            .saturating_sub(elapsed)
            .saturating_sub(self.sleep_epsilon);
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }

    /// Caps the frame rate at `fps` frames per second. Zero, negative or
    /// non-finite rates remove the cap.
    pub fn set_target_frame_rate(&mut self, fps: f32) {
        if fps.is_finite() && fps > 0.0 {
            self.min_frame_time = Duration::from_nanos((1e9 / f64::from(fps)).round() as u64);
        } else {
            self.min_frame_time = Duration::ZERO;
        }
    }

    /// Sets the minimum duration of a frame.
    pub fn set_min_frame_time(&mut self, min_frame_time: Duration) {
        self.min_frame_time = min_frame_time;
    }

    /// Returns the minimum duration of a frame.
    pub fn min_frame_time(&self) -> Duration {
        self.min_frame_time
    }

    /// Sets the largest value [`get_last_frame_time`](Self::get_last_frame_time)
    /// may return.
    pub fn set_max_frame_time(&mut self, max_frame_time: Duration) {
        self.max_frame_time = max_frame_time;
    }

    /// Returns the largest reported frame time.
    pub fn max_frame_time(&self) -> Duration {
        self.max_frame_time
    }

    /// Sets how much earlier than the exact deadline [`limit`](Self::limit)
    /// wakes up.
    pub fn set_sleep_epsilon(&mut self, sleep_epsilon: Duration) {
        self.sleep_epsilon = sleep_epsilon;
    }
}

impl Default for FrameRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn frame_time_is_zero_before_start() {
        let mut limiter = FrameRateLimiter::new();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(limiter.get_last_frame_time(), Duration::ZERO);
        assert!(!limiter.is_started());
    }

    #[test]
    fn frame_time_never_exceeds_max() {
        let mut limiter = FrameRateLimiter::new();
        limiter.set_max_frame_time(Duration::from_millis(10));
        limiter.start();

        thread::sleep(Duration::from_millis(30));
        let dt = limiter.get_last_frame_time();
        assert_eq!(dt, Duration::from_millis(10));

        // The next frame is measured from the previous call, not from start().
        let dt = limiter.get_last_frame_time();
        assert!(dt < Duration::from_millis(10), "dt was {dt:?}");
    }

    #[test]
    fn limit_sleeps_off_the_remaining_frame_time() {
        let mut limiter = FrameRateLimiter::new();
        limiter.set_target_frame_rate(20.0);
        limiter.set_sleep_epsilon(Duration::ZERO);
        limiter.start();
        limiter.get_last_frame_time();

        let before = Instant::now();
        limiter.limit();
        assert!(
            before.elapsed() >= Duration::from_millis(40),
            "limit returned after {:?}",
            before.elapsed()
        );
    }

    #[test]
    fn invalid_target_rate_removes_cap() {
        let mut limiter = FrameRateLimiter::new();
        limiter.set_target_frame_rate(60.0);
        assert!(limiter.min_frame_time() > Duration::from_millis(16));

        limiter.set_target_frame_rate(0.0);
        assert_eq!(limiter.min_frame_time(), Duration::ZERO);
        limiter.set_target_frame_rate(f32::NAN);
        assert_eq!(limiter.min_frame_time(), Duration::ZERO);
    }

    #[test]
    fn from_config_applies_every_setting() {
        let config = KernelConfig {
            target_frame_rate: Some(50.0),
            max_frame_time_ms: 100,
            sleep_epsilon_us: 500,
        };
        let limiter = FrameRateLimiter::from_config(&config);
        assert_eq!(limiter.min_frame_time(), Duration::from_millis(20));
        assert_eq!(limiter.max_frame_time(), Duration::from_millis(100));
        assert_eq!(limiter.sleep_epsilon, Duration::from_micros(500));
    }
}
