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

//! Frame-driven countdown timer.

use crate::task::{lock, Task, TaskCore, TaskExt, TaskPriority, DEFAULT_PRIORITY};
use std::sync::Mutex;
use std::time::Duration;

type TimeoutFn = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy)]
struct Countdown {
    timeout: Duration,
    remaining: Duration,
    repeat: bool,
}

/// A task that counts down by the frame time it is updated with and calls a
/// function when the countdown reaches zero.
///
/// A repeating timer re-arms itself and carries any overshoot into the next
/// period, so the number of expiries follows simulated time rather than the
/// number of frames. A one-shot timer pauses itself (forced) after firing;
/// [`reset`](Self::reset) followed by `resume` arms it again.
pub struct CountDownTimer {
    core: TaskCore,
    countdown: Mutex<Countdown>,
    on_timeout: Mutex<Option<TimeoutFn>>,
}

impl CountDownTimer {
    /// Creates a timer with the default priority.
    pub fn new<F>(timeout: Duration, on_timeout: F, name: impl Into<String>, repeat: bool) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::with_priority(timeout, on_timeout, name, repeat, DEFAULT_PRIORITY)
    }

    /// Creates a timer with an explicit priority.
    pub fn with_priority<F>(
        timeout: Duration,
        on_timeout: F,
        name: impl Into<String>,
        repeat: bool,
        priority: TaskPriority,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            core: TaskCore::new(name, priority),
            countdown: Mutex::new(Countdown {
                timeout,
                remaining: timeout,
                repeat,
            }),
            on_timeout: Mutex::new(Some(Box::new(on_timeout))),
        }
    }

    /// Restarts the countdown from the full timeout.
    pub fn reset(&self) {
        let mut countdown = lock(&self.countdown);
        countdown.remaining = countdown.timeout;
    }

    /// Changes the timeout and restarts the countdown.
    pub fn set_timeout(&self, timeout: Duration) {
        let mut countdown = lock(&self.countdown);
        countdown.timeout = timeout;
        countdown.remaining = timeout;
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        lock(&self.countdown).timeout
    }

    /// Returns the time left before the next expiry.
    pub fn remaining(&self) -> Duration {
        lock(&self.countdown).remaining
    }

    /// Returns true if the timer re-arms after firing.
    pub fn is_repeating(&self) -> bool {
        lock(&self.countdown).repeat
    }

    /// Replaces the function called on expiry.
    pub fn set_timeout_function<F>(&self, on_timeout: F)
    where
        F: FnMut() + Send + 'static,
    {
        *lock(&self.on_timeout) = Some(Box::new(on_timeout));
    }

    /// Advances the countdown and returns how many times it expired,
    /// along with the repeat flag.
    fn advance(&self, dt: Duration) -> (u32, bool) {
        let mut countdown = lock(&self.countdown);
        let repeat = countdown.repeat;
        if dt < countdown.remaining {
            countdown.remaining -= dt;
            return (0, repeat);
        }
        if !repeat {
            countdown.remaining = Duration::ZERO;
            return (1, repeat);
        }
        if countdown.timeout.is_zero() {
            return (1, repeat);
        }

        // One expiry per whole period crossed; the remainder carries over.
        let mut left = dt;
        let mut fires = 0;
        while left >= countdown.remaining {
            left -= countdown.remaining;
            countdown.remaining = countdown.timeout;
            fires += 1;
        }
        countdown.remaining -= left;
        (fires, repeat)
    }
}

impl Task for CountDownTimer {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn update(&self, dt: Duration) {
        let (fires, repeat) = self.advance(dt);
        if fires == 0 {
            return;
        }

        if let Some(on_timeout) = lock(&self.on_timeout).as_mut() {
            for _ in 0..fires {
                on_timeout();
            }
        }
        if !repeat {
            log::trace!("CountDownTimer '{}' expired.", self.core.name());
            self.pause(false, true);
        }
    }
}
