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

//! A [`Model::Controller`] loop woken by network traffic or a timer.

use super::{ExecutionModel, ExecutionResult, Model};
use crate::config::NetworkConfig;
use crate::kernel::Kernel;
use crate::lock;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeSignal {
    NetworkEvent,
    UpdateRequest,
    Quit,
}

/// Handle given to network code so it can wake a [`NetworkExecutionModel`].
#[derive(Debug, Clone)]
pub struct NetworkEventSignal {
    sender: Sender<WakeSignal>,
}

impl NetworkEventSignal {
    /// Reports inbound traffic; the kernel processes a frame right away.
    ///
    /// Returns false once the model is gone.
    pub fn notify(&self) -> bool {
        self.sender.send(WakeSignal::NetworkEvent).is_ok()
    }
}

/// Controller model for servers and headless tools.
///
/// The loop sleeps until either a network event is signalled or the frame
/// timer expires, processes one frame, then re-arms the timer. A server thus
/// reacts to traffic immediately and still ticks at the configured interval
/// when idle.
#[derive(Debug)]
pub struct NetworkExecutionModel {
    frame_interval: Duration,
    sender: Sender<WakeSignal>,
    receiver: Receiver<WakeSignal>,
    next_frame: Mutex<Option<Instant>>,
}

impl NetworkExecutionModel {
    /// Creates a model ticking at least every `frame_interval`.
    pub fn new(frame_interval: Duration) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            frame_interval,
            sender,
            receiver,
            next_frame: Mutex::new(None),
        }
    }

    /// Creates a model from the network settings.
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.frame_interval())
    }

    /// Returns the timer period.
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Returns a handle that network code uses to wake the loop.
    pub fn event_signal(&self) -> NetworkEventSignal {
        NetworkEventSignal {
            sender: self.sender.clone(),
        }
    }

    /// Makes [`enter_system_event_manager`](ExecutionModel::enter_system_event_manager)
    /// return [`ExecutionResult::Incomplete`] without processing another frame.
    ///
    /// A quit sent while no loop runs ends the next one immediately.
    pub fn quit(&self) {
        // The model owns the receiver, so the send cannot fail.
        let _ = self.sender.send(WakeSignal::Quit);
    }

    fn wait(&self) -> Result<Option<WakeSignal>, RecvTimeoutError> {
        let deadline = *lock(&self.next_frame);
        match deadline {
            Some(deadline) => match self.receiver.recv_deadline(deadline) {
                Ok(signal) => Ok(Some(signal)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(error) => Err(error),
            },
            None => self
                .receiver
                .recv()
                .map(Some)
                .map_err(|_| RecvTimeoutError::Disconnected),
        }
    }
}

impl ExecutionModel for NetworkExecutionModel {
    fn supports_model(&self, model: Model) -> bool {
        model == Model::Controller
    }

    fn enter_system_event_manager(&self, kernel: &Kernel) -> ExecutionResult {
        *lock(&self.next_frame) = Some(Instant::now());
        log::info!(
            "NetworkExecutionModel: entering loop for kernel '{}' (interval={:?}).",
            kernel.name(),
            self.frame_interval
        );

        loop {
            let signal = match self.wait() {
                Ok(signal) => signal,
                Err(error) => {
                    log::error!("NetworkExecutionModel: wake channel failed: {error}");
                    return ExecutionResult::Failure;
                }
            };

            match signal {
                Some(WakeSignal::Quit) => {
                    log::info!("NetworkExecutionModel: quit requested.");
                    return ExecutionResult::Incomplete;
                }
                // Re-armed timer. A stopped kernel also wakes the loop this way.
                Some(WakeSignal::UpdateRequest) => {
                    if !kernel.has_at_least_one_task() {
                        log::info!("NetworkExecutionModel: kernel has no task left.");
                        return ExecutionResult::Success;
                    }
                }
                Some(WakeSignal::NetworkEvent) | None => {
                    *lock(&self.next_frame) = None;
                    if !kernel.process_frame() {
                        log::info!("NetworkExecutionModel: kernel has no task left.");
                        return ExecutionResult::Success;
                    }
                }
            }
        }
    }

    fn send_update_request(&self) -> bool {
        *lock(&self.next_frame) = Some(Instant::now() + self.frame_interval);
        self.sender.send(WakeSignal::UpdateRequest).is_ok()
    }
}
