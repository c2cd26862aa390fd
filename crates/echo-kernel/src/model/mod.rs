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

//! Strategies integrating a [`Kernel`] loop with its host.
//!
//! The kernel never decides on its own how frames are scheduled. It hands
//! that decision to an [`ExecutionModel`], which may let the kernel own the
//! loop ([`Model::Cooperate`]), block inside a host or internal event loop
//! ([`Model::Controller`]), or leave frame calls entirely to the embedding
//! application ([`Model::ExternalController`]).

mod network;

pub use network::{NetworkEventSignal, NetworkExecutionModel};

use crate::kernel::Kernel;
use std::time::Duration;

/// The ways a host loop can be integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// No platform integration: the kernel is run continuously, typically
    /// on a dedicated thread.
    None,
    /// The kernel owns the loop and pulls host events once per frame through
    /// [`ExecutionModel::process_events`].
    Cooperate,
    /// The host owns the loop. [`ExecutionModel::enter_system_event_manager`]
    /// blocks and calls [`Kernel::process_frame`] on wake-up; after each frame
    /// the kernel asks for the next wake-up through
    /// [`ExecutionModel::send_update_request`].
    Controller,
    /// The embedding application calls [`Kernel::process_frame`] itself.
    ExternalController,
}

/// How a kernel run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionResult {
    /// The kernel ran out of tasks.
    Success,
    /// The model or the platform failed.
    Failure,
    /// The run was interrupted before the kernel ran out of tasks, or the
    /// loop is driven from outside.
    Incomplete,
}

/// Strategy deciding when and how a [`Kernel`] processes frames.
///
/// Models are shared between the kernel and the code feeding them events,
/// so every operation takes `&self`.
pub trait ExecutionModel: Send + Sync {
    /// Returns true if the model integrates with the host the `model` way.
    fn supports_model(&self, model: Model) -> bool;

    /// Hands control over to the model until the kernel is done.
    ///
    /// Called by [`Kernel::execute`] for every model except
    /// [`Model::Cooperate`], whose loop the kernel drives itself.
    fn enter_system_event_manager(&self, _kernel: &Kernel) -> ExecutionResult {
        log::error!("ExecutionModel: this model does not provide a system event manager.");
        ExecutionResult::Failure
    }

    /// Pumps pending host events, waiting at most `timeout_suggestion`.
    ///
    /// Returns false when the host asked the application to quit.
    fn process_events(&self, _timeout_suggestion: Duration) -> bool {
        true
    }

    /// Asks the host for another frame. Must not block; returning false
    /// makes the kernel retry.
    fn send_update_request(&self) -> bool {
        true
    }
}

/// Runs frames back to back until the kernel has no task left.
///
/// Given to kernels hosted by a [`Thread`](crate::Thread) that have no model,
/// so a model owned by the main thread's platform loop is never reused
/// off that thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunForeverModel;

impl ExecutionModel for RunForeverModel {
    fn supports_model(&self, model: Model) -> bool {
        model == Model::None
    }

    fn enter_system_event_manager(&self, kernel: &Kernel) -> ExecutionResult {
        while kernel.process_frame() {}
        ExecutionResult::Success
    }
}

/// Model for hosts that call [`Kernel::process_frame`] from their own
/// callbacks, such as a mobile render callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalControllerModel;

impl ExecutionModel for ExternalControllerModel {
    fn supports_model(&self, model: Model) -> bool {
        model == Model::ExternalController
    }

    fn enter_system_event_manager(&self, _kernel: &Kernel) -> ExecutionResult {
        log::debug!("ExternalControllerModel: frames are driven by the host.");
        ExecutionResult::Incomplete
    }
}
