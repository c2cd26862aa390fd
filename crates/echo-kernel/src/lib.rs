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

//! # Echo Kernel
//!
//! Drives the task trees of `echo-core`: a [`Kernel`] is the root task
//! manager of a run loop, paced by a [`FrameRateLimiter`] and integrated with
//! its host through an [`ExecutionModel`]. [`Thread`] and [`TaskThread`] run
//! further kernels on their own OS threads.

#![warn(missing_docs)]

mod config;
mod error;
mod kernel;
mod limiter;
mod model;
mod thread;

pub use config::{EngineConfig, KernelConfig, NetworkConfig};
pub use error::{ConfigError, ThreadError};
pub use kernel::Kernel;
pub use limiter::{FrameRateLimiter, DEFAULT_MAX_FRAME_TIME, DEFAULT_SLEEP_EPSILON};
pub use model::{
    ExecutionModel, ExecutionResult, ExternalControllerModel, Model, NetworkEventSignal,
    NetworkExecutionModel, RunForeverModel,
};
pub use thread::{StdThreadImplementation, TaskThread, Thread, ThreadFunction, ThreadImplementation};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
