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

//! # Echo Core
//!
//! The cooperative task model every engine subsystem is expressed in.
//!
//! A [`Task`] is a unit of periodic work with a start/stop lifecycle and an
//! orthogonal pause state. A [`TaskManager`] drives its tasks once per tick in
//! ascending priority order, and a [`TaskGroup`] is a task that is also a
//! manager, which is how subsystems build hierarchies. The
//! [`ContextSwitcher`] applies named pause/resume profiles over a manager.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod task;
pub mod timer;

pub use context::{
    Context, ContextAction, ContextInstruction, ContextSwitcher, FailurePolicy,
};
pub use error::ContextSwitchError;
pub use task::{
    FunctionTask, ManagerId, Task, TaskCore, TaskExt, TaskGroup, TaskId, TaskManager,
    TaskPriority, DEFAULT_PRIORITY,
};
pub use timer::CountDownTimer;
