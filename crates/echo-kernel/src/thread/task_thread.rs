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

use super::Thread;
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::model::ExecutionResult;
use echo_core::{Task, TaskCore, TaskPriority};
use std::sync::Arc;

/// A task running its own [`Kernel`] on a dedicated [`Thread`].
///
/// Subsystems that must not stall with the main loop, such as audio
/// streaming, add their tasks to [`kernel`](Self::kernel) and register the
/// task thread in the main kernel. Starting the task executes the thread,
/// stopping it stops the inner kernel (dropping its tasks) and joins the
/// thread. Pausing it pauses every task of the inner kernel.
#[derive(Debug)]
pub struct TaskThread {
    core: TaskCore,
    kernel: Arc<Kernel>,
    thread: Thread,
}

impl TaskThread {
    /// Creates a task thread with an unpaced kernel.
    pub fn new(name: impl Into<String>, priority: TaskPriority) -> Self {
        let name = name.into();
        let kernel = Arc::new(Kernel::new(name.clone()));
        Self::with_kernel(name, priority, kernel)
    }

    /// Creates a task thread whose kernel is paced by `config`.
    pub fn with_config(name: impl Into<String>, priority: TaskPriority, config: &KernelConfig) -> Self {
        let name = name.into();
        let kernel = Arc::new(Kernel::from_config(name.clone(), config));
        Self::with_kernel(name, priority, kernel)
    }

    /// Creates a task thread around an existing kernel.
    pub fn with_kernel(name: impl Into<String>, priority: TaskPriority, kernel: Arc<Kernel>) -> Self {
        let name = name.into();
        Self {
            thread: Thread::with_kernel(name.clone(), Arc::clone(&kernel)),
            core: TaskCore::new(name, priority),
            kernel,
        }
    }

    /// Returns the kernel run by the thread.
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Returns the hosting thread.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Returns how the last run of the inner kernel ended.
    pub fn last_result(&self) -> Option<ExecutionResult> {
        self.thread.last_result()
    }
}

impl Task for TaskThread {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn on_start(&self) -> bool {
        self.thread.execute()
    }

    fn on_stop(&self) {
        self.thread.terminate(true);
    }

    fn on_pause(&self, application_pause: bool) {
        self.kernel.pause_kernel(application_pause);
    }

    fn on_resume(&self, application_resume: bool) {
        self.kernel.resume_kernel(application_resume);
    }
}
