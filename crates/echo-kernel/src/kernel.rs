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

//! The root task manager and its run loop.

use crate::config::KernelConfig;
use crate::limiter::FrameRateLimiter;
use crate::lock;
use crate::model::{ExecutionModel, ExecutionResult, Model};
use crate::thread::TaskThread;
use echo_core::{TaskExt, TaskManager};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// How many times a refused update request is retried before the frame is
/// given up.
const MAX_UPDATE_REQUEST_ATTEMPTS: u32 = 64;

/// Root [`TaskManager`] owning a run loop.
///
/// The kernel paces frames with a [`FrameRateLimiter`] and delegates loop
/// ownership to an [`ExecutionModel`]. Every [`TaskManager`] operation is
/// available on the kernel through `Deref`. Once [`execute`](Self::execute)
/// has started the tasks, tasks added to the kernel are started as they are
/// added.
///
/// A run ends when the kernel runs out of tasks, so [`stop`](Self::stop) is
/// simply the removal of every task: the current frame finishes and the
/// model returns at the next frame boundary.
pub struct Kernel {
    tasks: TaskManager,
    execution_model: RwLock<Option<Arc<dyn ExecutionModel>>>,
    limiter: Mutex<FrameRateLimiter>,
    task_threads: Mutex<Vec<Arc<TaskThread>>>,
    pause_hint: AtomicBool,
    frame_count: AtomicU64,
    last_frame_time: Mutex<Duration>,
}

impl Kernel {
    /// Creates a kernel without execution model and without frame cap.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limiter(name, FrameRateLimiter::new())
    }

    /// Creates a kernel paced according to `config`.
    pub fn from_config(name: impl Into<String>, config: &KernelConfig) -> Self {
        Self::with_limiter(name, FrameRateLimiter::from_config(config))
    }

    fn with_limiter(name: impl Into<String>, limiter: FrameRateLimiter) -> Self {
        Self {
            tasks: TaskManager::new(name),
            execution_model: RwLock::new(None),
            limiter: Mutex::new(limiter),
            task_threads: Mutex::new(Vec::new()),
            pause_hint: AtomicBool::new(false),
            frame_count: AtomicU64::new(0),
            last_frame_time: Mutex::new(Duration::ZERO),
        }
    }

    /// Returns the root task manager.
    pub fn task_manager(&self) -> &TaskManager {
        &self.tasks
    }

    /// Installs the strategy driving [`execute`](Self::execute).
    pub fn set_execution_model(&self, model: Arc<dyn ExecutionModel>) {
        *self
            .execution_model
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(model);
    }

    /// Returns the installed execution model.
    pub fn execution_model(&self) -> Option<Arc<dyn ExecutionModel>> {
        self.execution_model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn controller(&self) -> Option<Arc<dyn ExecutionModel>> {
        self.execution_model()
            .filter(|model| model.supports_model(Model::Controller))
    }

    /// Runs the kernel until its model returns.
    ///
    /// Every task is started first; if one refuses, nothing runs and the
    /// result is [`ExecutionResult::Failure`].
    pub fn execute(&self) -> ExecutionResult {
        let Some(model) = self.execution_model() else {
            log::error!(
                "Kernel '{}': cannot execute without an execution model.",
                self.tasks.name()
            );
            return ExecutionResult::Failure;
        };

        if !self.tasks.start_tasks() {
            log::error!(
                "Kernel '{}': some tasks failed to start, aborting execution.",
                self.tasks.name()
            );
            return ExecutionResult::Failure;
        }

        lock(&self.limiter).start();
        log::info!(
            "Kernel '{}' executing with {} tasks.",
            self.tasks.name(),
            self.tasks.number_of_tasks(false)
        );

        let result = if model.supports_model(Model::Cooperate) {
            self.run_cooperative(model.as_ref())
        } else {
            model.enter_system_event_manager(self)
        };

        log::info!(
            "Kernel '{}' finished after {} frames: {:?}",
            self.tasks.name(),
            self.frame_count(),
            result
        );
        result
    }

    fn run_cooperative(&self, model: &dyn ExecutionModel) -> ExecutionResult {
        loop {
            if !self.process_frame() {
                return ExecutionResult::Success;
            }
            let timeout = lock(&self.limiter).min_frame_time();
            if !model.process_events(timeout) {
                return ExecutionResult::Incomplete;
            }
        }
    }

    /// Processes one frame: measures the previous frame, updates every
    /// active task and sleeps off the rest of the minimum frame time.
    ///
    /// Returns false once the kernel has no task left, telling the driver
    /// to stop.
    pub fn process_frame(&self) -> bool {
        let dt = lock(&self.limiter).get_last_frame_time();
        *lock(&self.last_frame_time) = dt;

        self.tasks.update_tasks(dt);
        self.frame_count.fetch_add(1, Ordering::Relaxed);

        // Sleep on a copy so the limiter stays reachable from other threads.
        let limiter = lock(&self.limiter).clone();
        limiter.limit();

        if let Some(model) = self.controller() {
            self.request_update(model.as_ref());
        }

        let alive = self.tasks.has_at_least_one_task();
        log::trace!(
            "Kernel '{}': frame {} (dt={:?}, alive={})",
            self.tasks.name(),
            self.frame_count(),
            dt,
            alive
        );
        alive
    }

    fn request_update(&self, model: &dyn ExecutionModel) {
        for _ in 0..MAX_UPDATE_REQUEST_ATTEMPTS {
            if model.send_update_request() {
                return;
            }
            std::thread::yield_now();
        }
        log::error!(
            "Kernel '{}': execution model kept refusing update requests.",
            self.tasks.name()
        );
    }

    /// Removes every task, ending the run at the next frame boundary.
    ///
    /// Task threads owned by the kernel are terminated and joined.
    pub fn stop(&self) {
        log::info!("Kernel '{}': stop requested.", self.tasks.name());
        let threads = std::mem::take(&mut *lock(&self.task_threads));
        self.tasks.remove_all_tasks();
        for thread in threads {
            if thread.is_started() {
                thread.stop();
            }
        }
        if let Some(model) = self.controller() {
            // Wake a blocked controller so it sees the empty kernel.
            self.request_update(model.as_ref());
        }
    }

    /// Pauses every top-level task, including the ones that are not
    /// pausable. Used when the host application is suspended.
    pub fn pause_kernel(&self, application_pause: bool) {
        log::debug!("Kernel '{}': pausing.", self.tasks.name());
        self.tasks.pause_all_tasks(application_pause, true);
    }

    /// Resumes every top-level task.
    pub fn resume_kernel(&self, application_resume: bool) {
        log::debug!("Kernel '{}': resuming.", self.tasks.name());
        self.tasks.resume_all_tasks(application_resume);
    }

    /// Sets the advisory pause flag read by platform glue.
    pub fn set_pause_hint(&self, pause_hint: bool) {
        self.pause_hint.store(pause_hint, Ordering::Release);
    }

    /// Returns the advisory pause flag.
    pub fn pause_hint(&self) -> bool {
        self.pause_hint.load(Ordering::Acquire)
    }

    /// Registers a task thread as a task of this kernel. The kernel keeps
    /// it alive and terminates it on [`stop`](Self::stop).
    pub fn add_task_thread(&self, thread: Arc<TaskThread>) -> bool {
        if !self.tasks.add_shared_task(thread.clone()) {
            return false;
        }
        lock(&self.task_threads).push(thread);
        true
    }

    /// Unregisters a task thread without stopping it.
    pub fn remove_task_thread(&self, thread: &TaskThread) -> bool {
        let id = thread.id();
        lock(&self.task_threads).retain(|owned| owned.id() != id);
        self.tasks.remove_task(thread)
    }

    /// Returns the task threads owned by the kernel.
    pub fn task_threads(&self) -> Vec<Arc<TaskThread>> {
        lock(&self.task_threads).clone()
    }

    /// Returns the number of frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Returns the frame time handed to the tasks in the last frame.
    pub fn last_frame_time(&self) -> Duration {
        *lock(&self.last_frame_time)
    }

    /// Gives access to the frame pacing settings.
    pub fn with_frame_rate_limiter<R>(&self, f: impl FnOnce(&mut FrameRateLimiter) -> R) -> R {
        f(&mut lock(&self.limiter))
    }
}

impl Deref for Kernel {
    type Target = TaskManager;

    fn deref(&self) -> &TaskManager {
        &self.tasks
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("tasks", &self.tasks)
            .field("frame_count", &self.frame_count())
            .field("pause_hint", &self.pause_hint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalControllerModel, RunForeverModel};
    use echo_core::{FunctionTask, Task, TaskCore};
    use std::sync::atomic::AtomicUsize;

    fn counting_task(name: &str, limit: usize, kernel: &Arc<Kernel>) -> Arc<dyn Task> {
        let count = AtomicUsize::new(0);
        let kernel = Arc::downgrade(kernel);
        Arc::new(FunctionTask::new(name, 0, move |_| {
            if count.fetch_add(1, Ordering::SeqCst) + 1 >= limit {
                if let Some(kernel) = kernel.upgrade() {
                    kernel.stop();
                }
            }
        }))
    }

    struct Refuses {
        core: TaskCore,
    }

    impl Task for Refuses {
        fn core(&self) -> &TaskCore {
            &self.core
        }
        fn on_start(&self) -> bool {
            false
        }
    }

    #[test]
    fn execute_without_model_fails() {
        let kernel = Kernel::new("main");
        assert_eq!(kernel.execute(), ExecutionResult::Failure);
    }

    #[test]
    fn execute_fails_when_a_task_refuses_to_start() {
        let kernel = Kernel::new("main");
        kernel.set_execution_model(Arc::new(RunForeverModel));
        kernel.add_shared_task(Arc::new(Refuses {
            core: TaskCore::new("cursor", 1),
        }));
        assert_eq!(kernel.execute(), ExecutionResult::Failure);
        assert_eq!(kernel.frame_count(), 0);
    }

    #[test]
    fn run_forever_ends_when_stopped() {
        let kernel = Arc::new(Kernel::new("main"));
        kernel.set_execution_model(Arc::new(RunForeverModel));
        kernel.add_shared_task(counting_task("ticker", 10, &kernel));

        assert_eq!(kernel.execute(), ExecutionResult::Success);
        assert_eq!(kernel.frame_count(), 10);
        assert!(!kernel.has_at_least_one_task());
    }

    #[test]
    fn process_frame_returns_false_without_tasks() {
        let kernel = Kernel::new("main");
        assert!(!kernel.process_frame());
        kernel.add_shared_task(Arc::new(FunctionTask::new("idle", 0, |_| {})));
        assert!(kernel.process_frame());
        assert_eq!(kernel.frame_count(), 2);
        // The limiter was never started.
        assert_eq!(kernel.last_frame_time(), Duration::ZERO);
    }

    #[test]
    fn external_controller_leaves_frames_to_the_host() {
        let kernel = Kernel::new("android");
        kernel.set_execution_model(Arc::new(ExternalControllerModel));
        kernel.add_shared_task(Arc::new(FunctionTask::new("render", 0, |_| {})));

        assert_eq!(kernel.execute(), ExecutionResult::Incomplete);
        assert!(kernel.process_frame());
        assert_eq!(kernel.frame_count(), 1);
    }

    #[test]
    fn pause_kernel_overrides_unpausable_tasks() {
        let kernel = Kernel::new("main");
        let audio = Arc::new(FunctionTask::new("audio", 0, |_| {}));
        audio.core().set_pausable(false);
        kernel.add_task(audio.clone());

        kernel.pause_kernel(true);
        assert!(audio.is_paused());
        assert_eq!(kernel.number_of_active_tasks(false), 0);

        kernel.resume_kernel(true);
        assert!(!audio.is_paused());
    }

    #[test]
    fn pause_hint_is_advisory() {
        let kernel = Kernel::new("main");
        kernel.set_pause_hint(true);
        assert!(kernel.pause_hint());

        // Nothing is paused by the hint itself.
        let task = Arc::new(FunctionTask::new("menu", 0, |_| {}));
        kernel.add_task(task.clone());
        assert!(kernel.process_frame());
        assert!(!task.is_paused());
    }

    #[test]
    fn from_config_applies_frame_cap() {
        let config = KernelConfig {
            target_frame_rate: Some(100.0),
            ..KernelConfig::default()
        };
        let kernel = Kernel::from_config("capped", &config);
        let min = kernel.with_frame_rate_limiter(|limiter| limiter.min_frame_time());
        assert_eq!(min, Duration::from_millis(10));
    }
}
