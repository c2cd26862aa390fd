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

//! OS threads hosting a kernel or a plain function.

mod task_thread;

pub use task_thread::TaskThread;

use crate::error::ThreadError;
use crate::kernel::Kernel;
use crate::lock;
use crate::model::{ExecutionResult, RunForeverModel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Work run by a thread when it is executed.
pub type ThreadFunction = Arc<dyn Fn() + Send + Sync>;

/// Per-platform contract for running a function on a new OS thread.
pub trait ThreadImplementation: Send {
    /// Runs `work` on a new OS thread called `name`.
    fn start(&mut self, name: &str, work: Box<dyn FnOnce() + Send>) -> Result<(), ThreadError>;

    /// Blocks until the last started thread returned. Returns false if no
    /// thread was running or if it panicked.
    fn join(&mut self) -> bool;
}

/// [`ThreadImplementation`] backed by [`std::thread`].
#[derive(Debug, Default)]
pub struct StdThreadImplementation {
    handle: Option<JoinHandle<()>>,
}

impl ThreadImplementation for StdThreadImplementation {
    fn start(&mut self, name: &str, work: Box<dyn FnOnce() + Send>) -> Result<(), ThreadError> {
        // Reap the previous run; it has already finished its work.
        self.join();
        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(work)
            .map_err(|source| ThreadError::Spawn {
                name: name.to_owned(),
                source,
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
        match handle.join() {
            Ok(()) => true,
            Err(_) => {
                log::error!("Thread '{name}' panicked.");
                false
            }
        }
    }
}

#[derive(Default)]
struct SignalState {
    generation: u64,
    pending: bool,
    waiters: usize,
}

/// Broadcast signal.
///
/// A notification wakes every thread waiting when it arrives, each of them
/// exactly once; a thread that waits again blocks until the next one. A
/// notification sent while nobody waits is kept for the next waiter.
#[derive(Default)]
struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl Signal {
    fn wait(&self) {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.pending) {
            return;
        }
        let generation = state.generation;
        state.waiters += 1;
        while state.generation == generation {
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiters -= 1;
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.pending) {
            return true;
        }
        let generation = state.generation;
        state.waiters += 1;
        while state.generation == generation {
            let now = Instant::now();
            if now >= deadline {
                state.waiters -= 1;
                return false;
            }
            state = self
                .condvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.waiters -= 1;
        true
    }

    fn notify(&self) {
        let mut state = lock(&self.state);
        if state.waiters == 0 {
            state.pending = true;
        } else {
            state.generation = state.generation.wrapping_add(1);
        }
        drop(state);
        self.condvar.notify_all();
    }
}

#[derive(Clone)]
enum Work {
    Function(ThreadFunction),
    Kernel(Arc<Kernel>),
}

#[derive(Default)]
struct Shared {
    executing: AtomicBool,
    last_result: Mutex<Option<ExecutionResult>>,
    signal: Signal,
}

/// Clears the executing flag when the worker finishes, panicking or not.
struct ExecutingGuard(Arc<Shared>);

impl Drop for ExecutingGuard {
    fn drop(&mut self) {
        self.0.executing.store(false, Ordering::Release);
    }
}

/// An OS thread running either a [`ThreadFunction`] or a shared [`Kernel`].
///
/// The thread can be executed again once its previous run returned.
/// Dropping a thread that is still executing logs an error and leaves the
/// OS thread detached: call [`terminate`](Self::terminate) or
/// [`join`](Self::join) first.
pub struct Thread {
    name: String,
    implementation: Mutex<Box<dyn ThreadImplementation>>,
    work: Work,
    completion: Option<ThreadFunction>,
    shared: Arc<Shared>,
}

impl Thread {
    /// Creates a thread running `function`.
    pub fn with_function<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_work(name.into(), Work::Function(Arc::new(function)))
    }

    /// Creates a thread running `kernel`.
    ///
    /// A kernel without execution model is given a [`RunForeverModel`] when
    /// the thread executes.
    pub fn with_kernel(name: impl Into<String>, kernel: Arc<Kernel>) -> Self {
        Self::with_work(name.into(), Work::Kernel(kernel))
    }

    fn with_work(name: String, work: Work) -> Self {
        Self {
            name,
            implementation: Mutex::new(Box::new(StdThreadImplementation::default())),
            work,
            completion: None,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Replaces the platform implementation.
    pub fn with_implementation(mut self, implementation: Box<dyn ThreadImplementation>) -> Self {
        self.implementation = Mutex::new(implementation);
        self
    }

    /// Sets a callback run on the worker thread after the work returned.
    pub fn on_completion<F>(mut self, completion: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.completion = Some(Arc::new(completion));
        self
    }

    /// Returns the thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the hosted kernel, if any.
    pub fn kernel(&self) -> Option<&Arc<Kernel>> {
        match &self.work {
            Work::Kernel(kernel) => Some(kernel),
            Work::Function(_) => None,
        }
    }

    /// Returns true between a successful [`execute`](Self::execute) and the
    /// end of the work.
    pub fn is_executing(&self) -> bool {
        self.shared.executing.load(Ordering::Acquire)
    }

    /// Returns how the last kernel run ended. Always `None` for function
    /// threads.
    pub fn last_result(&self) -> Option<ExecutionResult> {
        *lock(&self.shared.last_result)
    }

    /// Starts the work on a new OS thread. Returns false if the thread is
    /// already executing or could not be spawned.
    pub fn execute(&self) -> bool {
        match self.try_execute() {
            Ok(()) => true,
            Err(error) => {
                log::warn!("{error}");
                false
            }
        }
    }

    /// Like [`execute`](Self::execute), reporting why the thread did not
    /// start.
    pub fn try_execute(&self) -> Result<(), ThreadError> {
        if self
            .shared
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ThreadError::AlreadyExecuting(self.name.clone()));
        }

        if let Work::Kernel(kernel) = &self.work {
            if kernel.execution_model().is_none() {
                log::debug!(
                    "Thread '{}': kernel has no execution model, using RunForeverModel.",
                    self.name
                );
                kernel.set_execution_model(Arc::new(RunForeverModel));
            }
        }

        let guard = ExecutingGuard(Arc::clone(&self.shared));
        let shared = Arc::clone(&self.shared);
        let work = self.work.clone();
        let completion = self.completion.clone();
        let body = move || {
            let _executing = guard;
            match work {
                Work::Function(function) => function(),
                Work::Kernel(kernel) => {
                    let result = kernel.execute();
                    *lock(&shared.last_result) = Some(result);
                }
            }
            if let Some(completion) = completion {
                completion();
            }
        };

        // On failure the closure is dropped unrun, and the guard with it.
        lock(&self.implementation).start(&self.name, Box::new(body))?;
        log::debug!("Thread '{}' started.", self.name);
        Ok(())
    }

    /// Blocks until the work returned. Returns false if the thread was not
    /// started or panicked.
    pub fn join(&self) -> bool {
        lock(&self.implementation).join()
    }

    /// Asks the work to end. A hosted kernel is stopped and returns at its
    /// next frame boundary; a function cannot be interrupted.
    pub fn terminate(&self, wait_for_termination: bool) {
        match &self.work {
            Work::Kernel(kernel) => kernel.stop(),
            Work::Function(_) => log::warn!(
                "Thread '{}': a function thread cannot be terminated, only joined.",
                self.name
            ),
        }
        if wait_for_termination {
            self.join();
        }
    }

    /// Blocks until [`notify`](Self::notify) is called.
    pub fn wait(&self) {
        self.shared.signal.wait();
    }

    /// Blocks until [`notify`](Self::notify) is called or `timeout` elapsed.
    /// Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.signal.wait_timeout(timeout)
    }

    /// Wakes every thread blocked in [`wait`](Self::wait).
    pub fn notify(&self) {
        self.shared.signal.notify();
    }

    /// Puts the calling thread to sleep.
    pub fn sleep(duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.is_executing() {
            log::error!(
                "Thread '{}' dropped while still executing; it will not be joined.",
                self.name
            );
            return;
        }
        self.implementation
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .join();
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("executing", &self.is_executing())
            .finish()
    }
}
