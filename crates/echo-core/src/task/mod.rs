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

//! Units of periodic work and the containers that drive them.

mod function;
mod group;
mod manager;

pub use function::FunctionTask;
pub use group::TaskGroup;
pub use manager::{ManagerId, TaskManager};

use manager::ManagerInner;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

/// Ordering key of a task inside a [`TaskManager`]. Lower values run first.
pub type TaskPriority = u32;

/// Priority given to tasks that do not ask for a specific one.
pub const DEFAULT_PRIORITY: TaskPriority = 5000;

/// Process-unique identity of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by every task: identity, ordering key, lifecycle flags and
/// the back-references to the managers holding the task.
///
/// The back-references never keep a manager alive. When the owning task is
/// dropped, the core removes it from every manager it is still registered in.
#[derive(Debug)]
pub struct TaskCore {
    id: TaskId,
    name: RwLock<String>,
    priority: AtomicU32,
    started: AtomicBool,
    paused: AtomicBool,
    pausable: AtomicBool,
    managers: Mutex<Vec<(ManagerId, Weak<ManagerInner>)>>,
}

impl TaskCore {
    /// Creates the state for a pausable, un-started task.
    pub fn new(name: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            id: TaskId::next(),
            name: RwLock::new(name.into()),
            priority: AtomicU32::new(priority),
            started: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            pausable: AtomicBool::new(true),
            managers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the identity of the task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns a copy of the task name.
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if the task is called `name`.
    pub fn has_name(&self, name: &str) -> bool {
        *self.name.read().unwrap_or_else(PoisonError::into_inner) == name
    }

    /// Renames the task.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.into();
    }

    /// Returns the ordering key of the task.
    pub fn priority(&self) -> TaskPriority {
        self.priority.load(Ordering::Acquire)
    }

    /// Changes the ordering key; every manager holding the task re-sorts.
    pub fn set_priority(&self, priority: TaskPriority) {
        if self.priority.swap(priority, Ordering::AcqRel) == priority {
            return;
        }
        for manager in self.task_managers() {
            manager.task_priority_changed(self.id, priority);
        }
    }

    /// Returns true once `on_start` succeeded and until the task is stopped.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns true while the task is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Returns true if a non-forced pause request is honoured.
    pub fn is_pausable(&self) -> bool {
        self.pausable.load(Ordering::Acquire)
    }

    /// Controls whether non-forced pause requests are honoured.
    pub fn set_pausable(&self, pausable: bool) {
        self.pausable.store(pausable, Ordering::Release);
    }

    /// Returns handles to every live manager holding the task, in the order
    /// the task was added to them.
    pub fn task_managers(&self) -> Vec<TaskManager> {
        lock(&self.managers)
            .iter()
            .filter_map(|(_, manager)| manager.upgrade())
            .map(TaskManager::from_inner)
            .collect()
    }

    /// Returns the number of managers holding the task.
    pub fn number_of_task_managers(&self) -> usize {
        lock(&self.managers).len()
    }

    /// Returns the sole manager holding the task, or `None` when the task is
    /// held by zero or several managers.
    pub fn single_task_manager(&self) -> Option<TaskManager> {
        let managers = lock(&self.managers);
        match managers.as_slice() {
            [(_, manager)] => manager.upgrade().map(TaskManager::from_inner),
            _ => None,
        }
    }

    /// Returns true if the manager identified by `manager` holds the task.
    pub fn is_managed_by(&self, manager: ManagerId) -> bool {
        lock(&self.managers).iter().any(|(id, _)| *id == manager)
    }

    pub(crate) fn add_task_manager(&self, id: ManagerId, manager: Weak<ManagerInner>) -> bool {
        let mut managers = lock(&self.managers);
        if managers.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        managers.push((id, manager));
        true
    }

    pub(crate) fn remove_task_manager(&self, id: ManagerId) -> bool {
        let mut managers = lock(&self.managers);
        let before = managers.len();
        managers.retain(|(existing, _)| *existing != id);
        managers.len() != before
    }

    fn mark_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    /// Flips `paused` to `value`; returns false if it already held it.
    fn transition_paused(&self, value: bool) -> bool {
        self.paused
            .compare_exchange(!value, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Drop for TaskCore {
    fn drop(&mut self) {
        let managers = std::mem::take(
            self.managers
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for manager in managers.iter().filter_map(|(_, manager)| manager.upgrade()) {
            TaskManager::from_inner(manager).forget_task(self.id);
        }
    }
}

/// A unit of periodic work.
///
/// Implementors embed a [`TaskCore`] and override the hooks they need. All
/// hooks take `&self`: tasks are shared as `Arc<dyn Task>`, may be held by
/// several managers at once and may run on a kernel thread, so mutable task
/// state lives behind the implementor's own interior mutability. Managers
/// never hold their own locks while calling a hook, which lets a task pause
/// itself or leave its manager from inside [`Task::update`].
///
/// The lifecycle operations (`start`, `stop`, `pause`, `resume`) live in
/// [`TaskExt`] and are available on every task.
pub trait Task: Send + Sync {
    /// Returns the shared task state.
    fn core(&self) -> &TaskCore;

    /// Performs one tick of work. `dt` is the duration of the previous frame.
    fn update(&self, _dt: Duration) {}

    /// Called by [`TaskExt::start`]. Returning false vetoes the start, e.g.
    /// when a required collaborator is missing.
    fn on_start(&self) -> bool {
        true
    }

    /// Called by [`TaskExt::stop`].
    fn on_stop(&self) {}

    /// Called after the task became paused. `application_pause` is true when
    /// the pause comes from the host application being suspended.
    fn on_pause(&self, _application_pause: bool) {}

    /// Called after the task became active again.
    fn on_resume(&self, _application_resume: bool) {}

    /// Returns the nested manager when the task is a group.
    fn as_task_manager(&self) -> Option<&TaskManager> {
        None
    }
}

/// Lifecycle operations shared by every [`Task`].
pub trait TaskExt: Task {
    /// Returns the identity of the task.
    fn id(&self) -> TaskId {
        self.core().id()
    }

    /// Returns a copy of the task name.
    fn name(&self) -> String {
        self.core().name()
    }

    /// Returns the ordering key of the task.
    fn priority(&self) -> TaskPriority {
        self.core().priority()
    }

    /// Returns true once the task started successfully.
    fn is_started(&self) -> bool {
        self.core().is_started()
    }

    /// Returns true while the task is paused.
    fn is_paused(&self) -> bool {
        self.core().is_paused()
    }

    /// Starts the task.
    ///
    /// Returns true immediately when already started. Otherwise the task only
    /// counts as started if [`Task::on_start`] accepted.
    fn start(&self) -> bool {
        let core = self.core();
        if core.is_started() {
            return true;
        }
        if self.on_start() {
            core.mark_started(true);
            log::debug!("Task '{}' started.", core.name());
            true
        } else {
            log::warn!("Task '{}' refused to start.", core.name());
            false
        }
    }

    /// Stops the task and clears its started flag.
    fn stop(&self) {
        self.on_stop();
        self.core().mark_started(false);
        log::debug!("Task '{}' stopped.", self.core().name());
    }

    /// Pauses the task and notifies every manager holding it.
    ///
    /// Does nothing when the task is already paused, or when it is not
    /// pausable and `force_pause` is false.
    fn pause(&self, application_pause: bool, force_pause: bool) {
        let core = self.core();
        if core.is_paused() || (!core.is_pausable() && !force_pause) {
            return;
        }
        if !core.transition_paused(true) {
            return;
        }
        for manager in core.task_managers() {
            manager.task_was_paused(core.id());
        }
        log::trace!("Task '{}' paused.", core.name());
        self.on_pause(application_pause);
    }

    /// Resumes a paused task and notifies every manager holding it.
    fn resume(&self, application_resume: bool) {
        let core = self.core();
        if !core.transition_paused(false) {
            return;
        }
        for manager in core.task_managers() {
            manager.task_was_resumed(core.id());
        }
        log::trace!("Task '{}' resumed.", core.name());
        self.on_resume(application_resume);
    }

    /// Returns the sole manager holding the task, if exactly one does.
    fn single_task_manager(&self) -> Option<TaskManager> {
        self.core().single_task_manager()
    }
}

impl<T: Task + ?Sized> TaskExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct Hooks {
        starts: AtomicUsize,
        stops: AtomicUsize,
        pauses: AtomicUsize,
        resumes: AtomicUsize,
    }

    struct ProbeTask {
        core: TaskCore,
        hooks: Hooks,
        accept_start: bool,
    }

    impl ProbeTask {
        fn new(name: &str, accept_start: bool) -> Self {
            Self {
                core: TaskCore::new(name, DEFAULT_PRIORITY),
                hooks: Hooks::default(),
                accept_start,
            }
        }
    }

    impl Task for ProbeTask {
        fn core(&self) -> &TaskCore {
            &self.core
        }
        fn on_start(&self) -> bool {
            self.hooks.starts.fetch_add(1, Ordering::SeqCst);
            self.accept_start
        }
        fn on_stop(&self) {
            self.hooks.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn on_pause(&self, _application_pause: bool) {
            self.hooks.pauses.fetch_add(1, Ordering::SeqCst);
        }
        fn on_resume(&self, _application_resume: bool) {
            self.hooks.resumes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn start_is_idempotent_once_started() {
        let task = ProbeTask::new("probe", true);
        assert!(task.start());
        assert!(task.start());
        assert!(task.is_started());
        assert_eq!(task.hooks.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn vetoed_start_leaves_task_unstarted() {
        let task = ProbeTask::new("cursor", false);
        assert!(!task.start());
        assert!(!task.is_started());
        // A second attempt asks the hook again.
        assert!(!task.start());
        assert_eq!(task.hooks.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stop_clears_started() {
        let task = ProbeTask::new("probe", true);
        task.start();
        task.stop();
        assert!(!task.is_started());
        assert_eq!(task.hooks.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pause_resume_invokes_hooks_once() {
        let task = ProbeTask::new("probe", true);
        task.pause(false, false);
        task.pause(false, false);
        assert!(task.is_paused());
        assert_eq!(task.hooks.pauses.load(Ordering::SeqCst), 1);

        task.resume(false);
        task.resume(false);
        assert!(!task.is_paused());
        assert_eq!(task.hooks.resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unpausable_task_ignores_unforced_pause() {
        let task = ProbeTask::new("audio", true);
        task.core().set_pausable(false);

        task.pause(false, false);
        assert!(!task.is_paused());

        task.pause(true, true);
        assert!(task.is_paused());
        assert_eq!(task.hooks.pauses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_task_manager_requires_exactly_one_owner() {
        let task: Arc<dyn Task> = Arc::new(ProbeTask::new("probe", true));
        assert!(task.single_task_manager().is_none());

        let first = TaskManager::new("first");
        first.add_task(task.clone());
        let sole = task.single_task_manager().expect("one owner");
        assert_eq!(sole, first);

        let second = TaskManager::new("second");
        second.add_task(task.clone());
        assert!(task.single_task_manager().is_none());
        assert_eq!(task.core().number_of_task_managers(), 2);
    }

    #[test]
    fn task_ids_are_unique() {
        let a = TaskCore::new("a", 0);
        let b = TaskCore::new("a", 0);
        assert_ne!(a.id(), b.id());
    }
}
