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

//! Ordered task container driving `Task::update` once per tick.

use super::{lock, Task, TaskExt, TaskId, TaskPriority};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Process-unique identity of a [`TaskManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(u64);

impl ManagerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a manager refers to one of its tasks.
enum TaskRef {
    /// The manager keeps the task alive until it is removed.
    Shared(Arc<dyn Task>),
    /// The caller owns the task; the manager only dispatches to it.
    Borrowed(Weak<dyn Task>),
}

impl TaskRef {
    fn get(&self) -> Option<Arc<dyn Task>> {
        match self {
            TaskRef::Shared(task) => Some(Arc::clone(task)),
            TaskRef::Borrowed(task) => task.upgrade(),
        }
    }

    fn is_shared(&self) -> bool {
        matches!(self, TaskRef::Shared(_))
    }
}

struct Entry {
    id: TaskId,
    priority: TaskPriority,
    sequence: u64,
    paused: bool,
    task: TaskRef,
}

#[derive(Default)]
struct ManagerState {
    entries: Vec<Entry>,
    active: usize,
    next_sequence: u64,
    running: bool,
}

impl ManagerState {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn take(&mut self, index: usize) -> Entry {
        let entry = self.entries.remove(index);
        if !entry.paused {
            self.active -= 1;
        }
        entry
    }
}

pub(crate) struct ManagerInner {
    id: ManagerId,
    name: String,
    state: Mutex<ManagerState>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let state = std::mem::take(
            self.state
                .get_mut()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for task in state.entries.iter().filter_map(|entry| entry.task.get()) {
            task.core().remove_task_manager(self.id);
        }
    }
}

/// An ordered collection of tasks.
///
/// Tasks run in ascending priority order, ties broken by insertion order.
/// `TaskManager` is a cheap handle: clones refer to the same collection. The
/// collection is released when the last handle is dropped, at which point
/// every task forgets the manager.
///
/// Shallow task counts are maintained incrementally; the pause/resume
/// operations of [`TaskExt`] report back through
/// [`task_was_paused`](Self::task_was_paused) and
/// [`task_was_resumed`](Self::task_was_resumed).
///
/// A manager is running between [`start_tasks`](Self::start_tasks) and
/// [`stop_tasks`](Self::stop_tasks). A running manager starts every task
/// added to it and only updates started tasks. A manager that was never
/// started is a plain container: [`update_tasks`](Self::update_tasks)
/// drives each of its active tasks.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    /// Creates an empty manager.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                id: ManagerId::next(),
                name: name.into(),
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    /// Returns the identity of the manager.
    pub fn id(&self) -> ManagerId {
        self.inner.id
    }

    /// Returns the manager name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Registers a task the caller keeps alive.
    ///
    /// The manager only holds a weak reference: dropping the last `Arc`
    /// removes the task from the manager. Returns false if the task is
    /// already registered.
    pub fn add_task(&self, task: Arc<dyn Task>) -> bool {
        let reference = TaskRef::Borrowed(Arc::downgrade(&task));
        self.insert(&task, reference)
    }

    /// Registers a task and keeps it alive until it is removed.
    ///
    /// Returns false if the task is already registered.
    pub fn add_shared_task(&self, task: Arc<dyn Task>) -> bool {
        let reference = TaskRef::Shared(Arc::clone(&task));
        self.insert(&task, reference)
    }

    fn insert(&self, task: &Arc<dyn Task>, reference: TaskRef) -> bool {
        let core = task.core();
        // The back-reference goes first: a pause racing with the insertion
        // then either reaches this manager or is seen by `is_paused` below.
        let registered = core.add_task_manager(self.inner.id, Arc::downgrade(&self.inner));
        let running = {
            let mut state = lock(&self.inner.state);
            if state.position(core.id()).is_some() {
                drop(state);
                if registered {
                    core.remove_task_manager(self.inner.id);
                }
                log::warn!(
                    "TaskManager '{}': task '{}' is already registered.",
                    self.inner.name,
                    core.name()
                );
                return false;
            }

            let priority = core.priority();
            let paused = core.is_paused();
            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let index = state
                .entries
                .partition_point(|entry| entry.priority <= priority);
            state.entries.insert(
                index,
                Entry {
                    id: core.id(),
                    priority,
                    sequence,
                    paused,
                    task: reference,
                },
            );
            if !paused {
                state.active += 1;
            }
            state.running
        };
        log::debug!(
            "TaskManager '{}': added task '{}' (priority={})",
            self.inner.name,
            core.name(),
            core.priority()
        );
        if running && !task.start() {
            log::warn!(
                "TaskManager '{}': task '{}' added while running failed to start.",
                self.inner.name,
                core.name()
            );
        }
        true
    }

    /// Removes a task. Returns false if it was not registered.
    ///
    /// May be called while [`update_tasks`](Self::update_tasks) is running,
    /// including by the task being removed.
    pub fn remove_task(&self, task: &dyn Task) -> bool {
        self.remove_by_id(task.core().id())
    }

    /// Removes the first task called `name`. Returns false if none matched.
    pub fn remove_task_by_name(&self, name: &str) -> bool {
        let found = self
            .tasks()
            .into_iter()
            .find(|task| task.core().has_name(name));
        match found {
            Some(task) => self.remove_task(task.as_ref()),
            None => false,
        }
    }

    fn remove_by_id(&self, id: TaskId) -> bool {
        let entry = {
            let mut state = lock(&self.inner.state);
            match state.position(id) {
                Some(index) => state.take(index),
                None => return false,
            }
        };
        // The entry may hold the last reference to the task, so it is
        // released only after the state lock is gone.
        if let Some(task) = entry.task.get() {
            task.core().remove_task_manager(self.inner.id);
            log::debug!(
                "TaskManager '{}': removed task '{}'",
                self.inner.name,
                task.core().name()
            );
        }
        drop(entry);
        true
    }

    /// Removes every task.
    pub fn remove_all_tasks(&self) {
        let entries = {
            let mut state = lock(&self.inner.state);
            state.active = 0;
            std::mem::take(&mut state.entries)
        };
        for task in entries.iter().filter_map(|entry| entry.task.get()) {
            task.core().remove_task_manager(self.inner.id);
        }
        if !entries.is_empty() {
            log::debug!(
                "TaskManager '{}': removed all {} tasks",
                self.inner.name,
                entries.len()
            );
        }
    }

    /// Removes the entry of a task that is being destroyed.
    pub(crate) fn forget_task(&self, id: TaskId) {
        let entry = {
            let mut state = lock(&self.inner.state);
            state.position(id).map(|index| state.take(index))
        };
        drop(entry);
    }

    /// Returns a snapshot of the tasks in update order.
    pub fn tasks(&self) -> Vec<Arc<dyn Task>> {
        lock(&self.inner.state)
            .entries
            .iter()
            .filter_map(|entry| entry.task.get())
            .collect()
    }

    /// Returns true if the task is registered in this manager.
    pub fn contains(&self, task: &dyn Task) -> bool {
        lock(&self.inner.state)
            .position(task.core().id())
            .is_some()
    }

    /// Starts every task that is not started yet and marks the manager as
    /// running.
    ///
    /// Returns true only if every task is started afterwards. Tasks that
    /// refuse to start stay registered and un-started.
    pub fn start_tasks(&self) -> bool {
        lock(&self.inner.state).running = true;
        let mut all_started = true;
        for task in self.tasks() {
            if !task.is_started() && !task.start() {
                log::warn!(
                    "TaskManager '{}': task '{}' failed to start.",
                    self.inner.name,
                    task.name()
                );
                all_started = false;
            }
        }
        all_started
    }

    /// Stops every started task. The manager is no longer running.
    pub fn stop_tasks(&self) {
        lock(&self.inner.state).running = false;
        for task in self.tasks() {
            if task.is_started() {
                task.stop();
            }
        }
    }

    /// Calls `update(dt)` once on every non-paused task, in priority order.
    /// A running manager skips the tasks that are not started.
    ///
    /// The pass works on a snapshot taken when it begins. A task removed or
    /// paused by an earlier task of the same pass is skipped; tasks added
    /// during the pass run from the next pass on.
    pub fn update_tasks(&self, dt: Duration) {
        let (running, snapshot): (bool, Vec<Arc<dyn Task>>) = {
            let state = lock(&self.inner.state);
            let snapshot = state
                .entries
                .iter()
                .filter(|entry| !entry.paused)
                .filter_map(|entry| entry.task.get())
                .collect();
            (state.running, snapshot)
        };

        for task in snapshot {
            let core = task.core();
            if core.is_paused() || !core.is_managed_by(self.inner.id) {
                continue;
            }
            if running && !core.is_started() {
                continue;
            }
            task.update(dt);
        }
    }

    /// Pauses every task of this manager (not recursively).
    pub fn pause_all_tasks(&self, application_pause: bool, force_pause: bool) {
        for task in self.tasks() {
            task.pause(application_pause, force_pause);
        }
    }

    /// Resumes every task of this manager (not recursively).
    pub fn resume_all_tasks(&self, application_resume: bool) {
        for task in self.tasks() {
            task.resume(application_resume);
        }
    }

    /// Finds a task by name. With `deep`, groups are searched recursively
    /// after the direct members.
    pub fn find_task(&self, name: &str, deep: bool) -> Option<Arc<dyn Task>> {
        let tasks = self.tasks();
        if let Some(task) = tasks.iter().find(|task| task.core().has_name(name)) {
            return Some(Arc::clone(task));
        }
        if deep {
            return tasks.iter().find_map(|task| {
                task.as_task_manager()
                    .and_then(|manager| manager.find_task(name, true))
            });
        }
        None
    }

    /// Like [`find_task`](Self::find_task) but only yields tasks that were
    /// registered with [`add_shared_task`](Self::add_shared_task).
    pub fn find_shared_task(&self, name: &str, deep: bool) -> Option<Arc<dyn Task>> {
        let (shared, all): (Vec<Arc<dyn Task>>, Vec<Arc<dyn Task>>) = {
            let state = lock(&self.inner.state);
            let shared = state
                .entries
                .iter()
                .filter(|entry| entry.task.is_shared())
                .filter_map(|entry| entry.task.get())
                .collect();
            let all = state
                .entries
                .iter()
                .filter_map(|entry| entry.task.get())
                .collect();
            (shared, all)
        };
        if let Some(task) = shared.iter().find(|task| task.core().has_name(name)) {
            return Some(Arc::clone(task));
        }
        if deep {
            return all.iter().find_map(|task| {
                task.as_task_manager()
                    .and_then(|manager| manager.find_shared_task(name, true))
            });
        }
        None
    }

    /// Returns true between [`start_tasks`](Self::start_tasks) and
    /// [`stop_tasks`](Self::stop_tasks).
    pub fn is_running(&self) -> bool {
        lock(&self.inner.state).running
    }

    /// Returns true while the manager holds at least one task.
    pub fn has_at_least_one_task(&self) -> bool {
        !lock(&self.inner.state).entries.is_empty()
    }

    /// Returns the number of tasks. With `deep`, tasks nested in groups are
    /// counted too.
    pub fn number_of_tasks(&self, deep: bool) -> usize {
        let direct = lock(&self.inner.state).entries.len();
        if !deep {
            return direct;
        }
        direct
            + self
                .tasks()
                .iter()
                .filter_map(|task| task.as_task_manager().map(|m| m.number_of_tasks(true)))
                .sum::<usize>()
    }

    /// Returns the number of non-paused tasks. With `deep`, non-paused tasks
    /// nested in groups are counted too.
    pub fn number_of_active_tasks(&self, deep: bool) -> usize {
        let direct = lock(&self.inner.state).active;
        if !deep {
            return direct;
        }
        direct
            + self
                .tasks()
                .iter()
                .filter_map(|task| {
                    task.as_task_manager()
                        .map(|m| m.number_of_active_tasks(true))
                })
                .sum::<usize>()
    }

    /// Bookkeeping hook called when a registered task becomes paused.
    pub fn task_was_paused(&self, id: TaskId) {
        self.sync_paused(id);
    }

    /// Bookkeeping hook called when a registered task becomes active.
    pub fn task_was_resumed(&self, id: TaskId) {
        self.sync_paused(id);
    }

    /// Copies the pause flag of a task into its entry, so notifications
    /// arriving out of order from several threads still settle on the
    /// task's current state.
    fn sync_paused(&self, id: TaskId) {
        // Declared first so the task reference is released after the lock.
        let task;
        let mut state = lock(&self.inner.state);
        let Some(index) = state.position(id) else {
            return;
        };
        task = state.entries[index].task.get();
        let Some(paused) = task.as_ref().map(|task| task.core().is_paused()) else {
            return;
        };
        let entry = &mut state.entries[index];
        if entry.paused != paused {
            entry.paused = paused;
            if paused {
                state.active -= 1;
            } else {
                state.active += 1;
            }
        }
    }

    pub(crate) fn task_priority_changed(&self, id: TaskId, priority: TaskPriority) {
        let mut state = lock(&self.inner.state);
        if let Some(index) = state.position(id) {
            state.entries[index].priority = priority;
            state
                .entries
                .sort_by_key(|entry| (entry.priority, entry.sequence));
        }
    }
}

impl PartialEq for TaskManager {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for TaskManager {}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("TaskManager")
            .field("name", &self.inner.name)
            .field("tasks", &state.entries.len())
            .field("active", &state.active)
            .finish()
    }
}

impl fmt::Debug for ManagerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerInner")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskCore, DEFAULT_PRIORITY};
    use std::sync::atomic::AtomicUsize;

    type UpdateLog = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        core: TaskCore,
        log: UpdateLog,
        updates: AtomicUsize,
    }

    impl Recorder {
        fn new(name: &str, priority: TaskPriority, log: &UpdateLog) -> Arc<Self> {
            Arc::new(Self {
                core: TaskCore::new(name, priority),
                log: Arc::clone(log),
                updates: AtomicUsize::new(0),
            })
        }
    }

    impl Task for Recorder {
        fn core(&self) -> &TaskCore {
            &self.core
        }
        fn update(&self, _dt: Duration) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            lock(&self.log).push(self.core.name());
        }
    }

    /// Removes itself from its only manager on the first update.
    struct Quitter {
        core: TaskCore,
    }

    impl Task for Quitter {
        fn core(&self) -> &TaskCore {
            &self.core
        }
        fn update(&self, _dt: Duration) {
            if let Some(manager) = self.single_task_manager() {
                manager.remove_task(self);
            }
        }
    }

    #[test]
    fn add_rejects_duplicates() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let task = Recorder::new("a", 10, &log);
        assert!(manager.add_task(task.clone()));
        assert!(!manager.add_task(task.clone()));
        assert!(!manager.add_shared_task(task.clone()));
        assert_eq!(manager.number_of_tasks(false), 1);
    }

    #[test]
    fn update_runs_in_ascending_priority_then_insertion_order() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let late = Recorder::new("late", 20, &log);
        let early = Recorder::new("early", 10, &log);
        let tie = Recorder::new("tie", 10, &log);
        manager.add_task(late.clone());
        manager.add_task(early.clone());
        manager.add_task(tie.clone());

        manager.update_tasks(Duration::from_secs(1));

        assert_eq!(*lock(&log), vec!["early", "tie", "late"]);
    }

    #[test]
    fn paused_tasks_are_skipped_and_counted() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let a = Recorder::new("a", 10, &log);
        let b = Recorder::new("b", 20, &log);
        manager.add_task(a.clone());
        manager.add_task(b.clone());

        a.pause(false, false);
        assert_eq!(manager.number_of_active_tasks(false), 1);

        manager.update_tasks(Duration::from_secs(1));
        assert_eq!(*lock(&log), vec!["b"]);

        a.resume(false);
        assert_eq!(manager.number_of_active_tasks(false), 2);
    }

    #[test]
    fn pause_is_reported_to_every_owning_manager() {
        let log = UpdateLog::default();
        let first = TaskManager::new("first");
        let second = TaskManager::new("second");
        let task = Recorder::new("shared", 10, &log);
        first.add_task(task.clone());
        second.add_task(task.clone());

        task.pause(false, false);
        assert_eq!(first.number_of_active_tasks(false), 0);
        assert_eq!(second.number_of_active_tasks(false), 0);
    }

    #[test]
    fn dropping_a_borrowed_task_unregisters_it() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let task = Recorder::new("temp", 10, &log);
        manager.add_task(task.clone());
        assert_eq!(manager.number_of_tasks(false), 1);

        drop(task);
        assert_eq!(manager.number_of_tasks(false), 0);
        assert_eq!(manager.number_of_active_tasks(false), 0);
    }

    #[test]
    fn shared_tasks_are_kept_alive() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        manager.add_shared_task(Recorder::new("owned", 10, &log));
        manager.add_task(Recorder::new("borrowed", 10, &log));

        assert_eq!(manager.number_of_tasks(false), 1);
        assert!(manager.find_shared_task("owned", false).is_some());
        assert!(manager.find_task("borrowed", false).is_none());
    }

    #[test]
    fn find_shared_task_ignores_borrowed_entries() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let borrowed = Recorder::new("borrowed", 10, &log);
        manager.add_task(borrowed.clone());

        assert!(manager.find_task("borrowed", false).is_some());
        assert!(manager.find_shared_task("borrowed", false).is_none());
    }

    #[test]
    fn task_can_remove_itself_during_update() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let quitter = Arc::new(Quitter {
            core: TaskCore::new("quitter", 1),
        });
        let after = Recorder::new("after", 2, &log);
        manager.add_task(quitter.clone());
        manager.add_task(after.clone());

        manager.update_tasks(Duration::from_millis(16));

        assert!(!manager.contains(quitter.as_ref()));
        assert_eq!(quitter.core().number_of_task_managers(), 0);
        assert_eq!(after.updates.load(Ordering::SeqCst), 1);
        assert_eq!(manager.number_of_tasks(false), 1);
    }

    #[test]
    fn remove_by_name_removes_first_match() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let first = Recorder::new("dup", 1, &log);
        let second = Recorder::new("dup", 2, &log);
        manager.add_task(first.clone());
        manager.add_task(second.clone());

        assert!(manager.remove_task_by_name("dup"));
        assert!(!manager.contains(first.as_ref()));
        assert!(manager.contains(second.as_ref()));
        assert!(!manager.remove_task_by_name("missing"));
    }

    #[test]
    fn remove_all_clears_back_references() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let a = Recorder::new("a", 1, &log);
        manager.add_task(a.clone());
        manager.remove_all_tasks();

        assert!(!manager.has_at_least_one_task());
        assert_eq!(a.core().number_of_task_managers(), 0);
        assert_eq!(manager.number_of_active_tasks(false), 0);
    }

    #[test]
    fn dropping_the_manager_clears_back_references() {
        let log = UpdateLog::default();
        let task = Recorder::new("a", 1, &log);
        {
            let manager = TaskManager::new("short-lived");
            manager.add_task(task.clone());
            assert_eq!(task.core().number_of_task_managers(), 1);
        }
        assert_eq!(task.core().number_of_task_managers(), 0);
    }

    #[test]
    fn priority_change_reorders() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let a = Recorder::new("a", 10, &log);
        let b = Recorder::new("b", 20, &log);
        manager.add_task(a.clone());
        manager.add_task(b.clone());

        a.core().set_priority(30);
        manager.update_tasks(Duration::ZERO);
        assert_eq!(*lock(&log), vec!["b", "a"]);
    }

    #[test]
    fn paused_task_added_is_not_active() {
        let log = UpdateLog::default();
        let manager = TaskManager::new("test");
        let task = Recorder::new("sleepy", DEFAULT_PRIORITY, &log);
        task.pause(false, false);
        manager.add_task(task.clone());
        assert_eq!(manager.number_of_tasks(false), 1);
        assert_eq!(manager.number_of_active_tasks(false), 0);
    }
}
