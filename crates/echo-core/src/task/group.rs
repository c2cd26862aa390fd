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

//! A task that is also a task manager.

use super::{lock, Task, TaskCore, TaskExt, TaskManager, TaskPriority};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// A composite task: updating the group updates its children.
///
/// Pausing the group cascades to its children. The group pauses every child
/// that is still active and remembers which ones it paused; resuming the
/// group resumes exactly those, so a child paused on its own before the group
/// was paused stays paused. A child that is not pausable keeps its flag
/// cleared but is not updated either, since its paused parent no longer is.
///
/// Starting the group starts its children; the group only counts as started
/// when all of them did.
pub struct TaskGroup {
    core: TaskCore,
    tasks: TaskManager,
    paused_by_group: Mutex<Vec<Weak<dyn Task>>>,
}

impl TaskGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>, priority: TaskPriority) -> Self {
        let name = name.into();
        Self {
            tasks: TaskManager::new(name.clone()),
            core: TaskCore::new(name, priority),
            paused_by_group: Mutex::new(Vec::new()),
        }
    }

    /// Returns the children of the group.
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }
}

impl Task for TaskGroup {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn update(&self, dt: Duration) {
        self.tasks.update_tasks(dt);
    }

    fn on_start(&self) -> bool {
        self.tasks.start_tasks()
    }

    fn on_stop(&self) {
        self.tasks.stop_tasks();
    }

    fn on_pause(&self, application_pause: bool) {
        let mut paused_now = Vec::new();
        for child in self.tasks.tasks() {
            if child.is_paused() {
                continue;
            }
            child.pause(application_pause, false);
            if child.is_paused() {
                paused_now.push(Arc::downgrade(&child));
            }
        }
        log::debug!(
            "TaskGroup '{}': paused {} children",
            self.core.name(),
            paused_now.len()
        );
        lock(&self.paused_by_group).extend(paused_now);
    }

    fn on_resume(&self, application_resume: bool) {
        let paused = std::mem::take(&mut *lock(&self.paused_by_group));
        for child in paused.iter().filter_map(Weak::upgrade) {
            if self.tasks.contains(child.as_ref()) {
                child.resume(application_resume);
            }
        }
    }

    fn as_task_manager(&self) -> Option<&TaskManager> {
        Some(&self.tasks)
    }
}
