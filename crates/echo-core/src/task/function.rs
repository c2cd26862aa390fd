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

use super::{lock, Task, TaskCore, TaskPriority};
use std::sync::Mutex;
use std::time::Duration;

type UpdateFn = Box<dyn FnMut(Duration) + Send>;

/// A task whose update is a closure.
pub struct FunctionTask {
    core: TaskCore,
    function: Mutex<UpdateFn>,
}

impl FunctionTask {
    /// Creates a task calling `function` with the frame time on every update.
    pub fn new<F>(name: impl Into<String>, priority: TaskPriority, function: F) -> Self
    where
        F: FnMut(Duration) + Send + 'static,
    {
        Self {
            core: TaskCore::new(name, priority),
            function: Mutex::new(Box::new(function)),
        }
    }
}

impl Task for FunctionTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn update(&self, dt: Duration) {
        let mut function = lock(&self.function);
        (*function)(dt);
    }
}
