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

//! Named pause/resume profiles applied over a task manager.
//!
//! High-level modes such as "MainMenu", "Game" or "GamePause" are declared
//! once as a diff against the shared task tree, instead of every call site
//! knowing which tasks must run in which mode.

use crate::error::ContextSwitchError;
use crate::task::{Task, TaskExt, TaskManager};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What a context does to one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextAction {
    /// Resume the task.
    Resume,
    /// Pause the task.
    Pause,
}

/// What happens when a context cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Report the failure and leave every task untouched.
    #[default]
    Stop,
    /// Try the named context once instead.
    FallBackContext(String),
}

/// One `(task, action)` pair of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInstruction {
    /// Name of the task, searched recursively through groups.
    pub task: String,
    /// What to do with it.
    pub action: ContextAction,
}

/// A named list of pause/resume instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Name the context is switched to by.
    pub name: String,
    /// Behaviour when a referenced task cannot be found.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Instructions, applied in order.
    #[serde(default)]
    pub instructions: Vec<ContextInstruction>,
}

impl Context {
    /// Creates an empty context with the [`FailurePolicy::Stop`] policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_policy: FailurePolicy::Stop,
            instructions: Vec::new(),
        }
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Adds a resume instruction.
    pub fn resume(mut self, task: impl Into<String>) -> Self {
        self.add_instruction(task, ContextAction::Resume);
        self
    }

    /// Adds a pause instruction.
    pub fn pause(mut self, task: impl Into<String>) -> Self {
        self.add_instruction(task, ContextAction::Pause);
        self
    }

    /// Appends an instruction.
    pub fn add_instruction(&mut self, task: impl Into<String>, action: ContextAction) {
        self.instructions.push(ContextInstruction {
            task: task.into(),
            action,
        });
    }
}

/// Switches a [`TaskManager`] between declared [`Context`]s.
///
/// A switch is atomic: every task a context names is resolved before any
/// instruction runs, and a single unresolved name aborts the switch with all
/// pause states left as they were.
#[derive(Debug)]
pub struct ContextSwitcher {
    tasks: TaskManager,
    contexts: HashMap<String, Context>,
    current: Option<String>,
}

impl ContextSwitcher {
    /// Creates a switcher over `tasks`.
    pub fn new(tasks: TaskManager) -> Self {
        Self {
            tasks,
            contexts: HashMap::new(),
            current: None,
        }
    }

    /// Registers a context. Returns false if one with the same name exists.
    pub fn add_context(&mut self, context: Context) -> bool {
        if self.contexts.contains_key(&context.name) {
            log::warn!(
                "ContextSwitcher: context '{}' is already registered.",
                context.name
            );
            return false;
        }
        self.contexts.insert(context.name.clone(), context);
        true
    }

    /// Registers several contexts; returns how many were accepted.
    pub fn add_contexts(&mut self, contexts: impl IntoIterator<Item = Context>) -> usize {
        contexts
            .into_iter()
            .map(|context| self.add_context(context))
            .filter(|added| *added)
            .count()
    }

    /// Unregisters a context, returning it.
    pub fn remove_context(&mut self, name: &str) -> Option<Context> {
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        self.contexts.remove(name)
    }

    /// Returns a registered context.
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    /// Returns the name of the last context applied successfully.
    pub fn current_context(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the manager the switcher operates on.
    pub fn task_manager(&self) -> &TaskManager {
        &self.tasks
    }

    /// Applies the context called `name`.
    ///
    /// If it cannot be applied and its policy is
    /// [`FailurePolicy::FallBackContext`], the fallback is tried exactly once;
    /// the fallback's own policy is not followed.
    pub fn switch_context(&mut self, name: &str) -> Result<(), ContextSwitchError> {
        let error = match self.apply(name) {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        let fallback = match self.contexts.get(name).map(|c| &c.failure_policy) {
            Some(FailurePolicy::FallBackContext(fallback)) => fallback.clone(),
            _ => {
                log::warn!("ContextSwitcher: {error}");
                return Err(error);
            }
        };

        log::warn!("ContextSwitcher: {error}; falling back to '{fallback}'.");
        self.apply(&fallback)
            .map_err(|source| ContextSwitchError::FallbackFailed {
                context: name.to_owned(),
                fallback,
                source: Box::new(source),
            })
    }

    fn apply(&mut self, name: &str) -> Result<(), ContextSwitchError> {
        let context = self
            .contexts
            .get(name)
            .ok_or_else(|| ContextSwitchError::UnknownContext(name.to_owned()))?;

        let mut resolved: Vec<(Arc<dyn Task>, ContextAction)> =
            Vec::with_capacity(context.instructions.len());
        let mut missing = Vec::new();
        for instruction in &context.instructions {
            match self.tasks.find_task(&instruction.task, true) {
                Some(task) => resolved.push((task, instruction.action)),
                None => missing.push(instruction.task.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ContextSwitchError::UnresolvedTasks {
                context: name.to_owned(),
                missing,
            });
        }

        for (task, action) in resolved {
            match action {
                ContextAction::Resume => task.resume(false),
                ContextAction::Pause => task.pause(false, false),
            }
        }
        log::info!("ContextSwitcher: switched to context '{name}'.");
        self.current = Some(name.to_owned());
        Ok(())
    }
}
