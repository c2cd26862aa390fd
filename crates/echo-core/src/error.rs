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

//! Error types of the task model.

use thiserror::Error;

/// Why a [`ContextSwitcher`](crate::ContextSwitcher) could not switch.
///
/// A failed switch never changes the pause state of any task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextSwitchError {
    /// No context with this name was registered.
    #[error("unknown context '{0}'")]
    UnknownContext(String),

    /// The context names tasks the bound manager does not contain.
    #[error("context '{context}' references tasks that could not be found: {missing:?}")]
    UnresolvedTasks {
        /// The context that was being activated.
        context: String,
        /// Every task name that failed to resolve.
        missing: Vec<String>,
    },

    /// The context failed and so did its fallback.
    #[error("context '{context}' failed and its fallback '{fallback}' failed as well: {source}")]
    FallbackFailed {
        /// The context that was requested.
        context: String,
        /// The fallback context that was tried next.
        fallback: String,
        /// Why the fallback failed.
        source: Box<ContextSwitchError>,
    },
}
