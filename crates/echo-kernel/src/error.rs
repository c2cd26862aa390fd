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

//! Error types of the kernel crate.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to launch an OS thread.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// The thread is already running its work.
    #[error("thread '{0}' is already executing")]
    AlreadyExecuting(String),

    /// The platform refused to create the thread.
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Name given to the thread.
        name: String,
        /// Platform error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure to read an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid RON for the expected schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
