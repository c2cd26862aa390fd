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

//! RON-backed engine configuration.
//!
//! ```ron
//! EngineConfig(
//!     kernel: (target_frame_rate: Some(60.0), max_frame_time_ms: 250),
//!     network: (frame_interval_ms: 50),
//!     contexts: [
//!         Context(name: "Game", instructions: [(task: "Menu", action: Pause)]),
//!     ],
//! )
//! ```
//!
//! Every field is optional; missing ones take their default value.

use crate::error::ConfigError;
use echo_core::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Frame pacing settings of a [`Kernel`](crate::Kernel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum number of frames per second, `None` for uncapped.
    pub target_frame_rate: Option<f32>,
    /// Largest frame time handed to the tasks, in milliseconds.
    pub max_frame_time_ms: u64,
    /// How early the limiter wakes up before its deadline, in microseconds.
    pub sleep_epsilon_us: u64,
}

impl KernelConfig {
    /// Returns the maximum frame time.
    pub fn max_frame_time(&self) -> Duration {
        Duration::from_millis(self.max_frame_time_ms)
    }

    /// Returns the sleep epsilon.
    pub fn sleep_epsilon(&self) -> Duration {
        Duration::from_micros(self.sleep_epsilon_us)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            target_frame_rate: Some(60.0),
            max_frame_time_ms: 250,
            sleep_epsilon_us: 1000,
        }
    }
}

/// Settings of the [`NetworkExecutionModel`](crate::NetworkExecutionModel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Delay before the timer wakes the kernel when no network event
    /// arrives, in milliseconds.
    pub frame_interval_ms: u64,
}

impl NetworkConfig {
    /// Returns the timer period.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
        }
    }
}

/// Everything an application reads at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Settings of the main kernel.
    pub kernel: KernelConfig,
    /// Settings of the network-driven execution model.
    pub network: NetworkConfig,
    /// Contexts to register in the application's context switcher.
    pub contexts: Vec<Context>,
}

impl EngineConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Reads and parses a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&source)?;
        log::info!(
            "Loaded engine configuration from '{}' ({} contexts).",
            path.display(),
            config.contexts.len()
        );
        Ok(config)
    }
}
