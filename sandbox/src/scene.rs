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

//! The demo task tree: input, a game group, two menus and an audio thread.

use anyhow::{bail, Result};
use echo_core::{
    ContextSwitcher, CountDownTimer, FunctionTask, Task, TaskGroup, DEFAULT_PRIORITY,
};
use echo_kernel::{EngineConfig, Kernel, TaskThread};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Frame counters reported when the sandbox exits.
#[derive(Debug, Default)]
struct SceneStats {
    input: AtomicU64,
    physics: AtomicU64,
    animation: AtomicU64,
    menus: AtomicU64,
    mixer: AtomicU64,
}

/// Owns the tasks the kernel only holds weakly.
pub struct Scene {
    stats: Arc<SceneStats>,
    audio: Arc<TaskThread>,
    director: Arc<CountDownTimer>,
}

impl Scene {
    /// Populates `kernel` and returns the scene keeping its tasks alive.
    pub fn build(kernel: &Arc<Kernel>, config: &EngineConfig, step: Duration) -> Result<Self> {
        let stats = Arc::new(SceneStats::default());

        kernel.add_shared_task(counting("Input", 10, &stats, |s| &s.input));

        let game = Arc::new(TaskGroup::new("Game", 100));
        game.tasks()
            .add_shared_task(counting("Physics", 10, &stats, |s| &s.physics));
        game.tasks()
            .add_shared_task(counting("Animation", 20, &stats, |s| &s.animation));
        kernel.add_shared_task(game);

        kernel.add_shared_task(counting("MainMenu", DEFAULT_PRIORITY, &stats, |s| &s.menus));
        kernel.add_shared_task(counting("PauseMenu", DEFAULT_PRIORITY, &stats, |s| &s.menus));

        // Audio mixes on its own thread so a slow frame never starves it.
        let audio = Arc::new(TaskThread::with_config("Audio", 50, &config.kernel));
        audio
            .kernel()
            .add_shared_task(counting("Mixer", 0, &stats, |s| &s.mixer));
        if !kernel.add_task_thread(audio.clone()) {
            bail!("the audio thread is already registered");
        }

        let mut switcher = ContextSwitcher::new(kernel.task_manager().clone());
        let declared = config.contexts.len();
        let registered = switcher.add_contexts(config.contexts.iter().cloned());
        if registered != declared {
            log::warn!("{} of {declared} contexts were duplicates.", declared - registered);
        }
        if let Err(error) = switcher.switch_context("MainMenu") {
            bail!("cannot enter the main menu: {error}");
        }

        // Held weakly by the kernel: the director owns a handle to the root
        // manager, so a shared entry would keep the whole tree alive.
        let director = Arc::new(director(switcher, Arc::downgrade(kernel), step));
        kernel.add_task(director.clone());

        Ok(Self {
            stats,
            audio,
            director,
        })
    }

    /// Logs what every part of the scene did.
    pub fn log_summary(&self) {
        let stats = &self.stats;
        log::info!(
            "Frames: input={} physics={} animation={} menus={} mixer={}",
            stats.input.load(Ordering::Relaxed),
            stats.physics.load(Ordering::Relaxed),
            stats.animation.load(Ordering::Relaxed),
            stats.menus.load(Ordering::Relaxed),
            stats.mixer.load(Ordering::Relaxed),
        );
        log::info!(
            "Audio thread: {:?}, director left {:?} on its countdown.",
            self.audio.last_result(),
            self.director.remaining()
        );
    }
}

fn counting(
    name: &str,
    priority: u32,
    stats: &Arc<SceneStats>,
    counter: fn(&SceneStats) -> &AtomicU64,
) -> Arc<dyn Task> {
    let stats = Arc::clone(stats);
    let task_name = name.to_owned();
    Arc::new(FunctionTask::new(name, priority, move |dt| {
        counter(&stats).fetch_add(1, Ordering::Relaxed);
        log::trace!("{task_name}: dt={dt:?}");
    }))
}

/// Walks through the contexts a player would, then stops the kernel.
fn director(mut switcher: ContextSwitcher, kernel: Weak<Kernel>, step: Duration) -> CountDownTimer {
    // "Replay" names a task the scene does not have and falls back to "Game".
    const SCRIPT: [&str; 5] = ["Game", "GamePause", "Game", "Replay", "MainMenu"];
    let mut next = 0;

    CountDownTimer::with_priority(
        step,
        move || {
            let Some(name) = SCRIPT.get(next) else {
                log::info!("Director: script finished, stopping the kernel.");
                if let Some(kernel) = kernel.upgrade() {
                    kernel.stop();
                }
                return;
            };
            next += 1;
            match switcher.switch_context(name) {
                Ok(()) => log::info!(
                    "Director: now in '{}'.",
                    switcher.current_context().unwrap_or("?")
                ),
                Err(error) => log::error!("Director: {error}"),
            }
        },
        "Director",
        true,
        1,
    )
}
