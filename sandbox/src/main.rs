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

mod scene;

use anyhow::{Context as _, Result};
use clap::Parser;
use echo_kernel::{
    EngineConfig, ExecutionResult, Kernel, NetworkExecutionModel, RunForeverModel, Thread,
};
use scene::Scene;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Runs a small task tree through a scripted sequence of contexts.
#[derive(Parser, Debug)]
#[command(name = "sandbox", version, about)]
struct Args {
    /// RON engine configuration.
    #[arg(long, default_value = "sandbox/config.ron")]
    config: PathBuf,

    /// Drive the kernel from simulated network traffic instead of a free-running loop.
    #[arg(long)]
    network: bool,

    /// Time spent in each context of the script, in milliseconds.
    #[arg(long, default_value_t = 750)]
    step_ms: u64,
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        log::warn!(
            "No configuration at '{}', using defaults (no contexts).",
            path.display()
        );
        return Ok(EngineConfig::default());
    }
    EngineConfig::load(path).with_context(|| format!("loading '{}'", path.display()))
}

/// Pokes the network model at a steady pace while the kernel has work.
fn traffic(model: &NetworkExecutionModel, kernel: Weak<Kernel>) -> Thread {
    let signal = model.event_signal();
    Thread::with_function("traffic", move || {
        let mut packets = 0u32;
        while kernel.upgrade().is_some_and(|k| k.has_at_least_one_task()) && signal.notify() {
            packets += 1;
            Thread::sleep(Duration::from_millis(37));
        }
        log::info!("Simulated traffic ended after {packets} packets.");
    })
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let kernel = Arc::new(Kernel::from_config("Main", &config.kernel));
    let scene = Scene::build(&kernel, &config, Duration::from_millis(args.step_ms))?;

    let traffic = if args.network {
        let model = Arc::new(NetworkExecutionModel::from_config(&config.network));
        let traffic = traffic(&model, Arc::downgrade(&kernel));
        kernel.set_execution_model(model);
        if !traffic.execute() {
            anyhow::bail!("could not start the traffic thread");
        }
        Some(traffic)
    } else {
        kernel.set_execution_model(Arc::new(RunForeverModel));
        None
    };

    let result = kernel.execute();
    scene.log_summary();
    log::info!("Main kernel processed {} frames.", kernel.frame_count());

    if let Some(traffic) = traffic {
        traffic.join();
    }

    match result {
        ExecutionResult::Failure => anyhow::bail!("the main kernel failed"),
        result => {
            log::info!("Main kernel finished: {result:?}");
            Ok(())
        }
    }
}
