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

use crate::helpers::*;
use anyhow::Result;

pub fn bench() -> Result<()> {
    print_task_start("Running Benchmarks", STOPWATCH, MAGENTA);
    print_info("Measuring task manager update throughput with criterion");
    cargo(&["bench", "-p", "echo-core"], "Benchmarks")
}

pub fn sandbox(network: bool) -> Result<()> {
    print_task_start("Running the Sandbox", ROCKET, CYAN);
    let mut args = vec!["run", "-p", "sandbox", "--"];
    if network {
        print_info("Kernel driven by simulated network traffic");
        args.push("--network");
    } else {
        print_info("Kernel running freely at the configured frame rate");
    }
    cargo(&args, "Sandbox")
}
