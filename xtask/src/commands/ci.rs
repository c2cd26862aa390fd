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
use std::time::Instant;

pub fn build() -> Result<()> {
    print_task_start("Building All Crates", HAMMER, BLUE);
    print_info("Compiling all workspace crates in debug mode");
    cargo(&["build", "--workspace", "--exclude", "xtask"], "Build")
}

pub fn test(package: Option<&str>) -> Result<()> {
    print_task_start("Running Tests", TEST_TUBE, GREEN);
    match package {
        Some(package) => {
            print_info(&format!("Running the tests of '{package}'"));
            cargo(&["test", "-p", package], "Tests")
        }
        None => {
            print_info("Running unit tests, integration tests and doc tests");
            cargo(&["test", "--workspace"], "Tests")
        }
    }
}

pub fn check() -> Result<()> {
    print_task_start("Checking All Crates", MAGNIFIER, CYAN);
    print_info("Checking code for errors without building executables");
    cargo(&["check", "--workspace", "--all-targets"], "Check")
}

pub fn format(check_only: bool) -> Result<()> {
    print_task_start("Formatting Code", BRUSH, MAGENTA);
    // `fmt` takes `--all`, not `--workspace`.
    if check_only {
        print_info("Looking for files rustfmt would change");
        cargo(&["fmt", "--all", "--", "--check"], "Format check")
    } else {
        print_info("Formatting code using rustfmt with default settings");
        cargo(&["fmt", "--all"], "Format")
    }
}

pub fn clippy() -> Result<()> {
    print_task_start("Running Clippy", CLIPPY, YELLOW);
    print_info("Running Clippy linter with warnings as errors");
    cargo(
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        "Clippy",
    )
}

pub fn all() -> Result<()> {
    println!("{BANNER}");
    println!("{BOLD}{CYAN}Starting full pipeline: build → test → check → format → clippy{RESET}");

    let start_time = Instant::now();
    let phases: [(&str, fn() -> Result<()>); 5] = [
        ("Build", build),
        ("Test", || test(None)),
        ("Check", check),
        ("Format", || format(true)),
        ("Clippy", clippy),
    ];
    let total = phases.len();

    let failed: Vec<&str> = phases
        .iter()
        .enumerate()
        .filter_map(|(i, (name, phase))| {
            println!("\n{BOLD}{BLUE}[{}/{total}] {name} Phase{RESET}", i + 1);
            phase().is_err().then_some(*name)
        })
        .collect();

    println!("\n{BOLD}{CYAN}╔═══════════════════════════════════════╗{RESET}");
    println!("{BOLD}{CYAN}║            PIPELINE SUMMARY           ║{RESET}");
    println!("{BOLD}{CYAN}╚═══════════════════════════════════════╝{RESET}");
    println!(
        "{BOLD}{BLUE}{STOPWATCH} Total time: {:.2}s{RESET}",
        start_time.elapsed().as_secs_f64()
    );

    if failed.is_empty() {
        println!("{BOLD}{GREEN} {CHECK} All {total} phases passed! {ROCKET}{RESET}");
        Ok(())
    } else {
        println!(
            "{BOLD}{YELLOW} ⚠ {}/{total} phases passed{RESET}",
            total - failed.len()
        );
        anyhow::bail!("pipeline failed in: {}", failed.join(", "))
    }
}
