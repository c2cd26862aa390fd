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

// Build automation for the Echo workspace.
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", version, about = helpers::BANNER)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every crate of the workspace.
    Build,
    /// Run unit, integration and doc tests.
    Test {
        /// Only test this crate.
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Run `cargo check` on every crate.
    Check,
    /// Format the whole workspace.
    Format {
        /// Report unformatted files instead of rewriting them.
        #[arg(long)]
        check: bool,
    },
    /// Run clippy with warnings as errors.
    Clippy,
    /// Run the task update benchmarks.
    Bench,
    /// Run the sandbox demo.
    Sandbox {
        /// Drive the sandbox from simulated network traffic.
        #[arg(long)]
        network: bool,
    },
    /// Run the whole pipeline: build, test, check, format check, clippy.
    Ci,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Build => commands::ci::build(),
        Command::Test { package } => commands::ci::test(package.as_deref()),
        Command::Check => commands::ci::check(),
        Command::Format { check } => commands::ci::format(check),
        Command::Clippy => commands::ci::clippy(),
        Command::Bench => commands::run::bench(),
        Command::Sandbox { network } => commands::run::sandbox(network),
        Command::Ci => commands::ci::all(),
    }
}
