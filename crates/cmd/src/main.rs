// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jobhost_app::AppConfig;
use jobhost_common_telemetry::{logging::init_global_logging, panic_hook::set_panic_hook};
use snafu::{ResultExt, Whatever};
use tracing::info;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "jobhost",
about = "Runs configured jobs on cron triggers",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts the job host and keeps it running until Ctrl+C or SIGTERM.
Examples:

jobhost run --config jobhost.toml

")]
struct RunArgs {
    /// Configuration file, TOML or JSON.
    #[arg(short, long)]
    config: PathBuf,
}

impl RunArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = AppConfig::load(&self.config)
            .whatever_context(format!("Failed to load {}", self.config.display()))?;
        let _guards = init_global_logging("jobhost", &config.logging)
            .whatever_context("Failed to initialize logging")?;
        set_panic_hook();
        info!(version = build_info::FULL_VERSION, config = %self.config.display(), "jobhost starting");

        config
            .open()
            .run()
            .await
            .whatever_context("jobhost stopped with an error")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Loads the configuration, resolves every job and prints what would be
scheduled. Nothing is run.
Examples:

jobhost check --config jobhost.toml

")]
struct CheckArgs {
    /// Configuration file, TOML or JSON.
    #[arg(short, long)]
    config: PathBuf,
}

impl CheckArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = AppConfig::load(&self.config)
            .whatever_context(format!("Failed to load {}", self.config.display()))?;
        let _guards = init_global_logging("jobhost", &config.logging)
            .whatever_context("Failed to initialize logging")?;

        let registrations = config
            .open()
            .check()
            .await
            .whatever_context("Configuration check failed")?;
        for registration in &registrations {
            println!("{registration}");
        }
        println!("{} registration(s)", registrations.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Run(args) => args.run().await,
        Commands::Check(args) => args.run().await,
    }
}
