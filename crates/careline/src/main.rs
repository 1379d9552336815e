// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Careline - a counselling helpdesk with bot-first routing and human
//! escalation.
//!
//! This is the binary entry point for the Careline service.

use clap::{Parser, Subcommand};

mod counsellor;
mod doctor;
mod serve;
mod status;

/// Careline - a counselling helpdesk with bot-first routing and human escalation.
#[derive(Parser, Debug)]
#[command(name = "careline", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Careline routing service.
    Serve,
    /// Run diagnostic checks against the Careline environment.
    Doctor {
        /// Run additional intensive checks.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Show service state, entity counts, and queue depth.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Manage counsellor records and their delivery channels.
    Counsellor {
        #[command(subcommand)]
        command: counsellor::CounsellorCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match careline_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            careline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Doctor { deep, plain }) => doctor::run_doctor(&config, deep, plain).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Counsellor { command }) => {
            counsellor::run_counsellor(&config, command).await
        }
        None => {
            println!("careline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed)
        let config = careline_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.service.name, "careline");
    }
}
