//! Fused loop runner.
//!
//! Runs built-in loop kernels on the reference lazy engine and prints the
//! result as JSON. Engine limits come from `loopfuse.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use loopfuse::engine::lazy::LazyEngine;
use loopfuse::error::LoopError;
use loopfuse::io::config::{DEFAULT_CONFIG_FILE, LoopfuseConfig, load_config, write_config};
use loopfuse::{exit_codes, kernels, logging};

#[derive(Parser)]
#[command(
    name = "loopfuse",
    version,
    about = "Trace loop bodies once and replay them on a lazy array engine"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run a built-in kernel and print its result as JSON.
    Run {
        #[command(subcommand)]
        kernel: Kernel,
    },
}

#[derive(Subcommand)]
enum Kernel {
    /// Add one to every element, a fixed number of times.
    Increment {
        #[arg(long, default_value_t = 4)]
        len: usize,
        #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
        niters: i64,
        /// Read the array inside the loop body (rejected by the loop driver).
        #[arg(long)]
        force_read: bool,
    },
    /// Add one to every element while the sum stays below `limit`.
    Converge {
        #[arg(long, default_value_t = 4)]
        len: usize,
        #[arg(long)]
        limit: f64,
        /// Maximum iterations (unbounded when omitted).
        #[arg(long)]
        niters: Option<u64>,
    },
    /// Sliding-window sums over `[0, len)`.
    Stencil {
        #[arg(long, default_value_t = 8)]
        len: usize,
        #[arg(long, default_value_t = 3)]
        window: usize,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run { kernel } => cmd_run(&cli.config, kernel),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Ok(());
    }
    write_config(path, &LoopfuseConfig::default())
}

fn cmd_run(config_path: &Path, kernel: Kernel) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut engine = LazyEngine::new(&cfg.engine);
    let output = match kernel {
        Kernel::Increment {
            len,
            niters,
            force_read,
        } => kernels::increment(&mut engine, len, niters, force_read),
        Kernel::Converge { len, limit, niters } => {
            kernels::converge(&mut engine, len, limit, niters)
        }
        Kernel::Stencil { len, window } => kernels::stencil(&mut engine, len, window),
    }
    .context("run kernel")?;
    print_json(&output)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

/// Map loop-fusion failures to their dedicated exit codes.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LoopError>() {
        Some(LoopError::UnsupportedLoopBody { .. }) => exit_codes::UNSUPPORTED,
        Some(LoopError::Engine(_)) | None => exit_codes::INVALID,
        Some(_) => exit_codes::BAD_CONDITION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["loopfuse", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_run_increment_with_negative_count() {
        let cli = Cli::parse_from(["loopfuse", "run", "increment", "--niters", "-2"]);
        assert!(matches!(
            cli.command,
            Command::Run {
                kernel: Kernel::Increment {
                    len: 4,
                    niters: -2,
                    force_read: false
                }
            }
        ));
    }

    #[test]
    fn parse_converge_without_bound() {
        let cli = Cli::parse_from([
            "loopfuse",
            "--config",
            "custom.toml",
            "run",
            "converge",
            "--limit",
            "10",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert!(matches!(
            cli.command,
            Command::Run {
                kernel: Kernel::Converge { niters: None, .. }
            }
        ));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let unsupported = anyhow::Error::from(LoopError::UnsupportedLoopBody {
            before: 1,
            after: 2,
        })
        .context("run kernel");
        assert_eq!(exit_code_for(&unsupported), exit_codes::UNSUPPORTED);

        let view = anyhow::Error::from(LoopError::ConditionIsView);
        assert_eq!(exit_code_for(&view), exit_codes::BAD_CONDITION);

        assert_eq!(
            exit_code_for(&anyhow::anyhow!("boom")),
            exit_codes::INVALID
        );
    }
}
