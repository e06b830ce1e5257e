//! CLI commands

pub mod failover;
pub mod interface;
pub mod load_balancer;
pub mod show_config;

pub use failover::FailoverCommand;
pub use interface::InterfaceCommand;
pub use load_balancer::LoadBalancerCommand;
pub use show_config::ShowConfigCommand;

use anyhow::{Context, Result};
use hapair_core::CommandResult;
use serde::Serialize;

/// Print `value` as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Print one line per command result
pub(crate) fn print_results(title: &str, results: &[CommandResult]) {
    if results.is_empty() {
        return;
    }

    println!("{}:", title);
    for result in results {
        let mark = if result.succeeded { "✓" } else { "✗" };
        match &result.error {
            Some(error) => println!("  {} {} ({})", mark, result.command_line(), error),
            None => println!("  {} {}", mark, result.command_line()),
        }
    }
}
