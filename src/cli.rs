use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::services::SyncReport;

#[derive(Parser)]
#[command(name = "marketpay-connector")]
#[command(about = "Marketplace shop to payments account-holder connector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the scheduled shop synchronization until interrupted (default)
    Serve,

    /// Run a single shop synchronization pass and print the report
    Sync,

    /// Configuration validation
    Config,
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    config.schedule()?;

    println!("Configuration:");
    for (label, value) in config.summary() {
        println!("  {}: {}", label, value);
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub fn print_sync_report(report: &SyncReport) {
    println!("Run {}", report.run_id);
    match report.updated_since {
        Some(since) => println!("  Updated since: {}", since.to_rfc3339()),
        None => println!("  Updated since: (full listing)"),
    }
    println!("  Retrieved: {} ({} retried)", report.retrieved, report.retried);
    println!("  Submitted: {}", report.submitted);
    println!("  Failed:    {}", report.failures.len());
    for failure in &report.failures {
        println!("    ✗ shop {} [{:?}] {}", failure.shop_id, failure.kind, failure.message);
    }
    println!(
        "  Watermark: {}",
        if report.watermark_advanced { "advanced" } else { "unchanged" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["marketpay-connector"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_sync_subcommand() {
        let cli = Cli::parse_from(["marketpay-connector", "sync"]);
        assert_eq!(cli.command, Some(Commands::Sync));
    }
}
