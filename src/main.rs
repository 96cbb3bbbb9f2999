use clap::Parser;
use marketpay_connector::cli::{self, Cli, Commands};
use marketpay_connector::config::Config;
use marketpay_connector::services::ShopSyncScheduler;
use marketpay_connector::{build_app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Sync => {
            let AppState {
                synchronizer,
                dispatcher,
                mail_worker,
            } = build_app(&config)?;

            let report = synchronizer.run_once().await;

            // Let queued notifications drain before exiting.
            drop(synchronizer);
            drop(dispatcher);
            mail_worker.await?;

            cli::print_sync_report(&report?);
            Ok(())
        }
        Commands::Serve => {
            let AppState {
                synchronizer,
                dispatcher,
                mail_worker,
            } = build_app(&config)?;

            let scheduler = ShopSyncScheduler::new(config.schedule()?, synchronizer);
            tracing::info!(cron = %config.shop_updater_cron, "Starting shop synchronization");

            scheduler
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                    tracing::info!("Shutdown signal received");
                })
                .await;

            drop(dispatcher);
            mail_worker.await?;
            Ok(())
        }
    }
}
