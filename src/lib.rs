pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::adapters::{FileWatermarkStore, OperatorClient, PaymentsClient, SmtpMailSender};
use crate::config::Config;
use crate::services::{
    AskamaRenderer, DispatcherSettings, MailWorker, MessageCatalog, NotificationDispatcher,
    ShopSynchronizer,
};

/// Long-lived services wired from configuration.
pub struct AppState {
    pub synchronizer: Arc<ShopSynchronizer>,
    pub dispatcher: NotificationDispatcher,
    pub mail_worker: JoinHandle<()>,
}

/// Must be called inside a Tokio runtime; the mail worker is spawned here.
pub fn build_app(config: &Config) -> anyhow::Result<AppState> {
    let operator = OperatorClient::new(
        config.operator_api_url.clone(),
        config.operator_api_key.clone(),
        config.http_timeout,
    );
    tracing::info!("Operator API client initialized with URL: {}", config.operator_api_url);

    let payments = PaymentsClient::new(
        config.payments_api_url.clone(),
        config.payments_api_key.clone(),
        config.http_timeout,
    );
    tracing::info!("Payments API client initialized with URL: {}", config.payments_api_url);

    let mail_sender = SmtpMailSender::new(&config.smtp)?;
    let (dispatcher, mail_worker) = MailWorker::new(
        Arc::new(AskamaRenderer),
        Arc::new(MessageCatalog::builtin(&config.default_locale)),
        Arc::new(mail_sender),
    )
    .spawn(DispatcherSettings {
        operator_env_url: config.operator_env_url.clone(),
        mail_base_url: config.mail_base_url.clone(),
        operator_email: config.operator_email.clone(),
        default_locale: config.default_locale.clone(),
    });

    let mut synchronizer = ShopSynchronizer::new(
        Arc::new(operator),
        Arc::new(payments),
        Arc::new(FileWatermarkStore::new(config.watermark_path.clone())),
    );
    if config.notify_on_sync {
        synchronizer = synchronizer.with_notifications(dispatcher.clone());
    }

    Ok(AppState {
        synchronizer: Arc::new(synchronizer),
        dispatcher,
        mail_worker,
    })
}
