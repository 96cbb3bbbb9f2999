//! Fire-and-forget notification emails.
//!
//! `NotificationDispatcher` operations only enqueue a job and return. A
//! background `MailWorker` renders, resolves the subject and delivers each job
//! on its own task, at most `max_concurrent` at a time; failures are logged
//! there and never reach the caller.

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::domain::{ProviderMessage, ShareholderContact, ShopRecord};
use crate::error::NotificationError;
use crate::ports::{MailSender, OutboundEmail};
use crate::services::templates::{
    ContextValue, MessageCatalog, NotificationContext, TemplateRenderer,
    MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE, MSG_ACCOUNT_HOLDER_VALIDATION_TITLE,
    TEMPLATE_OPERATOR_ERRORS, TEMPLATE_OPERATOR_PAYOUT_FAILED, TEMPLATE_SELLER_ERRORS,
    VAR_BASE_URL, VAR_CALLBACK_SHOP_URL, VAR_ERRORS, VAR_PAYOUT_ERROR, VAR_SHAREHOLDER, VAR_SHOP,
};

/// Deep link into the operator back-office page of a shop.
pub fn shop_callback_url(operator_env_url: &str, shop_id: &str) -> String {
    format!(
        "{}/mmp/shop/account/shop/{}",
        operator_env_url.trim_end_matches('/'),
        shop_id
    )
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub operator_env_url: String,
    pub mail_base_url: String,
    pub operator_email: String,
    pub default_locale: String,
}

/// One queued email.
#[derive(Debug, Clone)]
pub struct MailJob {
    pub template: String,
    pub subject_key: String,
    pub locale: String,
    pub context: NotificationContext,
    pub recipient: Option<String>,
    /// Who the mail is about, for logs.
    pub label: String,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    jobs: mpsc::UnboundedSender<MailJob>,
    settings: Arc<DispatcherSettings>,
}

impl NotificationDispatcher {
    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn callback_url(&self, shop_id: &str) -> String {
        shop_callback_url(&self.settings.operator_env_url, shop_id)
    }

    /// Generic shop notification sent to the shop contact.
    pub fn send_shop_email(
        &self,
        shop: &ShopRecord,
        locale: Option<&str>,
        template: &str,
        subject_key: &str,
    ) {
        let context = self.shop_context(shop);
        self.enqueue(MailJob {
            template: template.to_string(),
            subject_key: subject_key.to_string(),
            locale: self.locale_or_default(locale),
            context,
            recipient: shop.contact_email().map(str::to_string),
            label: format!("shop {}", shop.id),
        });
    }

    pub fn send_shareholder_email(
        &self,
        shareholder: &ShareholderContact,
        shop_id: &str,
        locale: Option<&str>,
        template: &str,
        subject_key: &str,
    ) {
        let mut context = NotificationContext::new();
        context.set(
            VAR_SHAREHOLDER,
            ContextValue::Shareholder(Box::new(shareholder.clone())),
        );
        context.set(
            VAR_BASE_URL,
            ContextValue::Text(self.settings.mail_base_url.clone()),
        );
        context.set(
            VAR_CALLBACK_SHOP_URL,
            ContextValue::Text(self.callback_url(shop_id)),
        );

        let label = match &shareholder.shareholder_code {
            Some(code) => format!("shareholder {} of shop {}", code, shop_id),
            None => format!("shareholder of shop {}", shop_id),
        };

        self.enqueue(MailJob {
            template: template.to_string(),
            subject_key: subject_key.to_string(),
            locale: self.locale_or_default(locale),
            context,
            recipient: Some(shareholder.email.clone()).filter(|email| !email.is_empty()),
            label,
        });
    }

    pub fn send_seller_email_with_errors(&self, shop: &ShopRecord, errors: Vec<String>) {
        let mut context = self.shop_context(shop);
        context.set(VAR_ERRORS, ContextValue::List(errors));
        self.enqueue(MailJob {
            template: TEMPLATE_SELLER_ERRORS.to_string(),
            subject_key: MSG_ACCOUNT_HOLDER_VALIDATION_TITLE.to_string(),
            locale: self.settings.default_locale.clone(),
            context,
            recipient: shop.contact_email().map(str::to_string),
            label: format!("shop {}", shop.id),
        });
    }

    pub fn send_operator_email_with_errors(&self, shop: &ShopRecord, errors: Vec<String>) {
        let mut context = self.shop_context(shop);
        context.set(VAR_ERRORS, ContextValue::List(errors));
        self.enqueue(MailJob {
            template: TEMPLATE_OPERATOR_ERRORS.to_string(),
            subject_key: MSG_ACCOUNT_HOLDER_VALIDATION_TITLE.to_string(),
            locale: self.settings.default_locale.clone(),
            context,
            recipient: Some(self.settings.operator_email.clone()),
            label: format!("operator about shop {}", shop.id),
        });
    }

    pub fn send_operator_email_payout_failure(&self, shop: &ShopRecord, message: &ProviderMessage) {
        let mut context = self.shop_context(shop);
        context.set(VAR_PAYOUT_ERROR, ContextValue::Text(message.to_string()));
        self.enqueue(MailJob {
            template: TEMPLATE_OPERATOR_PAYOUT_FAILED.to_string(),
            subject_key: MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE.to_string(),
            locale: self.settings.default_locale.clone(),
            context,
            recipient: Some(self.settings.operator_email.clone()),
            label: format!("operator about payout of shop {}", shop.id),
        });
    }

    fn shop_context(&self, shop: &ShopRecord) -> NotificationContext {
        let mut context = NotificationContext::new();
        context.set(VAR_SHOP, ContextValue::Shop(Box::new(shop.clone())));
        context.set(
            VAR_CALLBACK_SHOP_URL,
            ContextValue::Text(self.callback_url(&shop.id)),
        );
        context.set(
            VAR_BASE_URL,
            ContextValue::Text(self.settings.mail_base_url.clone()),
        );
        context
    }

    fn locale_or_default(&self, locale: Option<&str>) -> String {
        locale
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(self.settings.default_locale.as_str())
            .to_string()
    }

    fn enqueue(&self, job: MailJob) {
        tracing::debug!(template = %job.template, about = %job.label, "Queueing notification");
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            tracing::warn!(
                template = %job.template,
                about = %job.label,
                "Mail worker stopped, notification dropped"
            );
        }
    }
}

/// Deliveries in flight at once, and so concurrent SMTP sessions.
pub const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 4;

/// Background consumer of the dispatcher queue.
pub struct MailWorker {
    renderer: Arc<dyn TemplateRenderer>,
    catalog: Arc<MessageCatalog>,
    sender: Arc<dyn MailSender>,
    max_concurrent: usize,
}

impl MailWorker {
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        catalog: Arc<MessageCatalog>,
        sender: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            renderer,
            catalog,
            sender,
            max_concurrent: DEFAULT_MAX_CONCURRENT_DELIVERIES,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Starts the worker. It exits once every dispatcher clone has been
    /// dropped and all queued jobs have been delivered or logged.
    pub fn spawn(self, settings: DispatcherSettings) -> (NotificationDispatcher, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        let dispatcher = NotificationDispatcher {
            jobs: tx,
            settings: Arc::new(settings),
        };
        (dispatcher, handle)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<MailJob>) {
        tracing::info!(max_concurrent = self.max_concurrent, "Mail worker started");
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => {
                        // Waits for a free delivery slot.
                        let Ok(permit) = permits.clone().acquire_owned().await else {
                            break;
                        };
                        let renderer = self.renderer.clone();
                        let catalog = self.catalog.clone();
                        let sender = self.sender.clone();
                        in_flight.spawn(async move {
                            let _permit = permit;
                            let template = job.template.clone();
                            let label = job.label.clone();
                            if let Err(e) = deliver(job, renderer.as_ref(), &catalog, sender.as_ref()).await {
                                tracing::error!(%template, about = %label, error = %e, "Failed to send notification");
                            }
                        });
                    }
                    None => break,
                },
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => log_join(result),
            }
        }

        while let Some(result) = in_flight.join_next().await {
            log_join(result);
        }
        tracing::info!("Mail worker stopped");
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Notification task panicked");
    }
}

async fn deliver(
    job: MailJob,
    renderer: &dyn TemplateRenderer,
    catalog: &MessageCatalog,
    sender: &dyn MailSender,
) -> Result<(), NotificationError> {
    let to = job
        .recipient
        .ok_or_else(|| NotificationError::MissingRecipient(job.label.clone()))?;
    let body = renderer.render(&job.template, &job.context, &job.locale)?;
    let subject = catalog.resolve(&job.subject_key, &job.locale)?;

    sender
        .send_email(&OutboundEmail {
            to,
            subject,
            body,
            is_multipart: false,
            is_html: true,
        })
        .await
}
