use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use marketpay_connector::domain::{
    ContactInformation, Gender, Name, ProviderMessage, ShareholderContact, ShopRecord,
};
use marketpay_connector::error::NotificationError;
use marketpay_connector::ports::{MailSender, OutboundEmail};
use marketpay_connector::services::templates::{
    MSG_ACCOUNT_HOLDER_CREATED_TITLE, MSG_SHAREHOLDER_VERIFICATION_TITLE,
    TEMPLATE_ACCOUNT_HOLDER_CREATED, TEMPLATE_SHAREHOLDER_VERIFICATION,
};
use marketpay_connector::services::{
    AskamaRenderer, DispatcherSettings, MailWorker, MessageCatalog, NotificationDispatcher,
};
use tokio::task::JoinHandle;

/// Records delivered mail; fails for addresses listed in `bounce`.
#[derive(Default)]
struct RecordingMailSender {
    bounce: Vec<String>,
    sent: Mutex<Vec<OutboundEmail>>,
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        if self.bounce.contains(&email.to) {
            return Err(NotificationError::Mail("mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

fn start(sender: Arc<RecordingMailSender>) -> (NotificationDispatcher, JoinHandle<()>) {
    MailWorker::new(
        Arc::new(AskamaRenderer),
        Arc::new(MessageCatalog::builtin("en")),
        sender,
    )
    .spawn(DispatcherSettings {
        operator_env_url: "https://example.com".to_string(),
        mail_base_url: "https://connector.example.com".to_string(),
        operator_email: "ops@example.com".to_string(),
        default_locale: "en".to_string(),
    })
}

async fn drain(dispatcher: NotificationDispatcher, worker: JoinHandle<()>) {
    drop(dispatcher);
    worker.await.unwrap();
}

fn shop() -> ShopRecord {
    ShopRecord {
        id: "S123".to_string(),
        shop_name: Some("Green Leaf".to_string()),
        contact_information: Some(ContactInformation {
            civility: Some("Mr".to_string()),
            firstname: Some("Jean".to_string()),
            lastname: Some("Dupont".to_string()),
            email: Some("jean@greenleaf.example.com".to_string()),
        }),
        additional_fields: vec![],
    }
}

fn sent(sender: &RecordingMailSender) -> Vec<OutboundEmail> {
    sender.sent.lock().unwrap().clone()
}

#[tokio::test]
async fn test_callback_url_construction() {
    let (dispatcher, worker) = start(Arc::new(RecordingMailSender::default()));
    assert_eq!(
        dispatcher.callback_url("S123"),
        "https://example.com/mmp/shop/account/shop/S123"
    );
    drain(dispatcher, worker).await;
}

#[tokio::test]
async fn test_shop_email_goes_to_shop_contact() {
    let sender = Arc::new(RecordingMailSender::default());
    let (dispatcher, worker) = start(sender.clone());

    dispatcher.send_shop_email(
        &shop(),
        Some("fr_FR"),
        TEMPLATE_ACCOUNT_HOLDER_CREATED,
        MSG_ACCOUNT_HOLDER_CREATED_TITLE,
    );
    drain(dispatcher, worker).await;

    let sent = sent(&sender);
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to, "jean@greenleaf.example.com");
    assert_eq!(email.subject, "Votre compte de paiement a été créé");
    assert!(email.is_html);
    assert!(!email.is_multipart);
    assert!(email.body.contains("Jean Dupont"));
    assert!(email.body.contains("Green Leaf"));
    assert!(email.body.contains("S123"));
    assert!(email.body.contains("connector.example.com"));
}

#[tokio::test]
async fn test_shareholder_email_goes_to_shareholder() {
    let sender = Arc::new(RecordingMailSender::default());
    let (dispatcher, worker) = start(sender.clone());

    let shareholder = ShareholderContact {
        shareholder_code: Some("SH-1".to_string()),
        name: Some(Name {
            first_name: Some("Marie".to_string()),
            last_name: Some("Curie".to_string()),
            gender: Gender::Female,
        }),
        email: "marie@example.com".to_string(),
    };
    dispatcher.send_shareholder_email(
        &shareholder,
        "S123",
        None,
        TEMPLATE_SHAREHOLDER_VERIFICATION,
        MSG_SHAREHOLDER_VERIFICATION_TITLE,
    );
    drain(dispatcher, worker).await;

    let sent = sent(&sender);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "marie@example.com");
    assert_eq!(sent[0].subject, "Shareholder verification required");
    assert!(sent[0].body.contains("Marie Curie"));
    assert!(sent[0].body.contains("S123"));
}

#[tokio::test]
async fn test_seller_and_operator_error_emails() {
    let sender = Arc::new(RecordingMailSender::default());
    let (dispatcher, worker) = start(sender.clone());

    let errors = vec!["IBAN is invalid".to_string(), "Missing date of birth".to_string()];
    dispatcher.send_seller_email_with_errors(&shop(), errors.clone());
    dispatcher.send_operator_email_with_errors(&shop(), errors);
    drain(dispatcher, worker).await;

    let mut sent = sent(&sender);
    sent.sort_by(|a, b| a.to.cmp(&b.to));
    assert_eq!(sent.len(), 2);

    assert_eq!(sent[0].to, "jean@greenleaf.example.com");
    assert_eq!(sent[1].to, "ops@example.com");
    for email in &sent {
        assert_eq!(email.subject, "Your payment account details need attention");
        assert!(email.body.contains("IBAN is invalid"));
        assert!(email.body.contains("Missing date of birth"));
    }
}

#[tokio::test]
async fn test_payout_failure_email_formats_provider_message() {
    let sender = Arc::new(RecordingMailSender::default());
    let (dispatcher, worker) = start(sender.clone());

    dispatcher.send_operator_email_payout_failure(
        &shop(),
        &ProviderMessage {
            code: "10_069".to_string(),
            text: "Bank account rejected".to_string(),
        },
    );
    drain(dispatcher, worker).await;

    let sent = sent(&sender);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ops@example.com");
    assert_eq!(sent[0].subject, "A payout to a shop has failed");
    assert!(sent[0].body.contains("(10_069) Bank account rejected"));
}

#[tokio::test]
async fn test_failed_sends_do_not_affect_other_notifications() {
    let sender = Arc::new(RecordingMailSender {
        bounce: vec!["jean@greenleaf.example.com".to_string()],
        ..Default::default()
    });
    let (dispatcher, worker) = start(sender.clone());

    let mut no_contact = shop();
    no_contact.contact_information = None;

    // Unknown template, missing recipient and a bounced address are all logged by the worker.
    dispatcher.send_shop_email(&shop(), None, "shopNotifications/missing", MSG_ACCOUNT_HOLDER_CREATED_TITLE);
    dispatcher.send_seller_email_with_errors(&no_contact, vec!["x".to_string()]);
    dispatcher.send_seller_email_with_errors(&shop(), vec!["y".to_string()]);
    dispatcher.send_operator_email_with_errors(&shop(), vec!["z".to_string()]);
    drain(dispatcher, worker).await;

    let sent = sent(&sender);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ops@example.com");
}

#[tokio::test]
async fn test_dispatch_after_worker_stopped_is_dropped_silently() {
    let sender = Arc::new(RecordingMailSender::default());
    let (dispatcher, worker) = start(sender.clone());
    worker.abort();
    let _ = worker.await;

    dispatcher.send_operator_email_with_errors(&shop(), vec!["late".to_string()]);
    assert!(sent(&sender).is_empty());
}

/// Holds each delivery open for a while and records the peak number in flight.
#[derive(Default)]
struct SlowMailSender {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delivered: AtomicUsize,
}

#[async_trait]
impl MailSender for SlowMailSender {
    async fn send_email(&self, _email: &OutboundEmail) -> Result<(), NotificationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_worker_limits_concurrent_deliveries() {
    let sender = Arc::new(SlowMailSender::default());
    let (dispatcher, worker) = MailWorker::new(
        Arc::new(AskamaRenderer),
        Arc::new(MessageCatalog::builtin("en")),
        sender.clone(),
    )
    .with_max_concurrent(2)
    .spawn(DispatcherSettings {
        operator_env_url: "https://example.com".to_string(),
        mail_base_url: "https://connector.example.com".to_string(),
        operator_email: "ops@example.com".to_string(),
        default_locale: "en".to_string(),
    });

    for i in 0..10 {
        dispatcher.send_operator_email_with_errors(&shop(), vec![format!("error {}", i)]);
    }
    drain(dispatcher, worker).await;

    assert_eq!(sender.delivered.load(Ordering::SeqCst), 10);
    assert!(sender.peak.load(Ordering::SeqCst) <= 2);
}
