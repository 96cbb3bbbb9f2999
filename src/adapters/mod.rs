pub mod operator_client;
pub mod payments_client;
pub mod smtp_mail_sender;
pub mod watermark_store;

pub use operator_client::OperatorClient;
pub use payments_client::PaymentsClient;
pub use smtp_mail_sender::SmtpMailSender;
pub use watermark_store::{FileWatermarkStore, InMemoryWatermarkStore};
