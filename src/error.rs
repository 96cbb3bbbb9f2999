use thiserror::Error;

use crate::domain::{LegalEntity, ProviderError};

/// Per-shop mapping failure. Aborts that shop only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Legal entity not found")]
    LegalEntityNotFound,

    #[error("Legal entity is ambiguous: {0} matching fields")]
    AmbiguousLegalEntity(usize),

    #[error("Invalid legal entity: {0}")]
    InvalidLegalEntity(String),

    #[error("{0} not supported")]
    UnsupportedLegalEntity(LegalEntity),

    #[error("Contact information not found")]
    ContactInformationMissing,
}

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from operator API: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response from operator API: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Error, Debug)]
pub enum PaymentsError {
    #[error("Payments API error (status {status}): {error}")]
    Api { status: u16, error: ProviderError },

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid response from payments API: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Watermark I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watermark file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Run-level failures. Never escape the scheduled entry point.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to retrieve shops: {0}")]
    Retrieval(#[from] OperatorError),

    #[error("Empty page at offset {offset} while total count is {total_count}")]
    EmptyPage { offset: u64, total_count: u64 },

    #[error("Watermark error: {0}")]
    Watermark(#[from] WatermarkError),
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template variable missing: {0}")]
    MissingVariable(&'static str),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Message not found: {key} (locale {locale})")]
    MessageNotFound { key: String, locale: String },

    #[error("No recipient address for {0}")]
    MissingRecipient(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),
}
