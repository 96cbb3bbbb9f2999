//! Seams between the services and the external platforms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CreateAccountHolderRequest, CreateAccountHolderResponse, ShopPage, SyncState};
use crate::error::{NotificationError, OperatorError, PaymentsError, WatermarkError};

/// Parameters of one shop-listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopQuery {
    pub paginate: bool,
    pub offset: u64,
    pub updated_since: Option<DateTime<Utc>>,
    /// Restricts the listing to these shops when not empty.
    pub shop_ids: Vec<String>,
}

/// Marketplace-operator shop listing.
#[async_trait]
pub trait ShopSource: Send + Sync {
    async fn get_shops(&self, query: &ShopQuery) -> Result<ShopPage, OperatorError>;
}

/// Payments-platform account-holder creation.
#[async_trait]
pub trait AccountHolderApi: Send + Sync {
    async fn create_account_holder(
        &self,
        request: &CreateAccountHolderRequest,
    ) -> Result<CreateAccountHolderResponse, PaymentsError>;
}

/// Externally owned "updated since" cursor and retry set of the shop synchronizer.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn load(&self) -> Result<SyncState, WatermarkError>;
    async fn store(&self, state: &SyncState) -> Result<(), WatermarkError>;
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub is_multipart: bool,
    pub is_html: bool,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), NotificationError>;
}
