use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{
    gender_from_civility, AccountHolderDetails, AdditionalFieldType, ContactInformation,
    CreateAccountHolderRequest, IndividualDetails, LegalEntity, Name, ShopRecord, SyncState,
};
use crate::error::{MappingError, PaymentsError, SyncError};
use crate::ports::{AccountHolderApi, ShopQuery, ShopSource, WatermarkStore};
use crate::services::notifications::NotificationDispatcher;
use crate::services::templates::{MSG_ACCOUNT_HOLDER_CREATED_TITLE, TEMPLATE_ACCOUNT_HOLDER_CREATED};

/// Code of the LIST additional field holding the legal-entity classification.
pub const LEGAL_ENTITY_FIELD_CODE: &str = "adyen-legal-entity-type";

/// Shop ids sent per listing request when re-fetching failed shops.
pub const RETRY_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Mapping,
    Submission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopFailure {
    pub shop_id: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub updated_since: Option<DateTime<Utc>>,
    pub retrieved: usize,
    /// Shops re-fetched by id because they failed in the previous run.
    pub retried: usize,
    pub submitted: usize,
    pub failures: Vec<ShopFailure>,
    pub watermark_advanced: bool,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Polls updated shops and provisions one account holder per shop.
pub struct ShopSynchronizer {
    shops: Arc<dyn ShopSource>,
    account_holders: Arc<dyn AccountHolderApi>,
    watermark: Arc<dyn WatermarkStore>,
    notifications: Option<NotificationDispatcher>,
}

impl ShopSynchronizer {
    pub fn new(
        shops: Arc<dyn ShopSource>,
        account_holders: Arc<dyn AccountHolderApi>,
        watermark: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            shops,
            account_holders,
            watermark,
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.notifications = Some(dispatcher);
        self
    }

    /// Scheduled entry point. Never fails; every problem ends up in the log.
    pub async fn retrieve_updated_shops(&self) {
        match self.run_once().await {
            Ok(report) if report.is_complete() => tracing::info!(
                run_id = %report.run_id,
                retrieved = report.retrieved,
                submitted = report.submitted,
                "Shop synchronization completed"
            ),
            Ok(report) => tracing::warn!(
                run_id = %report.run_id,
                retrieved = report.retrieved,
                retried = report.retried,
                submitted = report.submitted,
                failed = report.failures.len(),
                "Shop synchronization completed with failures"
            ),
            Err(e) => tracing::error!(error = %e, "Shop synchronization aborted"),
        }
    }

    /// One full pass. Per-shop failures are collected into the report; only
    /// retrieval and sync-state loading abort the run.
    ///
    /// A completed run always moves the watermark to its start instant and
    /// replaces the retry set with the shops that failed in this run.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("shop_sync", %run_id);

        async move {
            let started_at = Utc::now();
            let state = self.watermark.load().await?;
            let updated_since = state.watermark;

            let mut shops = self.get_updated_shops(updated_since).await?;
            tracing::debug!(count = shops.len(), since = ?updated_since, "Retrieved shops");

            let pending: Vec<String> = state
                .retry_shop_ids
                .iter()
                .filter(|id| !shops.iter().any(|shop| &shop.id == *id))
                .cloned()
                .collect();
            let mut retried = 0;
            if !pending.is_empty() {
                let retry = self.get_shops_by_ids(&pending).await?;
                tracing::debug!(requested = pending.len(), count = retry.len(), "Retrieved shops to retry");
                for shop in retry {
                    if !shops.iter().any(|known| known.id == shop.id) {
                        retried += 1;
                        shops.push(shop);
                    }
                }
            }

            let mut submitted = 0;
            let mut failures = Vec::new();
            for shop in &shops {
                match self.process_shop(shop).await {
                    Ok(()) => submitted += 1,
                    Err(failure) => {
                        tracing::warn!(
                            shop_id = %failure.shop_id,
                            kind = ?failure.kind,
                            "{}",
                            failure.message
                        );
                        failures.push(failure);
                    }
                }
            }

            let next_state = SyncState {
                watermark: Some(started_at),
                retry_shop_ids: failures.iter().map(|f| f.shop_id.clone()).collect(),
            };
            let watermark_advanced = match self.watermark.store(&next_state).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to store sync state");
                    false
                }
            };

            Ok::<_, SyncError>(SyncReport {
                run_id,
                started_at,
                updated_since,
                retrieved: shops.len(),
                retried,
                submitted,
                failures,
                watermark_advanced,
            })
        }
        .instrument(span)
        .await
    }

    /// Offset pagination over the operator shop listing, in delivery order.
    pub async fn get_updated_shops(
        &self,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ShopRecord>, SyncError> {
        self.list_all(ShopQuery {
            updated_since,
            ..Default::default()
        })
        .await
    }

    /// Current records of the given shops, regardless of when they changed.
    pub async fn get_shops_by_ids(&self, shop_ids: &[String]) -> Result<Vec<ShopRecord>, SyncError> {
        let mut shops = Vec::new();
        for batch in shop_ids.chunks(RETRY_BATCH_SIZE) {
            let page = self
                .list_all(ShopQuery {
                    shop_ids: batch.to_vec(),
                    ..Default::default()
                })
                .await?;
            shops.extend(page);
        }
        Ok(shops)
    }

    async fn list_all(&self, mut query: ShopQuery) -> Result<Vec<ShopRecord>, SyncError> {
        let mut total_count: u64 = 1;
        let mut shops = Vec::new();

        while query.offset < total_count {
            let page = self.shops.get_shops(&query).await?;
            total_count = page.total_count;

            if page.shops.is_empty() && query.offset < total_count {
                return Err(SyncError::EmptyPage {
                    offset: query.offset,
                    total_count,
                });
            }

            query.offset += page.shops.len() as u64;
            shops.extend(page.shops);
        }

        Ok(shops)
    }

    async fn process_shop(&self, shop: &ShopRecord) -> Result<(), ShopFailure> {
        let request = match create_account_holder_request(shop) {
            Ok(request) => request,
            Err(e) => {
                self.notify_operator(shop, vec![e.to_string()]);
                return Err(ShopFailure {
                    shop_id: shop.id.clone(),
                    kind: FailureKind::Mapping,
                    message: format!("Mapping error: {}", e),
                });
            }
        };

        match self.account_holders.create_account_holder(&request).await {
            Ok(response) => {
                tracing::debug!(
                    shop_id = %shop.id,
                    psp_reference = ?response.psp_reference,
                    invalid_fields = response.invalid_fields.len(),
                    "Account holder created"
                );
                if let Some(dispatcher) = &self.notifications {
                    if response.invalid_fields.is_empty() {
                        dispatcher.send_shop_email(
                            shop,
                            None,
                            TEMPLATE_ACCOUNT_HOLDER_CREATED,
                            MSG_ACCOUNT_HOLDER_CREATED_TITLE,
                        );
                    } else {
                        let errors: Vec<String> =
                            response.invalid_fields.iter().map(ToString::to_string).collect();
                        dispatcher.send_seller_email_with_errors(shop, errors.clone());
                        dispatcher.send_operator_email_with_errors(shop, errors);
                    }
                }
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    PaymentsError::Api { error, .. } => format!("ApiException: {}", error),
                    other => format!("Exception: {}", other),
                };
                self.notify_operator(shop, vec![message.clone()]);
                Err(ShopFailure {
                    shop_id: shop.id.clone(),
                    kind: FailureKind::Submission,
                    message,
                })
            }
        }
    }

    fn notify_operator(&self, shop: &ShopRecord, errors: Vec<String>) {
        if let Some(dispatcher) = &self.notifications {
            dispatcher.send_operator_email_with_errors(shop, errors);
        }
    }
}

pub fn create_account_holder_request(
    shop: &ShopRecord,
) -> Result<CreateAccountHolderRequest, MappingError> {
    let legal_entity = legal_entity_from_shop(shop)?;

    let individual_details = match legal_entity {
        LegalEntity::Individual => individual_details_from_shop(shop)?,
        other => return Err(MappingError::UnsupportedLegalEntity(other)),
    };

    let contact = contact_information_from_shop(shop)?;

    Ok(CreateAccountHolderRequest {
        account_holder_code: shop.id.clone(),
        legal_entity,
        account_holder_details: AccountHolderDetails {
            email: contact.email.clone(),
            individual_details: Some(individual_details),
        },
    })
}

/// Exactly one LIST field carrying the legal-entity code must be present.
pub fn legal_entity_from_shop(shop: &ShopRecord) -> Result<LegalEntity, MappingError> {
    let candidates: Vec<_> = shop
        .additional_fields
        .iter()
        .filter(|field| {
            field.field_type == AdditionalFieldType::List
                && field.code.eq_ignore_ascii_case(LEGAL_ENTITY_FIELD_CODE)
        })
        .collect();

    let field = match candidates.as_slice() {
        [] => return Err(MappingError::LegalEntityNotFound),
        [field] => *field,
        many => return Err(MappingError::AmbiguousLegalEntity(many.len())),
    };

    let value = field.value_as_string();
    LegalEntity::from_field_value(&value).ok_or(MappingError::InvalidLegalEntity(value))
}

fn contact_information_from_shop(shop: &ShopRecord) -> Result<&ContactInformation, MappingError> {
    shop.contact_information
        .as_ref()
        .ok_or(MappingError::ContactInformationMissing)
}

fn individual_details_from_shop(shop: &ShopRecord) -> Result<IndividualDetails, MappingError> {
    let contact = contact_information_from_shop(shop)?;

    Ok(IndividualDetails {
        name: Name {
            first_name: contact.firstname.clone(),
            last_name: contact.lastname.clone(),
            gender: gender_from_civility(contact.civility.as_deref()),
        },
    })
}
