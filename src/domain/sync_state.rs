use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted progress of the shop synchronizer between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Start instant of the last completed run.
    pub watermark: Option<DateTime<Utc>>,
    /// Shops that failed in the last run and are fetched again by id.
    #[serde(default)]
    pub retry_shop_ids: BTreeSet<String>,
}

impl SyncState {
    pub fn new(watermark: Option<DateTime<Utc>>) -> Self {
        Self {
            watermark,
            retry_shop_ids: BTreeSet::new(),
        }
    }
}
