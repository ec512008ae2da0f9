//! Recipient memory
//!
//! Learned recipient patterns per user: who they pay, at which bank, under
//! which nicknames and how much. Used for suggestions only; nothing here can
//! move money.

pub mod postgres;
pub mod resolver;
pub mod store;

pub use postgres::PostgresPatternStore;
pub use resolver::{levenshtein, Enrichment, MemoryNote, RecipientMemoryResolver};
pub use store::InMemoryPatternStore;

use crate::models::{RecipientPattern, TransferDetails};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for recipient pattern persistence
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_patterns(&self, user_id: &str) -> Result<Vec<RecipientPattern>>;
    /// Insert or replace the pattern for (account, bank)
    async fn upsert_pattern(&self, user_id: &str, pattern: RecipientPattern) -> Result<()>;
}

/// Fold a successful transfer into the user's pattern for that recipient.
pub async fn learn_transfer(
    store: &dyn MemoryStore,
    user_id: &str,
    details: &TransferDetails,
    at: DateTime<Utc>,
) -> Result<RecipientPattern> {
    let mut pattern = store
        .get_patterns(user_id)
        .await?
        .into_iter()
        .find(|p| p.recipient_identifier == details.account_number && p.bank_code == details.bank_code)
        .unwrap_or_else(|| RecipientPattern::new(user_id, &details.account_number, &details.bank_code));

    pattern.record_transfer(details, at);
    store.upsert_pattern(user_id, pattern.clone()).await?;
    Ok(pattern)
}

/// Postgres when a URL is configured and the pool can be built, otherwise in-memory.
pub fn build_pattern_store(database_url: Option<&str>) -> Arc<dyn MemoryStore> {
    if let Some(url) = database_url {
        match PostgresPatternStore::connect_lazy(url) {
            Ok(store) => {
                info!("Recipient memory backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres recipient memory, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Recipient memory backend: in-memory");
    Arc::new(InMemoryPatternStore::new())
}
