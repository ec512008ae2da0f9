//! Transfer audit log
//!
//! Append-only record of every dispatched transfer and how it ended.
//! A dispatch can be recorded once per action; the orchestrator relies on
//! that to never call the bank twice for the same confirmation.

use crate::error::EngineError;
use crate::models::{Kobo, PendingAction, SessionId, TransferDetails};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Succeeded { reference: String },
    /// Accepted by the bank, not yet settled
    Processing { reference: String },
    Failed { reason: String },
    /// Dispatched but the result never came back
    Unknown { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAuditRecord {
    pub action_id: Uuid,
    pub session_id: SessionId,
    pub idempotency_key: String,
    pub details: TransferDetails,
    pub dispatched_at: DateTime<Utc>,
    pub outcome: Option<AuditOutcome>,
    pub completed_at: Option<DateTime<Utc>>,
    /// SHA-256 over the dispatched details and key
    pub integrity_hash: String,
}

/// Audit trail storage
pub struct TransferAuditLog {
    records: Arc<RwLock<HashMap<Uuid, TransferAuditRecord>>>,
}

impl TransferAuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record that a confirmed action is about to hit the bank.
    /// Fails if this action was already dispatched.
    pub async fn record_dispatch(&self, session_id: &SessionId, action: &PendingAction) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&action.action_id) {
            return Err(EngineError::AuditError(format!(
                "action {} already dispatched",
                action.action_id
            )));
        }

        records.insert(
            action.action_id,
            TransferAuditRecord {
                action_id: action.action_id,
                session_id: session_id.clone(),
                idempotency_key: action.idempotency_key.clone(),
                details: action.details.clone(),
                dispatched_at: Utc::now(),
                outcome: None,
                completed_at: None,
                integrity_hash: compute_dispatch_hash(&action.details, &action.idempotency_key),
            },
        );
        Ok(())
    }

    pub async fn record_outcome(&self, action_id: Uuid, outcome: AuditOutcome) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&action_id)
            .ok_or_else(|| EngineError::AuditError(format!("no dispatch for action {}", action_id)))?;

        if record.outcome.is_some() {
            return Err(EngineError::AuditError(format!(
                "outcome for action {} already recorded",
                action_id
            )));
        }
        record.outcome = Some(outcome);
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    pub async fn get(&self, action_id: Uuid) -> Result<Option<TransferAuditRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&action_id).cloned())
    }

    /// All dispatches for a session (sorted by dispatched_at)
    pub async fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<TransferAuditRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| &record.session_id == session_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.dispatched_at);
        Ok(items)
    }

    /// Total dispatched on `day` for a session. Failed transfers do not count;
    /// unknown and processing ones do.
    pub async fn sent_today(&self, session_id: &SessionId, day: NaiveDate) -> Kobo {
        let records = self.records.read().await;
        let total: i64 = records
            .values()
            .filter(|record| &record.session_id == session_id)
            .filter(|record| record.dispatched_at.date_naive() == day)
            .filter(|record| !matches!(record.outcome, Some(AuditOutcome::Failed { .. })))
            .map(|record| record.details.amount.value())
            .sum();
        Kobo(total)
    }

    pub async fn dispatch_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, action_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        match records.get(&action_id) {
            Some(record) => Ok(compute_dispatch_hash(&record.details, &record.idempotency_key)
                == record.integrity_hash),
            None => Ok(false),
        }
    }
}

impl Default for TransferAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex SHA-256 of session id and action id; sent to the bank as the
/// transfer reference so a replayed request cannot move money twice.
pub fn idempotency_key(session_id: &SessionId, action_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(action_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Streams the JSON of the details into the hasher
fn compute_dispatch_hash(details: &TransferDetails, idempotency_key: &str) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), details).is_err() {
        return String::new();
    }
    hasher.update(idempotency_key.as_bytes());

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
