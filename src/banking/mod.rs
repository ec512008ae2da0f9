//! Banking API seam
//!
//! The engine talks to the bank only through `BankingApi`. Two
//! implementations ship with the crate: `PaystackClient` for the real API
//! and `SandboxBank`, an in-memory bank for development and tests.

pub mod paystack;
pub mod sandbox;

pub use paystack::PaystackClient;
pub use sandbox::SandboxBank;

use crate::error::EngineError;
use crate::models::{Balance, DateRange, Kobo, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type BankingResult<T> = std::result::Result<T, BankingError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankingError {
    #[error("account not found")]
    NotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// Request was sent; whether it took effect is unknown
    #[error("no response after dispatch: {0}")]
    Timeout(String),

    #[error("rejected: {0}")]
    Rejected(String),

    /// Request never reached the bank
    #[error("bank unavailable: {0}")]
    Unavailable(String),
}

impl BankingError {
    /// For calls that cannot move money: a timeout is just unavailability.
    pub fn into_read_error(self) -> EngineError {
        match self {
            BankingError::Timeout(detail) | BankingError::Unavailable(detail) => {
                EngineError::ExternalUnavailable(detail)
            }
            other => other.into_transfer_error(),
        }
    }

    /// For the money-moving call: a timeout leaves the outcome unknown.
    pub fn into_transfer_error(self) -> EngineError {
        match self {
            BankingError::NotFound => {
                EngineError::ExternalRejected("that account could not be found".to_string())
            }
            BankingError::InsufficientFunds => {
                EngineError::ExternalRejected("insufficient funds".to_string())
            }
            BankingError::InvalidAccount(detail) => {
                EngineError::ExternalRejected(format!("invalid account ({})", detail))
            }
            BankingError::Rejected(reason) => EngineError::ExternalRejected(reason),
            BankingError::Timeout(detail) => EngineError::AmbiguousOutcome(detail),
            BankingError::Unavailable(detail) => EngineError::ExternalUnavailable(detail),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRequest {
    pub amount: Kobo,
    pub account_number: String,
    pub bank_code: String,
    pub account_name: String,
    /// Sent as the bank-side reference; replays with the same key are deduplicated
    pub idempotency_key: String,
    pub narration: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    /// Accepted, not yet settled
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferReceipt {
    pub reference: String,
    pub status: TransferStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankInfo {
    pub name: String,
    pub code: String,
}

/// Trait for the external bank
#[async_trait::async_trait]
pub trait BankingApi: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> BankingResult<Balance>;

    async fn resolve_account(&self, account_number: &str, bank_code: &str) -> BankingResult<ResolvedAccount>;

    /// Move money. Called at most once per confirmed action.
    async fn transfer(&self, request: &TransferRequest) -> BankingResult<TransferReceipt>;

    /// Newest first
    async fn get_history(&self, user_id: &str, range: DateRange) -> BankingResult<Vec<Transaction>>;

    /// Look a bank up by name in the bank's own directory
    async fn find_bank(&self, name: &str) -> BankingResult<Option<BankInfo>>;
}

/// Pick a bank from a directory by compacted name: exact first, then a unique prefix.
pub(crate) fn match_bank_name(directory: &[BankInfo], query: &str) -> Option<BankInfo> {
    use crate::normalizer::banks::compact;

    let wanted = compact(query);
    let wanted = wanted.strip_suffix("bank").filter(|w| !w.is_empty()).unwrap_or(&wanted);
    if wanted.is_empty() {
        return None;
    }

    let names: Vec<(String, &BankInfo)> = directory
        .iter()
        .map(|bank| {
            let key = compact(&bank.name);
            let key = key.strip_suffix("bank").filter(|k| !k.is_empty()).unwrap_or(&key).to_string();
            (key, bank)
        })
        .collect();

    if let Some((_, bank)) = names.iter().find(|(key, _)| key == wanted) {
        return Some((*bank).clone());
    }

    let mut prefixed = names.iter().filter(|(key, _)| key.starts_with(wanted));
    match (prefixed.next(), prefixed.next()) {
        (Some((_, bank)), None) => Some((*bank).clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<BankInfo> {
        vec![
            BankInfo { name: "Lotus Bank".into(), code: "303".into() },
            BankInfo { name: "Access Bank".into(), code: "044".into() },
            BankInfo { name: "Access Bank (Diamond)".into(), code: "063".into() },
            BankInfo { name: "TAJBank".into(), code: "302".into() },
        ]
    }

    #[test]
    fn test_timeout_means_different_things() {
        let read = BankingError::Timeout("slow".into()).into_read_error();
        assert!(matches!(read, EngineError::ExternalUnavailable(_)));

        let transfer = BankingError::Timeout("slow".into()).into_transfer_error();
        assert!(matches!(transfer, EngineError::AmbiguousOutcome(_)));
    }

    #[test]
    fn test_rejections_carry_reason() {
        match BankingError::InsufficientFunds.into_transfer_error() {
            EngineError::ExternalRejected(reason) => assert!(reason.contains("insufficient")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_match_bank_name() {
        let dir = directory();
        assert_eq!(match_bank_name(&dir, "lotus bank").map(|b| b.code), Some("303".into()));
        assert_eq!(match_bank_name(&dir, "tajbank").map(|b| b.code), Some("302".into()));
        assert_eq!(match_bank_name(&dir, "taj").map(|b| b.code), Some("302".into()));
        // two Access entries share the prefix but one is exact
        assert_eq!(match_bank_name(&dir, "access").map(|b| b.code), Some("044".into()));
        assert_eq!(match_bank_name(&dir, "nowhere"), None);
    }
}
