//! Sandbox bank
//!
//! Deterministic in-memory bank: a single balance, a table of known
//! accounts and a transaction log. Supports failure injection, latency and
//! call counting so the engine can be exercised without network access.

use super::{
    match_bank_name, BankInfo, BankingApi, BankingError, BankingResult, ResolvedAccount,
    TransferReceipt, TransferRequest, TransferStatus,
};
use crate::models::{Balance, DateRange, Kobo, Transaction, TransactionDirection};
use crate::normalizer::banks::known_banks;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Banks the sandbox knows that the alias table does not
const EXTRA_BANKS: &[(&str, &str)] = &[("303", "Lotus Bank"), ("302", "TAJBank")];

struct SandboxState {
    balance: Kobo,
    /// (account number, bank code) → account name
    accounts: HashMap<(String, String), String>,
    transactions: Vec<Transaction>,
    /// Receipts by idempotency key
    receipts: HashMap<String, TransferReceipt>,
    next_transfer_failure: Option<BankingError>,
    transfer_status: TransferStatus,
    unavailable: bool,
}

pub struct SandboxBank {
    state: Mutex<SandboxState>,
    directory: Vec<BankInfo>,
    latency: Option<Duration>,
    transfer_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl SandboxBank {
    pub fn new(opening_balance: Kobo) -> Self {
        let directory = known_banks()
            .chain(EXTRA_BANKS.iter().copied())
            .map(|(code, name)| BankInfo {
                name: name.to_string(),
                code: code.to_string(),
            })
            .collect();

        Self {
            state: Mutex::new(SandboxState {
                balance: opening_balance,
                accounts: HashMap::new(),
                transactions: Vec::new(),
                receipts: HashMap::new(),
                next_transfer_failure: None,
                transfer_status: TransferStatus::Success,
                unavailable: false,
            }),
            directory,
            latency: None,
            transfer_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    /// A small bank with a handful of accounts for local chatting
    pub fn demo() -> Self {
        Self::new(Kobo::from_naira(250_000))
            .with_account("1234567890", "044", "JOHN DOE")
            .with_account("0123456789", "058", "ADA OBI")
            .with_account("8181648623", "999992", "TUNDE BAKARE")
            .with_account("2233445566", "50211", "NGOZI EZE")
            .with_account("0011223344", "303", "KEMI ADEWALE")
    }

    pub fn with_account(mut self, account_number: &str, bank_code: &str, account_name: &str) -> Self {
        self.state.get_mut().accounts.insert(
            (account_number.to_string(), bank_code.to_string()),
            account_name.to_string(),
        );
        self
    }

    /// Delay every transfer call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn fail_next_transfer(&self, error: BankingError) {
        self.state.lock().await.next_transfer_failure = Some(error);
    }

    pub async fn set_transfer_status(&self, status: TransferStatus) {
        self.state.lock().await.transfer_status = status;
    }

    /// Every call fails as if the bank were offline
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    pub async fn balance(&self) -> Kobo {
        self.state.lock().await.balance
    }

    pub fn transfer_calls(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

fn offline() -> BankingError {
    BankingError::Unavailable("sandbox bank is offline".to_string())
}

#[async_trait::async_trait]
impl BankingApi for SandboxBank {
    async fn get_balance(&self, _user_id: &str) -> BankingResult<Balance> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(offline());
        }
        Ok(Balance {
            available: state.balance,
            currency: "NGN".to_string(),
        })
    }

    async fn resolve_account(&self, account_number: &str, bank_code: &str) -> BankingResult<ResolvedAccount> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(offline());
        }

        let name = state
            .accounts
            .get(&(account_number.to_string(), bank_code.to_string()))
            .ok_or(BankingError::NotFound)?;

        Ok(ResolvedAccount {
            account_number: account_number.to_string(),
            account_name: name.clone(),
            bank_code: bank_code.to_string(),
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> BankingResult<TransferReceipt> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(offline());
        }
        if let Some(error) = state.next_transfer_failure.take() {
            return Err(error);
        }
        if let Some(receipt) = state.receipts.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }

        let key = (request.account_number.clone(), request.bank_code.clone());
        if !state.accounts.contains_key(&key) {
            return Err(BankingError::InvalidAccount(request.account_number.clone()));
        }
        if state.balance < request.amount {
            return Err(BankingError::InsufficientFunds);
        }

        let status = state.transfer_status;
        let short_key: String = request.idempotency_key.chars().take(12).collect();
        let reference = format!("SBX-{}", short_key);

        if status != TransferStatus::Failed {
            state.balance = Kobo(state.balance.value() - request.amount.value());
            state.transactions.push(Transaction {
                reference: reference.clone(),
                amount: request.amount,
                direction: TransactionDirection::Debit,
                counterparty: Some(request.account_name.clone()),
                status: if status == TransferStatus::Success { "success" } else { "pending" }.to_string(),
                occurred_at: Utc::now(),
            });
        }

        let receipt = TransferReceipt {
            reference,
            status,
            message: None,
        };
        state
            .receipts
            .insert(request.idempotency_key.clone(), receipt.clone());

        info!(reference = %receipt.reference, amount = request.amount.value(), "Sandbox transfer");
        Ok(receipt)
    }

    async fn get_history(&self, _user_id: &str, range: DateRange) -> BankingResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(offline());
        }

        let mut history: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|tx| {
                let day = tx.occurred_at.date_naive();
                day >= range.from && day <= range.to
            })
            .cloned()
            .collect();
        history.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(history)
    }

    async fn find_bank(&self, name: &str) -> BankingResult<Option<BankInfo>> {
        if self.state.lock().await.unavailable {
            return Err(offline());
        }
        Ok(match_bank_name(&self.directory, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryRange;

    fn request(key: &str, naira: i64) -> TransferRequest {
        TransferRequest {
            amount: Kobo::from_naira(naira),
            account_number: "1234567890".into(),
            bank_code: "044".into(),
            account_name: "JOHN DOE".into(),
            idempotency_key: key.into(),
            narration: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_transfer_debits_once_per_key() {
        let bank = SandboxBank::demo();
        let before = bank.balance().await;

        let first = bank.transfer(&request("key-1", 5000)).await.unwrap();
        let replay = bank.transfer(&request("key-1", 5000)).await.unwrap();

        assert_eq!(first, replay);
        assert_eq!(bank.transfer_calls(), 2);
        assert_eq!(bank.balance().await, Kobo(before.value() - 500_000));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let bank = SandboxBank::new(Kobo::from_naira(100)).with_account("1234567890", "044", "JOHN DOE");
        let result = bank.transfer(&request("k", 5000)).await;
        assert_eq!(result, Err(BankingError::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let bank = SandboxBank::demo();
        bank.fail_next_transfer(BankingError::Timeout("injected".into())).await;

        assert!(matches!(bank.transfer(&request("a", 10)).await, Err(BankingError::Timeout(_))));
        assert!(bank.transfer(&request("b", 10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_and_directory() {
        let bank = SandboxBank::demo();
        let resolved = bank.resolve_account("1234567890", "044").await.unwrap();
        assert_eq!(resolved.account_name, "JOHN DOE");
        assert_eq!(bank.resolve_account("1234567890", "058").await, Err(BankingError::NotFound));

        let lotus = bank.find_bank("lotus bank").await.unwrap();
        assert_eq!(lotus.map(|b| b.code), Some("303".to_string()));
    }

    #[tokio::test]
    async fn test_history_includes_transfers() {
        let bank = SandboxBank::demo();
        bank.transfer(&request("h", 1000)).await.unwrap();

        let range = HistoryRange::Today.to_dates(Utc::now().date_naive());
        let history = bank.get_history("u1", range).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].direction, TransactionDirection::Debit);
    }
}
