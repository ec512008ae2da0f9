//! Transfer guard
//!
//! Rules-based checks run before a pending transfer is created.
//! Deterministic enforcement; a single failed rule refuses the transfer.

use crate::models::{Kobo, TransferDetails};
use tracing::info;

/// Default single transfer ceiling: ₦1,000,000
pub const DEFAULT_SINGLE_TRANSFER_LIMIT: Kobo = Kobo(100_000_000);

/// Default daily ceiling per session: ₦5,000,000
pub const DEFAULT_DAILY_TRANSFER_LIMIT: Kobo = Kobo(500_000_000);

const ACCOUNT_NUMBER_LEN: usize = 10;

/// What a rule sees of a proposed transfer
pub struct TransferCheck<'a> {
    pub details: &'a TransferDetails,
    /// Already sent (or possibly sent) from this session today
    pub sent_today: Kobo,
}

/// Trait for guard rules
pub trait TransferRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult;
}

pub struct RuleCheckResult {
    pub passed: bool,
    /// User-facing reason when the rule fails
    pub details: String,
}

impl RuleCheckResult {
    fn pass() -> Self {
        Self {
            passed: true,
            details: String::new(),
        }
    }

    fn fail(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub approved: bool,
    pub failed_rules: Vec<&'static str>,
    pub issues: Vec<String>,
}

impl GuardVerdict {
    /// First refusal reason, for the reply
    pub fn reason(&self) -> Option<&str> {
        self.issues.first().map(String::as_str)
    }
}

/// Guard that enforces rules
pub struct TransferGuard {
    rules: Vec<Box<dyn TransferRule>>,
}

impl TransferGuard {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn TransferRule>) {
        self.rules.push(rule);
    }

    /// Run every rule synchronously
    pub fn verify(&self, transfer: &TransferCheck<'_>) -> GuardVerdict {
        let mut failed_rules = Vec::new();
        let mut issues = Vec::new();

        for rule in &self.rules {
            let result = rule.check(transfer);
            if !result.passed {
                failed_rules.push(rule.name());
                issues.push(result.details);
            }
        }

        let approved = issues.is_empty();
        info!(
            rule_count = self.rules.len(),
            approved = approved,
            failed = ?failed_rules,
            "Transfer guard completed"
        );

        GuardVerdict {
            approved,
            failed_rules,
            issues,
        }
    }
}

impl Default for TransferGuard {
    fn default() -> Self {
        Self::new()
    }
}

//
// ========== Rules ==========
//

/// Rule: amount must be above zero
pub struct AmountPositiveRule;

impl TransferRule for AmountPositiveRule {
    fn name(&self) -> &'static str {
        "amount_positive"
    }

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult {
        if transfer.details.amount.is_positive() {
            RuleCheckResult::pass()
        } else {
            RuleCheckResult::fail("The amount must be greater than zero.")
        }
    }
}

/// Rule: no single transfer above the configured ceiling
pub struct SingleTransferLimitRule {
    pub limit: Kobo,
}

impl TransferRule for SingleTransferLimitRule {
    fn name(&self) -> &'static str {
        "single_transfer_limit"
    }

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult {
        if transfer.details.amount <= self.limit {
            RuleCheckResult::pass()
        } else {
            RuleCheckResult::fail(format!(
                "{} is above the single transfer limit of {}.",
                transfer.details.amount, self.limit
            ))
        }
    }
}

/// Rule: today's total including this transfer stays under the daily ceiling
pub struct DailyTransferLimitRule {
    pub limit: Kobo,
}

impl TransferRule for DailyTransferLimitRule {
    fn name(&self) -> &'static str {
        "daily_transfer_limit"
    }

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult {
        let total = transfer
            .sent_today
            .value()
            .saturating_add(transfer.details.amount.value());
        if total <= self.limit.value() {
            RuleCheckResult::pass()
        } else {
            RuleCheckResult::fail(format!(
                "This would take you past your daily limit of {} (already sent {} today).",
                self.limit, transfer.sent_today
            ))
        }
    }
}

/// Rule: NUBAN account numbers are exactly ten digits
pub struct AccountNumberFormatRule;

impl TransferRule for AccountNumberFormatRule {
    fn name(&self) -> &'static str {
        "account_number_format"
    }

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult {
        let account = &transfer.details.account_number;
        if account.len() == ACCOUNT_NUMBER_LEN && account.bytes().all(|b| b.is_ascii_digit()) {
            RuleCheckResult::pass()
        } else {
            RuleCheckResult::fail("Account numbers must be exactly 10 digits.")
        }
    }
}

/// Rule: a bank code must be resolved
pub struct BankCodePresentRule;

impl TransferRule for BankCodePresentRule {
    fn name(&self) -> &'static str {
        "bank_code_present"
    }

    fn check(&self, transfer: &TransferCheck<'_>) -> RuleCheckResult {
        if transfer.details.bank_code.trim().is_empty() {
            RuleCheckResult::fail("I still need to know which bank to send to.")
        } else {
            RuleCheckResult::pass()
        }
    }
}

/// Create a guard with the standard rules
pub fn create_default_transfer_guard(single_limit: Kobo, daily_limit: Kobo) -> TransferGuard {
    let mut guard = TransferGuard::new();
    guard.add_rule(Box::new(AmountPositiveRule));
    guard.add_rule(Box::new(SingleTransferLimitRule { limit: single_limit }));
    guard.add_rule(Box::new(DailyTransferLimitRule { limit: daily_limit }));
    guard.add_rule(Box::new(AccountNumberFormatRule));
    guard.add_rule(Box::new(BankCodePresentRule));
    guard
}

//
// ================= Tests =================
//
