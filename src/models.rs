//! Core data models for the banking conversation engine

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Historical amounts kept per recipient pattern
pub const MAX_HISTORICAL_AMOUNTS: usize = 20;

//
// ================= Money =================
//

/// Money in kobo (1/100 naira). Never a float.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Kobo(pub i64);

impl Kobo {
    pub const PER_NAIRA: i64 = 100;

    pub fn from_naira(naira: i64) -> Self {
        Kobo(naira.saturating_mul(Self::PER_NAIRA))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Kobo {
    /// `₦5,000` or `₦5,000.50`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let naira = abs / Kobo::PER_NAIRA as u64;
        let kobo = abs % Kobo::PER_NAIRA as u64;

        let digits = naira.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if kobo == 0 {
            write!(f, "{}₦{}", sign, grouped)
        } else {
            write!(f, "{}₦{}.{:02}", sign, grouped, kobo)
        }
    }
}

/// `******7890`
pub fn mask_account(account_number: &str) -> String {
    let len = account_number.chars().count();
    if len <= 4 {
        return account_number.to_string();
    }
    let visible: String = account_number.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), visible)
}

//
// ================= Sessions =================
//

/// Conversation key: `<channel>:<user>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(channel: &str, user: &str) -> Self {
        SessionId(format!("{}:{}", channel.trim(), user.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn channel(&self) -> &str {
        match self.0.split_once(':') {
            Some((channel, _)) => channel,
            None => "default",
        }
    }

    /// User part of the key; memory patterns are owned per user.
    pub fn user_id(&self) -> &str {
        match self.0.split_once(':') {
            Some((_, user)) => user,
            None => &self.0,
        }
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.trim().to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId::from(value.as_str())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ================= Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BalanceCheck,
    Transfer,
    TransactionHistory,
    AccountResolve,
    Confirm,
    Cancel,
    Help,
    Unknown,
}

impl Intent {
    pub fn moves_money(self) -> bool {
        matches!(self, Intent::Transfer)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::BalanceCheck => "balance_check",
            Intent::Transfer => "transfer",
            Intent::TransactionHistory => "transaction_history",
            Intent::AccountResolve => "account_resolve",
            Intent::Confirm => "confirm",
            Intent::Cancel => "cancel",
            Intent::Help => "help",
            Intent::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

//
// ================= History Range =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRange {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    Last7Days,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl HistoryRange {
    pub fn label(self) -> &'static str {
        match self {
            HistoryRange::Today => "today",
            HistoryRange::Yesterday => "yesterday",
            HistoryRange::ThisWeek => "this week",
            HistoryRange::LastWeek => "last week",
            HistoryRange::ThisMonth => "this month",
            HistoryRange::LastMonth => "last month",
            HistoryRange::ThisYear => "this year",
            HistoryRange::Last7Days => "the last 7 days",
        }
    }

    /// Inclusive calendar range relative to `today`. Weeks start on Monday.
    pub fn to_dates(self, today: NaiveDate) -> DateRange {
        let days_into_week = today.weekday().num_days_from_monday() as i64;
        let (from, to) = match self {
            HistoryRange::Today => (today, today),
            HistoryRange::Yesterday => {
                let d = today - Duration::days(1);
                (d, d)
            }
            HistoryRange::ThisWeek => (today - Duration::days(days_into_week), today),
            HistoryRange::LastWeek => {
                let start = today - Duration::days(days_into_week + 7);
                (start, start + Duration::days(6))
            }
            HistoryRange::ThisMonth => (today.with_day(1).unwrap_or(today), today),
            HistoryRange::LastMonth => {
                let first_this = today.with_day(1).unwrap_or(today);
                let last_prev = first_this - Duration::days(1);
                (last_prev.with_day(1).unwrap_or(last_prev), last_prev)
            }
            HistoryRange::ThisYear => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                today,
            ),
            HistoryRange::Last7Days => (today - Duration::days(7), today),
        };
        DateRange { from, to }
    }
}

//
// ================= Entities =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntitySet {
    pub amount: Option<Kobo>,
    /// What the user typed for the recipient: an account number or a name
    pub recipient_raw: Option<String>,
    pub account_number: Option<String>,
    /// Person name or nickname ("mom"), when given
    pub recipient_name: Option<String>,
    pub bank_alias: Option<String>,
    pub resolved_bank_code: Option<String>,
    pub resolved_bank_name: Option<String>,
    pub resolved_account_name: Option<String>,
    pub history_range: Option<HistoryRange>,
}

impl EntitySet {
    pub fn has_account(&self) -> bool {
        self.account_number.is_some()
    }

    /// Account number and bank code both known
    pub fn recipient_complete(&self) -> bool {
        self.account_number.is_some() && self.resolved_bank_code.is_some()
    }
}

//
// ================= Pending Action =================
//

/// A fully-specified transfer. Only ever built once every field is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferDetails {
    pub amount: Kobo,
    pub account_number: String,
    pub bank_code: String,
    pub bank_name: String,
    pub account_name: String,
    /// Name the user called this recipient, remembered on success
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub action_id: Uuid,
    pub intent: Intent,
    pub details: TransferDetails,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn summary(&self) -> String {
        format!(
            "{} to {} ({} {})",
            self.details.amount,
            self.details.account_name,
            self.details.bank_name,
            mask_account(&self.details.account_number)
        )
    }
}

//
// ================= Recipient Pattern =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipientPattern {
    pub user_id: String,
    /// Account number
    pub recipient_identifier: String,
    pub bank_code: String,
    pub account_name: Option<String>,
    #[serde(default)]
    pub nicknames: Vec<String>,
    /// Oldest first, bounded to `MAX_HISTORICAL_AMOUNTS`
    #[serde(default)]
    pub historical_amounts: Vec<Kobo>,
    pub use_count: u32,
    pub last_used_at: DateTime<Utc>,
}

impl RecipientPattern {
    pub fn new(user_id: &str, account_number: &str, bank_code: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            recipient_identifier: account_number.to_string(),
            bank_code: bank_code.to_string(),
            account_name: None,
            nicknames: Vec::new(),
            historical_amounts: Vec::new(),
            use_count: 0,
            last_used_at: Utc::now(),
        }
    }

    pub fn same_recipient(&self, other: &RecipientPattern) -> bool {
        self.recipient_identifier == other.recipient_identifier && self.bank_code == other.bank_code
    }

    /// Fold a successful transfer into the pattern.
    pub fn record_transfer(&mut self, details: &TransferDetails, at: DateTime<Utc>) {
        self.historical_amounts.push(details.amount);
        if self.historical_amounts.len() > MAX_HISTORICAL_AMOUNTS {
            let excess = self.historical_amounts.len() - MAX_HISTORICAL_AMOUNTS;
            self.historical_amounts.drain(..excess);
        }
        self.use_count = self.use_count.saturating_add(1);
        self.last_used_at = at;
        self.account_name = Some(details.account_name.clone());

        if let Some(nickname) = &details.nickname {
            let nickname = nickname.trim().to_lowercase();
            if !nickname.is_empty() && !self.nicknames.contains(&nickname) {
                self.nicknames.push(nickname);
            }
        }
    }

    /// Most frequent historical amount; ties go to the most recent.
    pub fn typical_amount(&self) -> Option<Kobo> {
        let mut best: Option<(Kobo, usize, usize)> = None; // (amount, count, last index)
        for (idx, amount) in self.historical_amounts.iter().enumerate() {
            let count = self.historical_amounts.iter().filter(|a| *a == amount).count();
            let better = match best {
                None => true,
                Some((_, best_count, best_idx)) => {
                    count > best_count || (count == best_count && idx > best_idx)
                }
            };
            if better {
                best = Some((*amount, count, idx));
            }
        }
        best.map(|(amount, _, _)| amount)
    }
}

//
// ================= Banking Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub available: Kobo,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub reference: String,
    pub amount: Kobo,
    pub direction: TransactionDirection,
    pub counterparty: Option<String>,
    pub status: String,
    pub occurred_at: DateTime<Utc>,
}

//
// ================= Response =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Read-only answer (balance, history, account lookup, help)
    Info,
    /// Pending action created, waiting for yes/no
    ConfirmationPrompt,
    /// Missing or ambiguous entities, asking the user
    Clarification,
    /// Reminder that a pending action still needs an answer
    PendingReminder,
    /// Transfer dispatched and accepted
    Success,
    /// Pending action cancelled or expired
    Cancelled,
    /// Request failed with a definite outcome
    Failure,
    /// Transfer dispatched, result unknown
    AmbiguousOutcome,
    /// Nothing to act on
    NoOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub text: String,
    pub kind: ResponseKind,
    pub intent: Intent,
}

impl Response {
    pub fn new(kind: ResponseKind, intent: Intent, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            intent,
        }
    }
}
