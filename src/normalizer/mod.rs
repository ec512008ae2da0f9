//! Normalizer
//!
//! Pure canonicalization of a raw chat message: tokens, amount, account
//! number, bank alias, recipient name and history range. No I/O; lookup
//! tables and patterns are compiled once.

pub mod amount;
pub mod banks;

pub use amount::{parse_amount, scan_amounts, AmountToken};
pub use banks::{bank_name, resolve_bank_code};

use crate::models::{EntitySet, HistoryRange};
use serde::{Deserialize, Serialize};

/// Verbs that introduce a transfer
pub const TRANSFER_VERBS: &[&str] = &["send", "transfer", "pay", "give", "remit"];

/// An amount must start within this many tokens after a transfer verb
const VERB_WINDOW: usize = 2;

/// Longest run of words tried as one bank alias
const MAX_BANK_WINDOW: usize = 4;

/// Digit groupings people use when typing a 10-digit account number
const ACCOUNT_GROUPINGS: &[&[usize]] = &[&[3, 3, 4], &[4, 3, 3], &[2, 4, 4], &[5, 5]];

const ACCOUNT_NUMBER_LEN: usize = 10;

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']'];

/// Words that never form part of a recipient name or an unknown bank alias
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "my", "to", "for", "from", "and", "or", "of", "in", "on", "at",
    "me", "him", "her", "them", "us", "you", "it", "this", "that", "these", "those",
    "money", "cash", "funds", "naira", "ngn", "k", "m", "thousand", "million",
    "please", "pls", "plz", "abeg", "now", "today", "asap", "quickly", "urgently",
    "account", "acct", "acc", "bank", "number", "no", "with", "via", "some",
];

/// Bank mention found in the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMention {
    /// Surface text as typed ("access bank")
    pub alias: String,
    /// Canonical code when the alias table knows it
    pub code: Option<String>,
    start: usize,
    end: usize,
}

impl BankMention {
    fn covers(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Output of `normalize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub original: String,
    /// Canonical lowercase tokens, space-joined
    pub text: String,
    pub tokens: Vec<String>,
    /// Chosen amount
    pub amount: Option<AmountToken>,
    /// Amount-like tokens that were not chosen
    pub ignored_amounts: Vec<AmountToken>,
    /// Several amounts and none next to a transfer verb
    pub amount_ambiguous: bool,
    pub account_number: Option<String>,
    pub bank: Option<BankMention>,
    pub recipient_name: Option<String>,
    pub history_range: Option<HistoryRange>,
}

impl NormalizedText {
    pub fn has_token(&self, word: &str) -> bool {
        self.tokens.iter().any(|t| t == word)
    }

    /// Whole-word phrase match ("go ahead", "leave am")
    pub fn has_phrase(&self, phrase: &str) -> bool {
        format!(" {} ", self.text).contains(&format!(" {} ", phrase))
    }

    pub fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    pub fn has_transfer_verb(&self) -> bool {
        self.tokens.iter().any(|t| TRANSFER_VERBS.contains(&t.as_str()))
    }

    pub fn entities(&self) -> EntitySet {
        let code = self.bank.as_ref().and_then(|b| b.code.clone());
        EntitySet {
            amount: self.amount.as_ref().map(|a| a.kobo),
            recipient_raw: self
                .account_number
                .clone()
                .or_else(|| self.recipient_name.clone()),
            account_number: self.account_number.clone(),
            recipient_name: self.recipient_name.clone(),
            bank_alias: self.bank.as_ref().map(|b| b.alias.clone()),
            resolved_bank_name: code
                .as_deref()
                .and_then(bank_name)
                .map(str::to_string),
            resolved_bank_code: code,
            resolved_account_name: None,
            history_range: self.history_range,
        }
    }
}

/// Canonicalize a raw message.
pub fn normalize(raw: &str) -> NormalizedText {
    let tokens = merge_account_groups(tokenize(raw));

    let (amount, ignored_amounts, amount_ambiguous) = choose_amount(&tokens, scan_amounts(&tokens));

    let account_indices: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.len() == ACCOUNT_NUMBER_LEN && is_digits(t))
        .map(|(i, _)| i)
        .collect();

    let bank = find_known_bank(&tokens)
        .or_else(|| find_unknown_bank(&tokens, account_indices.first().copied()));

    // prefer the account number sitting next to the bank mention
    let account_index = match &bank {
        Some(b) => account_indices
            .iter()
            .copied()
            .find(|&i| i + 1 == b.start || i == b.end)
            .or_else(|| account_indices.first().copied()),
        None => account_indices.first().copied(),
    };
    let account_number = account_index.map(|i| tokens[i].clone());

    let recipient_name = extract_recipient_name(&tokens, bank.as_ref(), amount.as_ref());
    let history_range = detect_history_range(&tokens);

    NormalizedText {
        original: raw.to_string(),
        text: tokens.join(" "),
        tokens,
        amount,
        ignored_amounts,
        amount_ambiguous,
        account_number,
        bank,
        recipient_name,
        history_range,
    }
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_word(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_alphabetic() || c == '\'' || c == '-')
}

fn tokenize(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(TRIM_CHARS).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Join "818 164 8623" style groups into one 10-digit token.
fn merge_account_groups(tokens: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;

    'scan: while i < tokens.len() {
        for grouping in ACCOUNT_GROUPINGS {
            let n = grouping.len();
            if i + n <= tokens.len()
                && grouping
                    .iter()
                    .zip(&tokens[i..i + n])
                    .all(|(len, t)| t.len() == *len && is_digits(t))
            {
                merged.push(tokens[i..i + n].concat());
                i += n;
                continue 'scan;
            }
        }
        merged.push(tokens[i].clone());
        i += 1;
    }

    merged
}

fn choose_amount(
    tokens: &[String],
    mut amounts: Vec<AmountToken>,
) -> (Option<AmountToken>, Vec<AmountToken>, bool) {
    let verbs: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| TRANSFER_VERBS.contains(&t.as_str()))
        .map(|(i, _)| i)
        .collect();

    let adjacent = amounts.iter().position(|a| {
        verbs
            .iter()
            .any(|&v| a.index > v && a.index - v <= VERB_WINDOW)
    });

    match (adjacent, amounts.len()) {
        (Some(pos), _) => {
            let chosen = amounts.remove(pos);
            (Some(chosen), amounts, false)
        }
        (None, 0) => (None, amounts, false),
        (None, 1) => (amounts.pop(), Vec::new(), false),
        (None, _) => (None, amounts, true),
    }
}

/// Longest known alias window, scanning left to right.
fn find_known_bank(tokens: &[String]) -> Option<BankMention> {
    for start in 0..tokens.len() {
        if !is_word(&tokens[start]) || STOPWORDS.contains(&tokens[start].as_str()) {
            continue;
        }
        let max_end = (start + MAX_BANK_WINDOW).min(tokens.len());
        for end in (start + 1..=max_end).rev() {
            let window = &tokens[start..end];
            if !window.iter().all(|t| is_word(t)) {
                continue;
            }
            let alias = window.join(" ");
            if let Some(code) = resolve_bank_code(&alias) {
                return Some(BankMention {
                    alias,
                    code: Some(code.to_string()),
                    start,
                    end,
                });
            }
        }
    }
    None
}

/// "<word> bank" or the word right after the account number, passed through unresolved.
fn find_unknown_bank(tokens: &[String], account_index: Option<usize>) -> Option<BankMention> {
    let candidate = |i: usize| {
        tokens
            .get(i)
            .filter(|t| is_word(t) && !STOPWORDS.contains(&t.as_str()))
            .filter(|t| !TRANSFER_VERBS.contains(&t.as_str()))
            .is_some()
    };

    for (i, token) in tokens.iter().enumerate() {
        if (token == "bank" || token == "mfb") && i > 0 && candidate(i - 1) {
            return Some(BankMention {
                alias: format!("{} {}", tokens[i - 1], token),
                code: None,
                start: i - 1,
                end: i + 1,
            });
        }
    }

    let next = account_index? + 1;
    if candidate(next) {
        let end = if tokens.get(next + 1).map_or(false, |t| t == "bank") {
            next + 2
        } else {
            next + 1
        };
        return Some(BankMention {
            alias: tokens[next..end].join(" "),
            code: None,
            start: next,
            end,
        });
    }

    None
}

fn extract_recipient_name(
    tokens: &[String],
    bank: Option<&BankMention>,
    amount: Option<&AmountToken>,
) -> Option<String> {
    let usable = |i: usize| {
        is_word(&tokens[i])
            && !STOPWORDS.contains(&tokens[i].as_str())
            && !TRANSFER_VERBS.contains(&tokens[i].as_str())
            && !bank.map_or(false, |b| b.covers(i))
    };
    let skip_determiner = |mut j: usize| {
        while j < tokens.len() && matches!(tokens[j].as_str(), "my" | "the") {
            j += 1;
        }
        j
    };

    // "to mom", "for john doe"
    for (i, token) in tokens.iter().enumerate() {
        if token != "to" && token != "for" {
            continue;
        }
        let mut j = skip_determiner(i + 1);
        let mut words = Vec::new();
        while j < tokens.len() && words.len() < 2 && usable(j) {
            words.push(tokens[j].as_str());
            j += 1;
        }
        if !words.is_empty() {
            return Some(words.join(" "));
        }
    }

    // "pay mom 5k"
    let amount_index = amount.map(|a| a.index)?;
    for (i, token) in tokens.iter().enumerate() {
        if !TRANSFER_VERBS.contains(&token.as_str()) {
            continue;
        }
        let j = skip_determiner(i + 1);
        if j < tokens.len() && usable(j) && j < amount_index && amount_index - j <= 2 {
            return Some(tokens[j].clone());
        }
    }

    None
}

fn detect_history_range(tokens: &[String]) -> Option<HistoryRange> {
    let text = format!(" {} ", tokens.join(" "));
    let has = |phrases: &[&str]| phrases.iter().any(|p| text.contains(&format!(" {} ", p)));

    if has(&["today"]) {
        Some(HistoryRange::Today)
    } else if has(&["yesterday"]) {
        Some(HistoryRange::Yesterday)
    } else if has(&["last 7 days", "past 7 days", "past week"]) {
        Some(HistoryRange::Last7Days)
    } else if has(&["last week", "previous week"]) {
        Some(HistoryRange::LastWeek)
    } else if has(&["this week", "week"]) {
        Some(HistoryRange::ThisWeek)
    } else if has(&["last month", "previous month"]) {
        Some(HistoryRange::LastMonth)
    } else if has(&["this month", "month"]) {
        Some(HistoryRange::ThisMonth)
    } else if has(&["this year", "year"]) {
        Some(HistoryRange::ThisYear)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Kobo;

    #[test]
    fn test_transfer_to_account_and_bank() {
        let n = normalize("send 5k to 1234567890 access bank");

        assert_eq!(n.amount.as_ref().map(|a| a.kobo), Some(Kobo(500_000)));
        assert_eq!(n.account_number.as_deref(), Some("1234567890"));
        let bank = n.bank.as_ref().unwrap();
        assert_eq!(bank.alias, "access bank");
        assert_eq!(bank.code.as_deref(), Some("044"));
        assert_eq!(n.recipient_name, None);

        let entities = n.entities();
        assert_eq!(entities.recipient_raw.as_deref(), Some("1234567890"));
        assert_eq!(entities.resolved_bank_name.as_deref(), Some("Access Bank"));
    }

    #[test]
    fn test_spaced_account_number_is_merged() {
        let n = normalize("Send 2000 to 818 164 8623 opay");
        assert_eq!(n.account_number.as_deref(), Some("8181648623"));
        assert_eq!(n.amount.as_ref().map(|a| a.kobo), Some(Kobo(200_000)));
        assert_eq!(n.bank.as_ref().and_then(|b| b.code.as_deref()), Some("999992"));
    }

    #[test]
    fn test_account_number_never_an_amount() {
        let n = normalize("1234567890 gtb");
        assert!(n.amount.is_none());
        assert!(!n.amount_ambiguous);
        assert_eq!(n.account_number.as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_verb_adjacent_amount_wins() {
        let n = normalize("send 5k to mom, I owe her 2k");
        assert_eq!(n.amount.as_ref().map(|a| a.kobo), Some(Kobo(500_000)));
        assert_eq!(n.ignored_amounts.len(), 1);
        assert_eq!(n.ignored_amounts[0].kobo, Kobo(200_000));
        assert!(!n.amount_ambiguous);
    }

    #[test]
    fn test_verb_window_is_two_tokens() {
        let n = normalize("pay mom 5k, not 2k");
        assert_eq!(n.amount.as_ref().map(|a| a.kobo), Some(Kobo(500_000)));
        assert!(!n.amount_ambiguous);

        let n = normalize("send it over 5k or 2k");
        assert!(n.amount.is_none());
        assert!(n.amount_ambiguous);
    }

    #[test]
    fn test_competing_amounts_are_ambiguous() {
        let n = normalize("mom 5k or 10k");
        assert!(n.amount.is_none());
        assert!(n.amount_ambiguous);
        assert_eq!(n.ignored_amounts.len(), 2);
    }

    #[test]
    fn test_unknown_bank_passes_through() {
        let n = normalize("send 1000 to 0123456789 lotus bank");
        let bank = n.bank.unwrap();
        assert_eq!(bank.alias, "lotus bank");
        assert_eq!(bank.code, None);

        let n = normalize("send 1000 to 0123456789 tajbank");
        assert_eq!(n.bank.unwrap().alias, "tajbank");
    }

    #[test]
    fn test_recipient_names() {
        assert_eq!(normalize("send 5k to mom").recipient_name.as_deref(), Some("mom"));
        assert_eq!(normalize("pay my landlord 50k").recipient_name.as_deref(), Some("landlord"));
        assert_eq!(
            normalize("transfer 3000 to John Doe please").recipient_name.as_deref(),
            Some("john doe")
        );
        assert_eq!(normalize("send 5k to mom gtb").recipient_name.as_deref(), Some("mom"));
    }

    #[test]
    fn test_multiword_bank_alias() {
        let n = normalize("send 10k to 0123456789 first city monument bank");
        assert_eq!(n.bank.and_then(|b| b.code).as_deref(), Some("214"));

        let n = normalize("send 10k to 0123456789 first bank");
        assert_eq!(n.bank.and_then(|b| b.code).as_deref(), Some("011"));
    }

    #[test]
    fn test_history_ranges() {
        assert_eq!(normalize("history last week").history_range, Some(HistoryRange::LastWeek));
        assert_eq!(normalize("transactions this month").history_range, Some(HistoryRange::ThisMonth));
        assert_eq!(normalize("what did I spend today?").history_range, Some(HistoryRange::Today));
        assert_eq!(normalize("show my history").history_range, None);
    }

    #[test]
    fn test_punctuation_and_phrases() {
        let n = normalize("Yes, go ahead!");
        assert_eq!(n.first_token(), Some("yes"));
        assert!(n.has_phrase("go ahead"));
        assert!(!n.has_phrase("ahead go"));
        assert!(!n.has_phrase("go ah"));
    }
}
