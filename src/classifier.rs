//! Intent Classifier
//!
//! Maps normalized text onto the fixed banking intent taxonomy:
//! - Confirm / Cancel: replies to a pending action (always checked first)
//! - Help, BalanceCheck, TransactionHistory: read-only requests
//! - Transfer: money movement, possibly incomplete
//! - AccountResolve: "who owns 0123456789 gtb?"
//!
//! Read-only over the session; never mutates state.

use crate::models::{EntitySet, Intent};
use crate::normalizer::NormalizedText;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.6;

/// Static keyword lists
const AFFIRMATIVE_WORDS: &[&str] = &[
    "yes", "yeah", "yea", "yep", "yup", "yh", "ya", "ok", "okay", "okk", "kk",
    "confirm", "confirmed", "proceed", "sure", "correct", "approve", "approved",
    // Pidgin / Yoruba / Igbo
    "oya", "beeni", "ee", "ehen", "ehn", "ozugo",
];

const AFFIRMATIVE_PHRASES: &[&str] = &[
    "go ahead", "do it", "send it", "na so", "yes please", "that's right", "carry go",
];

const NEGATIVE_WORDS: &[&str] = &[
    "no", "nope", "nah", "cancel", "stop", "abort", "decline", "reject", "dont", "don't",
    // Pidgin / Yoruba / Igbo / Hausa
    "rara", "mba", "a'a", "kai",
];

/// Cancel even when they are not the first word ("yes but don't send")
const STRONG_NEGATIVES: &[&str] = &["cancel", "stop", "abort", "don't", "dont"];

const NEGATIVE_PHRASES: &[&str] = &[
    "leave am", "leave it", "never mind", "nevermind", "forget it", "no wait",
];

/// Single letters only count as a reply when they are the whole message
const SHORT_REPLIES: &[(&str, bool)] = &[("y", true), ("n", false)];

const HELP_WORDS: &[&str] = &["help", "menu", "commands", "options", "start", "hi", "hello", "hey"];

const HELP_PHRASES: &[&str] = &["what can you do", "how do i", "how does this work", "good morning"];

const BALANCE_WORDS: &[&str] = &["balance", "bal", "blc"];

const BALANCE_PHRASES: &[&str] = &[
    "how much do i have", "how much money", "how much is left", "wetin remain", "my money",
];

const HISTORY_WORDS: &[&str] = &[
    "history", "transactions", "transaction", "statement", "spent", "spend", "spending",
    "debits", "credits", "receipts",
];

const HISTORY_PHRASES: &[&str] = &["what did i", "recent transfers", "last transfers"];

/// Why a classification cannot be acted on as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarifyReason {
    /// Yes/no with no pending action
    NothingPending,
    MissingAmount,
    MissingRecipient,
    /// Several amounts, none next to a transfer verb
    AmountAmbiguous,
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub entities: EntitySet,
    pub confidence: f32,
    pub clarification: Option<ClarifyReason>,
}

impl Classification {
    fn new(intent: Intent, entities: EntitySet, confidence: f32) -> Self {
        Self {
            intent,
            entities,
            confidence,
            clarification: None,
        }
    }

    fn with_clarification(mut self, reason: ClarifyReason) -> Self {
        self.clarification = Some(reason);
        self
    }

    pub fn needs_clarification(&self) -> bool {
        self.clarification.is_some()
    }
}

/// What the classifier may see of the session
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionContext {
    pub has_pending_action: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Affirmative,
    Negative,
}

/// Intent classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    min_confidence: f32,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl IntentClassifier {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Classify a message in the context of its session
    pub fn classify(&self, normalized: &NormalizedText, context: &SessionContext) -> Classification {
        let entities = normalized.entities();
        let reply = detect_reply(normalized);

        // 1. replies to a pending action win over every other keyword
        if context.has_pending_action {
            match reply {
                Some(Reply::Affirmative) => return Classification::new(Intent::Confirm, entities, 1.0),
                Some(Reply::Negative) => return Classification::new(Intent::Cancel, entities, 1.0),
                None => {}
            }
        }

        let classified = self.classify_request(normalized, entities);

        // 2. a yes/no carrying no other request has nothing to act on
        if reply.is_some() && classified.intent == Intent::Unknown {
            return classified.with_clarification(ClarifyReason::NothingPending);
        }
        // "cancel that transfer" with nothing to cancel
        if reply == Some(Reply::Negative)
            && classified.intent == Intent::Transfer
            && classified.entities.amount.is_none()
        {
            let entities = classified.entities;
            return Classification::new(Intent::Unknown, entities, 0.0)
                .with_clarification(ClarifyReason::NothingPending);
        }

        if classified.clarification.is_none()
            && classified.intent != Intent::Unknown
            && classified.confidence < self.min_confidence
        {
            return classified.with_clarification(ClarifyReason::LowConfidence);
        }

        classified
    }

    fn classify_request(&self, n: &NormalizedText, entities: EntitySet) -> Classification {
        // greetings and "my money" inside a full transfer command do not count
        let transfer_signal = has_transfer_signal(n, &entities);

        if !transfer_signal && matches_any(n, HELP_WORDS, HELP_PHRASES) {
            return Classification::new(Intent::Help, entities, 0.9);
        }

        if !transfer_signal && matches_any(n, BALANCE_WORDS, BALANCE_PHRASES) {
            return Classification::new(Intent::BalanceCheck, entities, 0.9);
        }

        if matches_any(n, HISTORY_WORDS, HISTORY_PHRASES) && !n.has_transfer_verb() {
            return Classification::new(Intent::TransactionHistory, entities, 0.9);
        }

        let has_verb = n.has_transfer_verb();
        let has_amount = entities.amount.is_some();
        let has_recipient = entities.has_account() || entities.recipient_name.is_some();

        if has_verb || (has_amount && has_recipient) || (n.amount_ambiguous && has_recipient) {
            return transfer_classification(n, entities, has_verb);
        }

        if entities.has_account() && entities.bank_alias.is_some() && !has_amount {
            return Classification::new(Intent::AccountResolve, entities, 0.85);
        }

        Classification::new(Intent::Unknown, entities, 0.0)
    }
}

fn transfer_classification(n: &NormalizedText, entities: EntitySet, has_verb: bool) -> Classification {
    let has_amount = entities.amount.is_some();
    let has_recipient = entities.has_account() || entities.recipient_name.is_some();

    let mut confidence: f32 = 0.5;
    if has_verb {
        confidence += 0.2;
    }
    if has_amount {
        confidence += 0.2;
    }
    if has_recipient {
        confidence += 0.1;
    }
    if entities.has_account() && entities.bank_alias.is_some() {
        confidence += 0.05;
    }

    let reason = if n.amount_ambiguous {
        confidence -= 0.2;
        Some(ClarifyReason::AmountAmbiguous)
    } else if !has_recipient {
        Some(ClarifyReason::MissingRecipient)
    } else if !has_amount {
        Some(ClarifyReason::MissingAmount)
    } else {
        None
    };

    let classification = Classification::new(Intent::Transfer, entities, confidence.min(1.0));
    match reason {
        Some(reason) => classification.with_clarification(reason),
        None => classification,
    }
}

fn matches_any(n: &NormalizedText, words: &[&str], phrases: &[&str]) -> bool {
    words.iter().any(|w| n.has_token(w)) || phrases.iter().any(|p| n.has_phrase(p))
}

fn starts_with_phrase(n: &NormalizedText, phrase: &str) -> bool {
    n.text == phrase || n.text.starts_with(&format!("{} ", phrase))
}

/// Any transfer content in the message
fn carries_transfer(n: &NormalizedText) -> bool {
    n.has_transfer_verb() || n.amount.is_some() || n.amount_ambiguous || n.account_number.is_some()
}

/// A transfer verb with something to send, or an amount with a recipient
fn has_transfer_signal(n: &NormalizedText, entities: &EntitySet) -> bool {
    let has_amount = entities.amount.is_some() || n.amount_ambiguous;
    let has_recipient = entities.has_account() || entities.recipient_name.is_some();
    (n.has_transfer_verb() && (has_amount || entities.has_account())) || (has_amount && has_recipient)
}

/// Fast path yes/no detection. Negatives win when both appear.
fn detect_reply(n: &NormalizedText) -> Option<Reply> {
    let first = n.first_token()?;

    if n.tokens.len() == 1 {
        if let Some((_, yes)) = SHORT_REPLIES.iter().find(|(w, _)| *w == first) {
            return Some(if *yes { Reply::Affirmative } else { Reply::Negative });
        }
    }

    let negative = NEGATIVE_WORDS.contains(&first)
        || STRONG_NEGATIVES.iter().any(|w| n.has_token(w))
        || NEGATIVE_PHRASES.iter().any(|p| n.has_phrase(p));
    if negative {
        return Some(Reply::Negative);
    }

    let affirmative = AFFIRMATIVE_WORDS.contains(&first)
        || AFFIRMATIVE_PHRASES.iter().any(|p| starts_with_phrase(n, p))
        || (!carries_transfer(n) && AFFIRMATIVE_PHRASES.iter().any(|p| n.has_phrase(p)));
    if affirmative {
        return Some(Reply::Affirmative);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Kobo;
    use crate::normalizer::normalize;

    const PENDING: SessionContext = SessionContext { has_pending_action: true };
    const IDLE: SessionContext = SessionContext { has_pending_action: false };

    fn classify(text: &str, context: SessionContext) -> Classification {
        IntentClassifier::default().classify(&normalize(text), &context)
    }

    #[test]
    fn test_confirmations_with_pending_action() {
        let cases = vec!["yes", "Y", "ok", "go ahead", "Oya", "beeni", "ehen", "na so", "yes please send"];

        for c in cases {
            assert_eq!(classify(c, PENDING).intent, Intent::Confirm, "case {}", c);
        }
    }

    #[test]
    fn test_cancellations_with_pending_action() {
        let cases = vec!["no", "n", "nope", "cancel", "rara", "mba", "a'a", "leave am", "yes but don't send"];

        for c in cases {
            assert_eq!(classify(c, PENDING).intent, Intent::Cancel, "case {}", c);
        }
    }

    #[test]
    fn test_reply_wins_over_other_keywords() {
        // "balance" would otherwise be a balance check
        assert_eq!(classify("yes, whatever my balance is", PENDING).intent, Intent::Confirm);
        assert_eq!(classify("cancel that transfer", PENDING).intent, Intent::Cancel);
    }

    #[test]
    fn test_yes_without_pending_is_noop() {
        for c in ["yes", "ok", "no", "cancel"] {
            let result = classify(c, IDLE);
            assert_eq!(result.intent, Intent::Unknown);
            assert_eq!(result.clarification, Some(ClarifyReason::NothingPending));
        }
    }

    #[test]
    fn test_cancel_transfer_without_pending_is_noop() {
        let result = classify("cancel that transfer", IDLE);
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.clarification, Some(ClarifyReason::NothingPending));
    }

    #[test]
    fn test_read_only_intents() {
        assert_eq!(classify("what's my balance", IDLE).intent, Intent::BalanceCheck);
        assert_eq!(classify("show my transactions last week", IDLE).intent, Intent::TransactionHistory);
        assert_eq!(classify("help", IDLE).intent, Intent::Help);
        assert_eq!(classify("hello", IDLE).intent, Intent::Help);
    }

    #[test]
    fn test_complete_transfer() {
        let result = classify("send 5k to 1234567890 access bank", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert_eq!(result.entities.amount, Some(Kobo(500_000)));
        assert_eq!(result.entities.resolved_bank_code.as_deref(), Some("044"));
        assert!(result.clarification.is_none());
        assert!(result.confidence >= DEFAULT_MIN_CONFIDENCE);
    }

    #[test]
    fn test_transfer_without_verb() {
        let result = classify("0123456789 gtb 2000", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert!(result.clarification.is_none());
    }

    #[test]
    fn test_incomplete_transfers() {
        let result = classify("send money to mom", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert_eq!(result.clarification, Some(ClarifyReason::MissingAmount));

        let result = classify("send 5k", IDLE);
        assert_eq!(result.clarification, Some(ClarifyReason::MissingRecipient));

        let result = classify("for mom: 5k or 10k", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert_eq!(result.clarification, Some(ClarifyReason::AmountAmbiguous));
        assert_eq!(result.entities.amount, None);
    }

    #[test]
    fn test_account_resolve() {
        let result = classify("0123456789 gtbank", IDLE);
        assert_eq!(result.intent, Intent::AccountResolve);
    }

    #[test]
    fn test_unknown() {
        let result = classify("the weather is nice", IDLE);
        assert_eq!(result.intent, Intent::Unknown);
        assert!(result.clarification.is_none());
    }

    #[test]
    fn test_affirmative_phrase_inside_new_transfer_is_not_a_reply() {
        let result = classify("send 3k to 0123456789 gtbank and do it quickly", PENDING);
        assert_eq!(result.intent, Intent::Transfer);
        assert_eq!(result.entities.amount, Some(Kobo(300_000)));

        assert_eq!(classify("go ahead and send it", PENDING).intent, Intent::Confirm);
        assert_eq!(classify("please go ahead", PENDING).intent, Intent::Confirm);
        assert_eq!(classify("that's right", PENDING).intent, Intent::Confirm);
    }

    #[test]
    fn test_greeting_or_balance_words_inside_transfer() {
        let result = classify("hi, send 5k to 1234567890 access bank", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert!(result.clarification.is_none());

        let result = classify("send my money 5k to 1234567890 access bank", IDLE);
        assert_eq!(result.intent, Intent::Transfer);
        assert_eq!(result.entities.amount, Some(Kobo(500_000)));

        // a verb alone is still a question
        assert_eq!(classify("how do i send money", IDLE).intent, Intent::Help);
        assert_eq!(classify("hey", IDLE).intent, Intent::Help);
    }

    #[test]
    fn test_new_transfer_while_pending_is_transfer() {
        let result = classify("send 2k to 0123456789 zenith", PENDING);
        assert_eq!(result.intent, Intent::Transfer);
    }
}
