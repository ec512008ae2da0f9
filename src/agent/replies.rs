//! Reply text for each turn outcome

use crate::banking::{ResolvedAccount, TransferReceipt};
use crate::error::EngineError;
use crate::models::{
    mask_account, Balance, HistoryRange, Intent, Kobo, PendingAction, RecipientPattern, Response,
    ResponseKind, Transaction, TransactionDirection,
};
use crate::normalizer::bank_name;

/// Transactions listed in one history reply
pub const MAX_HISTORY_LINES: usize = 10;

pub fn help() -> Response {
    Response::new(
        ResponseKind::Info,
        Intent::Help,
        "I can check your balance, show recent transactions, verify an account number, \
         and send money. Try \"send 5k to 0123456789 gtbank\" or \"what's my balance\".",
    )
}

/// Clarifying question built from an ambiguity error
pub fn clarify(intent: Intent, error: EngineError) -> Response {
    Response::new(ResponseKind::Clarification, intent, error.user_message())
}

pub fn not_understood() -> Response {
    clarify(
        Intent::Unknown,
        EngineError::ParseAmbiguous(
            "Sorry, I didn't understand that. You can ask for your balance, your recent \
             transactions, or say something like \"send 5k to 0123456789 gtbank\"."
                .to_string(),
        ),
    )
}

pub fn nothing_pending() -> Response {
    Response::new(
        ResponseKind::NoOp,
        Intent::Unknown,
        "There's nothing waiting for your confirmation right now.",
    )
}

pub fn balance(balance: &Balance) -> Response {
    Response::new(
        ResponseKind::Info,
        Intent::BalanceCheck,
        format!("Your available balance is {}.", balance.available),
    )
}

pub fn history(range: HistoryRange, transactions: &[Transaction]) -> Response {
    if transactions.is_empty() {
        return Response::new(
            ResponseKind::Info,
            Intent::TransactionHistory,
            format!("You have no transactions for {}.", range.label()),
        );
    }

    let mut text = format!("Your transactions for {}:", range.label());
    for tx in transactions.iter().take(MAX_HISTORY_LINES) {
        let (sign, preposition) = match tx.direction {
            TransactionDirection::Credit => ("+", "from"),
            TransactionDirection::Debit => ("-", "to"),
        };
        text.push_str(&format!(
            "\n{} {}{}",
            tx.occurred_at.format("%d %b"),
            sign,
            tx.amount
        ));
        if let Some(counterparty) = &tx.counterparty {
            text.push_str(&format!(" {} {}", preposition, counterparty));
        }
        if tx.status != "success" {
            text.push_str(&format!(" ({})", tx.status));
        }
    }
    if transactions.len() > MAX_HISTORY_LINES {
        text.push_str(&format!("\n...and {} more.", transactions.len() - MAX_HISTORY_LINES));
    }

    Response::new(ResponseKind::Info, Intent::TransactionHistory, text)
}

pub fn account_resolved(account: &ResolvedAccount, bank: &str) -> Response {
    Response::new(
        ResponseKind::Info,
        Intent::AccountResolve,
        format!(
            "{} at {} belongs to {}. If that's right, tell me how much to send.",
            mask_account(&account.account_number),
            bank,
            account.account_name
        ),
    )
}

pub fn account_not_found(intent: Intent, account_number: &str, bank: &str) -> Response {
    Response::new(
        ResponseKind::Clarification,
        intent,
        format!(
            "I couldn't find account {} at {}. Please check the number and bank.",
            mask_account(account_number),
            bank
        ),
    )
}

//
// ========== Transfer clarifications ==========
//

pub fn ask_recipient() -> Response {
    Response::new(
        ResponseKind::Clarification,
        Intent::Transfer,
        "Who should I send it to? Give me the account number and bank.",
    )
}

pub fn ask_bank(account_number: &str) -> Response {
    Response::new(
        ResponseKind::Clarification,
        Intent::Transfer,
        format!("Which bank is {} with?", mask_account(account_number)),
    )
}

pub fn unknown_bank(alias: &str) -> Response {
    Response::new(
        ResponseKind::Clarification,
        Intent::Transfer,
        format!("I don't recognise the bank \"{}\". Could you give the full bank name?", alias),
    )
}

pub fn ask_amount(recipient: &str, suggestion: Option<Kobo>) -> Response {
    let text = match suggestion {
        Some(amount) => format!(
            "How much should I send to {}? You usually send {}.",
            recipient, amount
        ),
        None => format!("How much should I send to {}?", recipient),
    };
    Response::new(ResponseKind::Clarification, Intent::Transfer, text)
}

pub fn ask_which_amount(amounts: &[Kobo]) -> Response {
    let listed: Vec<String> = amounts.iter().map(Kobo::to_string).collect();
    let question = if listed.is_empty() {
        "I saw more than one amount. How much do you want to send?".to_string()
    } else {
        format!("I saw more than one amount ({}). Which one should I send?", listed.join(", "))
    };
    clarify(Intent::Transfer, EngineError::ParseAmbiguous(question))
}

pub fn rephrase_transfer() -> Response {
    clarify(
        Intent::Transfer,
        EngineError::ParseAmbiguous(
            "I'm not sure what you'd like to send. Try \"send 5k to 0123456789 gtbank\"."
                .to_string(),
        ),
    )
}

pub fn unknown_recipient(name: &str) -> Response {
    Response::new(
        ResponseKind::Clarification,
        Intent::Transfer,
        format!(
            "I don't have anyone saved as \"{}\". Please give me their account number and bank.",
            name
        ),
    )
}

pub fn choose_recipient(name: &str, candidates: &[RecipientPattern]) -> Response {
    let mut text = format!("I know more than one \"{}\". Which one did you mean?", name);
    for candidate in candidates {
        let bank = bank_name(&candidate.bank_code).unwrap_or(candidate.bank_code.as_str());
        text.push_str(&format!(
            "\n- {} ({} {})",
            candidate.account_name.as_deref().unwrap_or("unnamed"),
            bank,
            mask_account(&candidate.recipient_identifier)
        ));
    }
    text.push_str("\nReply with the account number and bank.");
    clarify(Intent::Transfer, EngineError::RecipientAmbiguous(text))
}

pub fn guard_refused(reason: &str) -> Response {
    Response::new(
        ResponseKind::Failure,
        Intent::Transfer,
        format!("I can't make that transfer: {}", reason),
    )
}

//
// ========== Confirmation ==========
//

pub fn confirmation_prompt(action: &PendingAction, superseded: Option<&PendingAction>) -> Response {
    let details = &action.details;
    let mut text = String::new();
    if let Some(old) = superseded {
        text.push_str(&format!("I've cancelled the earlier request ({}). ", old.summary()));
    }
    text.push_str(&format!(
        "Send {} to {} ({} {})? Reply YES to confirm or NO to cancel.",
        details.amount,
        details.account_name,
        details.bank_name,
        mask_account(&details.account_number)
    ));
    Response::new(ResponseKind::ConfirmationPrompt, Intent::Transfer, text)
}

pub fn still_pending(action: &PendingAction, intent: Intent) -> Response {
    Response::new(
        ResponseKind::PendingReminder,
        intent,
        format!(
            "You still have a transfer waiting: {}. Please reply YES to confirm or NO to cancel.",
            action.summary()
        ),
    )
}

pub fn cancelled(action: &PendingAction) -> Response {
    Response::new(
        ResponseKind::Cancelled,
        Intent::Cancel,
        format!("Okay, I've cancelled the transfer of {}.", action.summary()),
    )
}

pub fn expired(action: &PendingAction, intent: Intent) -> Response {
    Response::new(
        ResponseKind::Cancelled,
        intent,
        format!(
            "Your transfer of {} expired before it was confirmed, so nothing was sent. \
             Start again if you still want to send it.",
            action.summary()
        ),
    )
}

/// Prepended to a reply when the previous pending action lapsed
pub fn expiry_notice(action: &PendingAction) -> String {
    format!("(Your earlier transfer of {} expired and was not sent.) ", action.summary())
}

//
// ========== Outcomes ==========
//

pub fn transfer_succeeded(action: &PendingAction, receipt: &TransferReceipt) -> Response {
    Response::new(
        ResponseKind::Success,
        Intent::Confirm,
        format!("Done! Sent {}. Reference: {}", action.summary(), receipt.reference),
    )
}

pub fn transfer_processing(action: &PendingAction, receipt: &TransferReceipt) -> Response {
    Response::new(
        ResponseKind::Success,
        Intent::Confirm,
        format!(
            "Your transfer of {} is processing. Reference: {}",
            action.summary(),
            receipt.reference
        ),
    )
}

pub fn transfer_failed(reason: &str) -> Response {
    Response::new(
        ResponseKind::Failure,
        Intent::Confirm,
        format!("The transfer failed: {}. No money was sent.", reason),
    )
}

pub fn transfer_outcome_unknown(action: &PendingAction) -> Response {
    Response::new(
        ResponseKind::AmbiguousOutcome,
        Intent::Confirm,
        format!(
            "I couldn't confirm whether your transfer of {} went through. Please check your \
             transaction history before trying again.",
            action.summary()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banking::TransferStatus;
    use crate::confirmation::new_pending_transfer;
    use crate::models::{SessionId, TransferDetails};
    use chrono::{Duration, Utc};

    fn action() -> PendingAction {
        new_pending_transfer(
            &SessionId::from("sms:alice"),
            TransferDetails {
                amount: Kobo::from_naira(5000),
                account_number: "1234567890".into(),
                bank_code: "044".into(),
                bank_name: "Access Bank".into(),
                account_name: "JOHN DOE".into(),
                nickname: None,
            },
            Utc::now(),
            Duration::minutes(5),
        )
    }

    #[test]
    fn test_prompt_shows_amount_name_bank_and_masked_account() {
        let reply = confirmation_prompt(&action(), None);
        assert_eq!(reply.kind, ResponseKind::ConfirmationPrompt);
        assert!(reply.text.contains("₦5,000"));
        assert!(reply.text.contains("JOHN DOE"));
        assert!(reply.text.contains("Access Bank"));
        assert!(reply.text.contains("******7890"));
        assert!(!reply.text.contains("1234567890"));
    }

    #[test]
    fn test_prompt_mentions_superseded_action() {
        let old = action();
        let reply = confirmation_prompt(&action(), Some(&old));
        assert!(reply.text.starts_with("I've cancelled"));
    }

    #[test]
    fn test_success_carries_reference() {
        let receipt = TransferReceipt {
            reference: "REF-1".into(),
            status: TransferStatus::Success,
            message: None,
        };
        assert!(transfer_succeeded(&action(), &receipt).text.contains("REF-1"));
    }

    #[test]
    fn test_ambiguities_become_clarifications() {
        let reply = ask_which_amount(&[Kobo::from_naira(5000), Kobo::from_naira(10_000)]);
        assert_eq!(reply.kind, ResponseKind::Clarification);
        assert!(reply.text.contains("₦5,000, ₦10,000"));

        let mut ada = RecipientPattern::new("alice", "0123456789", "058");
        ada.account_name = Some("ADA OBI".into());
        let reply = choose_recipient("mom", &[ada]);
        assert_eq!(reply.kind, ResponseKind::Clarification);
        assert_eq!(reply.intent, Intent::Transfer);
        assert!(reply.text.contains("ADA OBI (GTBank ******6789)"));
    }

    #[test]
    fn test_history_is_capped() {
        let tx = Transaction {
            reference: "r".into(),
            amount: Kobo::from_naira(100),
            direction: TransactionDirection::Credit,
            counterparty: Some("ADA OBI".into()),
            status: "success".into(),
            occurred_at: Utc::now(),
        };
        let many = vec![tx; MAX_HISTORY_LINES + 3];
        let reply = history(HistoryRange::Today, &many);
        assert!(reply.text.contains("and 3 more"));
        assert!(reply.text.contains("+₦100 from ADA OBI"));
    }
}
