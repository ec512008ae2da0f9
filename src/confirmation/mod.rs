//! Confirmation State Machine
//!
//! NONE → AWAITING_CONFIRMATION → {CONFIRMED | CANCELLED | EXPIRED} → NONE
//!
//! Money only moves after `confirm` hands the pending action back to the
//! caller. Expiry is evaluated lazily against the caller's clock.

use crate::audit::idempotency_key;
use crate::models::{Intent, PendingAction, SessionId, TransferDetails};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_CONFIRMATION_WINDOW_SECS: i64 = 300;

/// Longest confirmation window accepted; longer windows are clamped
pub const MAX_CONFIRMATION_WINDOW_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationState {
    None,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub action_id: Uuid,
    pub from: ConfirmationState,
    pub to: ConfirmationState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// Caller now owns the action and must execute it exactly once
    Confirmed(PendingAction),
    NothingPending,
    Expired(PendingAction),
}

/// Build a fully-specified transfer awaiting confirmation.
pub fn new_pending_transfer(
    session_id: &SessionId,
    details: TransferDetails,
    now: DateTime<Utc>,
    window: Duration,
) -> PendingAction {
    let action_id = Uuid::new_v4();
    let window = window.min(Duration::seconds(MAX_CONFIRMATION_WINDOW_SECS));
    let expires_at = now.checked_add_signed(window).unwrap_or(now);
    PendingAction {
        action_id,
        intent: Intent::Transfer,
        idempotency_key: idempotency_key(session_id, action_id),
        details,
        created_at: now,
        expires_at,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationStateMachine {
    pending: Option<PendingAction>,
    last_transition: Option<Transition>,
}

impl ConfirmationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConfirmationState {
        if self.pending.is_some() {
            ConfirmationState::AwaitingConfirmation
        } else {
            ConfirmationState::None
        }
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn last_transition(&self) -> Option<&Transition> {
        self.last_transition.as_ref()
    }

    /// Start awaiting confirmation. A live action is cancelled, never merged,
    /// and returned to the caller.
    pub fn begin(&mut self, action: PendingAction) -> Option<PendingAction> {
        let superseded = self.pending.take();
        if let Some(old) = &superseded {
            self.record(old.action_id, ConfirmationState::Cancelled, action.created_at);
            info!(action_id = %old.action_id, "Pending action superseded");
        }

        self.last_transition = Some(Transition {
            action_id: action.action_id,
            from: ConfirmationState::None,
            to: ConfirmationState::AwaitingConfirmation,
            at: action.created_at,
        });
        debug!(action_id = %action.action_id, expires_at = %action.expires_at, "Awaiting confirmation");
        self.pending = Some(action);

        superseded
    }

    /// Take the pending action for execution.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> ConfirmOutcome {
        if let Some(expired) = self.check_expiry(now) {
            return ConfirmOutcome::Expired(expired);
        }

        match self.pending.take() {
            Some(action) => {
                self.record(action.action_id, ConfirmationState::Confirmed, now);
                ConfirmOutcome::Confirmed(action)
            }
            None => ConfirmOutcome::NothingPending,
        }
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Option<PendingAction> {
        let action = self.pending.take()?;
        self.record(action.action_id, ConfirmationState::Cancelled, now);
        Some(action)
    }

    /// Clear and return the pending action if its window has passed.
    pub fn check_expiry(&mut self, now: DateTime<Utc>) -> Option<PendingAction> {
        if !self.pending.as_ref().map_or(false, |p| p.is_expired(now)) {
            return None;
        }
        let action = self.pending.take()?;
        self.record(action.action_id, ConfirmationState::Expired, now);
        info!(action_id = %action.action_id, "Pending action expired");
        Some(action)
    }

    fn record(&mut self, action_id: Uuid, to: ConfirmationState, at: DateTime<Utc>) {
        self.last_transition = Some(Transition {
            action_id,
            from: ConfirmationState::AwaitingConfirmation,
            to,
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Kobo;

    fn details(naira: i64) -> TransferDetails {
        TransferDetails {
            amount: Kobo::from_naira(naira),
            account_number: "1234567890".into(),
            bank_code: "044".into(),
            bank_name: "Access Bank".into(),
            account_name: "JOHN DOE".into(),
            nickname: None,
        }
    }

    fn action(now: DateTime<Utc>) -> PendingAction {
        new_pending_transfer(
            &SessionId::from("test:user"),
            details(5000),
            now,
            Duration::seconds(DEFAULT_CONFIRMATION_WINDOW_SECS),
        )
    }

    #[test]
    fn test_begin_then_confirm() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        assert_eq!(machine.state(), ConfirmationState::None);

        let pending = action(now);
        assert!(machine.begin(pending.clone()).is_none());
        assert_eq!(machine.state(), ConfirmationState::AwaitingConfirmation);

        assert_eq!(machine.confirm(now), ConfirmOutcome::Confirmed(pending));
        assert_eq!(machine.state(), ConfirmationState::None);
        assert_eq!(machine.last_transition().unwrap().to, ConfirmationState::Confirmed);
    }

    #[test]
    fn test_second_confirm_is_noop() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        machine.begin(action(now));

        assert!(matches!(machine.confirm(now), ConfirmOutcome::Confirmed(_)));
        assert_eq!(machine.confirm(now), ConfirmOutcome::NothingPending);
    }

    #[test]
    fn test_new_action_supersedes_old() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        let first = action(now);
        let second = action(now);

        machine.begin(first.clone());
        let superseded = machine.begin(second.clone());

        assert_eq!(superseded, Some(first));
        assert_eq!(machine.pending(), Some(&second));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        machine.begin(action(now));

        assert!(machine.check_expiry(now + Duration::seconds(10)).is_none());

        let later = now + Duration::seconds(DEFAULT_CONFIRMATION_WINDOW_SECS + 1);
        assert!(machine.check_expiry(later).is_some());
        assert_eq!(machine.state(), ConfirmationState::None);
        assert_eq!(machine.last_transition().unwrap().to, ConfirmationState::Expired);
    }

    #[test]
    fn test_confirm_after_expiry_never_executes() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        machine.begin(action(now));

        let later = now + Duration::seconds(DEFAULT_CONFIRMATION_WINDOW_SECS + 1);
        assert!(matches!(machine.confirm(later), ConfirmOutcome::Expired(_)));
        assert_eq!(machine.confirm(later), ConfirmOutcome::NothingPending);
    }

    #[test]
    fn test_cancel() {
        let now = Utc::now();
        let mut machine = ConfirmationStateMachine::new();
        assert!(machine.cancel(now).is_none());

        machine.begin(action(now));
        assert!(machine.cancel(now).is_some());
        assert_eq!(machine.confirm(now), ConfirmOutcome::NothingPending);
        assert_eq!(machine.last_transition().unwrap().to, ConfirmationState::Cancelled);
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let now = Utc::now();
        let action = new_pending_transfer(
            &SessionId::from("test:user"),
            details(5000),
            now,
            Duration::days(365_000),
        );
        assert_eq!(action.expires_at, now + Duration::seconds(MAX_CONFIRMATION_WINDOW_SECS));
    }

    #[test]
    fn test_idempotency_key_is_per_action() {
        let now = Utc::now();
        let a = action(now);
        let b = action(now);
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert_eq!(a.idempotency_key.len(), 64);
    }
}
