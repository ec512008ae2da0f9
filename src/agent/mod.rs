//! Transaction orchestrator - one conversational turn per call
//!
//! LOCK → LOAD → EXPIRE → NORMALIZE → CLASSIFY → ENRICH → ACT → RECORD → SAVE
//!
//! Money only moves on a CONFIRMED transition, and the bank's transfer
//! endpoint is called once per confirmed action.

pub mod replies;


use crate::audit::{AuditOutcome, TransferAuditLog};
use crate::banking::{BankingApi, BankingError, TransferRequest, TransferStatus};
use crate::classifier::{Classification, ClarifyReason, IntentClassifier, SessionContext};
use crate::config::AgentConfig;
use crate::confirmation::{new_pending_transfer, ConfirmOutcome};
use crate::memory::{learn_transfer, MemoryNote, MemoryStore, RecipientMemoryResolver};
use crate::models::{
    mask_account, EntitySet, HistoryRange, Intent, Kobo, PendingAction, Response, ResponseKind,
    SessionId, TransferDetails,
};
use crate::normalizer::{normalize, NormalizedText};
use crate::state::{ConversationSession, SessionStore, Turn, TurnRole};
use crate::verification::{create_default_transfer_guard, TransferCheck, TransferGuard};
use crate::Result;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type SessionLock = Arc<Mutex<()>>;

/// Main orchestrator that coordinates every turn
pub struct Orchestrator {
    bank: Arc<dyn BankingApi>,
    sessions: Arc<dyn SessionStore>,
    resolver: RecipientMemoryResolver,
    classifier: IntentClassifier,
    guard: TransferGuard,
    audit_log: TransferAuditLog,
    confirmation_window: Duration,
    /// One lock per session; entries are dropped once nobody holds or waits on them
    session_locks: Mutex<HashMap<SessionId, SessionLock>>,
}

impl Orchestrator {
    pub fn new(
        bank: Arc<dyn BankingApi>,
        sessions: Arc<dyn SessionStore>,
        patterns: Arc<dyn MemoryStore>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            bank,
            sessions,
            resolver: RecipientMemoryResolver::new(patterns, config.name_match_tolerance),
            classifier: IntentClassifier::new(config.min_confidence),
            guard: create_default_transfer_guard(
                config.single_transfer_limit,
                config.daily_transfer_limit,
            ),
            audit_log: TransferAuditLog::new(),
            confirmation_window: config.confirmation_window,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn audit_log(&self) -> &TransferAuditLog {
        &self.audit_log
    }

    /// Handle one inbound message. Never fails: errors become a reply.
    pub async fn handle_message(&self, session_id: &SessionId, raw_text: &str) -> Response {
        let lock = self.acquire_session_lock(session_id).await;

        let response = {
            let _guard = lock.lock().await;
            match self.process_message(session_id, raw_text).await {
                Ok(response) => response,
                Err(error) => {
                    error!(session_id = %session_id, error = %error, "Turn failed before a reply was built");
                    Response::new(ResponseKind::Failure, Intent::Unknown, error.user_message())
                }
            }
        };

        self.release_session_lock(session_id, lock).await;
        response
    }

    /// Expire the session's pending action if its window has passed.
    pub async fn check_expiry(&self, session_id: &SessionId) -> Result<Option<PendingAction>> {
        let lock = self.acquire_session_lock(session_id).await;

        let result = {
            let _guard = lock.lock().await;
            self.expire_pending(session_id).await
        };

        self.release_session_lock(session_id, lock).await;
        result
    }

    async fn expire_pending(&self, session_id: &SessionId) -> Result<Option<PendingAction>> {
        let mut session = self.sessions.load(session_id).await?;
        let expired = session.confirmation.check_expiry(Utc::now());
        if expired.is_some() {
            self.sessions.save(&session).await?;
        }
        Ok(expired)
    }

    //
    // ========== Session locks ==========
    //

    async fn acquire_session_lock(&self, session_id: &SessionId) -> SessionLock {
        let mut locks = self.session_locks.lock().await;
        locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_session_lock(&self, session_id: &SessionId, lock: SessionLock) {
        let mut locks = self.session_locks.lock().await;
        // registry + this handle: nobody else holds or waits
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn session_lock_count(&self) -> usize {
        self.session_locks.lock().await.len()
    }

    //
    // ========== Turn pipeline ==========
    //

    async fn process_message(&self, session_id: &SessionId, raw_text: &str) -> Result<Response> {
        let mut session = self.sessions.load(session_id).await?;
        let expired = session.confirmation.check_expiry(Utc::now());

        let normalized = normalize(raw_text);
        let context = SessionContext {
            has_pending_action: session.has_pending_action(),
        };
        let classification = self.classifier.classify(&normalized, &context);
        let intent = classification.intent;

        info!(
            session_id = %session_id,
            intent = %intent,
            confidence = classification.confidence,
            clarification = ?classification.clarification,
            "Message classified"
        );

        session.add_turn(Turn::new(TurnRole::User, raw_text, Some(intent)));

        let mut response = match self.route(&mut session, &normalized, classification).await {
            Ok(response) => response,
            Err(error) => {
                warn!(session_id = %session_id, intent = %intent, error = %error, "Turn failed");
                Response::new(ResponseKind::Failure, intent, error.user_message())
            }
        };

        if let Some(action) = expired {
            response = if response.kind == ResponseKind::NoOp {
                replies::expired(&action, response.intent)
            } else {
                Response {
                    text: format!("{}{}", replies::expiry_notice(&action), response.text),
                    ..response
                }
            };
        }

        session.add_turn(Turn::new(TurnRole::Agent, response.text.clone(), Some(intent)));
        self.sessions.save(&session).await?;

        debug!(session_id = %session_id, kind = ?response.kind, "Turn complete");
        Ok(response)
    }

    async fn route(
        &self,
        session: &mut ConversationSession,
        normalized: &NormalizedText,
        classification: Classification,
    ) -> Result<Response> {
        let user_id = session.session_id.user_id().to_string();

        match classification.intent {
            Intent::Confirm => self.execute_confirmed(session).await,
            Intent::Cancel => Ok(match session.confirmation.cancel(Utc::now()) {
                Some(action) => {
                    info!(action_id = %action.action_id, "Pending action cancelled by user");
                    replies::cancelled(&action)
                }
                None => replies::nothing_pending(),
            }),
            Intent::Transfer => self.prepare_transfer(session, normalized, classification).await,
            other => {
                if let Some(pending) = session.confirmation.pending() {
                    return Ok(replies::still_pending(pending, other));
                }
                match other {
                    Intent::BalanceCheck => {
                        let balance = self
                            .bank
                            .get_balance(&user_id)
                            .await
                            .map_err(BankingError::into_read_error)?;
                        Ok(replies::balance(&balance))
                    }
                    Intent::TransactionHistory => {
                        let range = classification
                            .entities
                            .history_range
                            .unwrap_or(HistoryRange::Last7Days);
                        let transactions = self
                            .bank
                            .get_history(&user_id, range.to_dates(Utc::now().date_naive()))
                            .await
                            .map_err(BankingError::into_read_error)?;
                        Ok(replies::history(range, &transactions))
                    }
                    Intent::AccountResolve => self.resolve_account(classification.entities).await,
                    Intent::Help => Ok(replies::help()),
                    _ => Ok(match classification.clarification {
                        Some(ClarifyReason::NothingPending) => replies::nothing_pending(),
                        _ => replies::not_understood(),
                    }),
                }
            }
        }
    }

    async fn resolve_account(&self, mut entities: EntitySet) -> Result<Response> {
        let Some(account_number) = entities.account_number.clone() else {
            return Ok(replies::not_understood());
        };
        if let Some(response) = self.fill_bank(&mut entities).await? {
            return Ok(Response { intent: Intent::AccountResolve, ..response });
        }
        let (bank_code, bank) = bank_of(&entities);

        match self.bank.resolve_account(&account_number, &bank_code).await {
            Ok(account) => Ok(replies::account_resolved(&account, &bank)),
            Err(BankingError::NotFound) | Err(BankingError::InvalidAccount(_)) => Ok(
                replies::account_not_found(Intent::AccountResolve, &account_number, &bank),
            ),
            Err(error) => Err(error.into_read_error()),
        }
    }

    /// Fill the bank code from the bank's directory when the alias table
    /// did not know it. Returns a clarification if the bank is still unknown.
    async fn fill_bank(&self, entities: &mut EntitySet) -> Result<Option<Response>> {
        if entities.resolved_bank_code.is_some() {
            return Ok(None);
        }
        let Some(alias) = entities.bank_alias.clone() else {
            let account = entities.account_number.clone().unwrap_or_default();
            return Ok(Some(replies::ask_bank(&account)));
        };

        let found = self
            .bank
            .find_bank(&alias)
            .await
            .map_err(BankingError::into_read_error)?;
        match found {
            Some(info) => {
                debug!(alias = %alias, code = %info.code, "Bank found in directory");
                entities.resolved_bank_code = Some(info.code);
                entities.resolved_bank_name = Some(info.name);
                Ok(None)
            }
            None => Ok(Some(replies::unknown_bank(&alias))),
        }
    }

    //
    // ========== Transfer preparation ==========
    //

    /// Turn a transfer request into a pending action, or ask for what is missing.
    async fn prepare_transfer(
        &self,
        session: &mut ConversationSession,
        normalized: &NormalizedText,
        classification: Classification,
    ) -> Result<Response> {
        let response = self.build_pending(session, normalized, classification).await?;

        // a clarification leaves any earlier pending action in place
        if response.kind != ResponseKind::ConfirmationPrompt {
            if let Some(pending) = session.confirmation.pending() {
                return Ok(Response {
                    text: format!(
                        "{} (Your earlier transfer of {} is still waiting for YES or NO.)",
                        response.text,
                        pending.summary()
                    ),
                    ..response
                });
            }
        }
        Ok(response)
    }

    async fn build_pending(
        &self,
        session: &mut ConversationSession,
        normalized: &NormalizedText,
        classification: Classification,
    ) -> Result<Response> {
        match classification.clarification {
            Some(ClarifyReason::AmountAmbiguous) => {
                let amounts: Vec<Kobo> = normalized.ignored_amounts.iter().map(|a| a.kobo).collect();
                return Ok(replies::ask_which_amount(&amounts));
            }
            Some(ClarifyReason::LowConfidence) => return Ok(replies::rephrase_transfer()),
            _ => {}
        }

        let user_id = session.session_id.user_id().to_string();
        let nickname = classification.entities.recipient_name.clone();
        let enrichment = self.resolver.enrich(classification.entities, &user_id).await?;
        let mut entities = enrichment.entities;

        let suggestion = match enrichment.note {
            MemoryNote::Ambiguous { name, candidates } => {
                return Ok(replies::choose_recipient(&name, &candidates));
            }
            MemoryNote::NoMatch { name } => return Ok(replies::unknown_recipient(&name)),
            MemoryNote::Resolved { suggested_amount, .. } => suggested_amount,
            MemoryNote::SuggestAmount { amount } => Some(amount),
            MemoryNote::Unchanged => None,
        };

        let Some(account_number) = entities.account_number.clone() else {
            return Ok(replies::ask_recipient());
        };
        if let Some(response) = self.fill_bank(&mut entities).await? {
            return Ok(response);
        }
        let (bank_code, bank) = bank_of(&entities);

        let Some(amount) = entities.amount else {
            let recipient = entities
                .resolved_account_name
                .clone()
                .or_else(|| nickname.clone())
                .unwrap_or_else(|| mask_account(&account_number));
            return Ok(replies::ask_amount(&recipient, suggestion));
        };

        let mut details = TransferDetails {
            amount,
            account_number: account_number.clone(),
            bank_code: bank_code.clone(),
            bank_name: bank.clone(),
            account_name: entities.resolved_account_name.clone().unwrap_or_default(),
            nickname,
        };

        let sent_today = self
            .audit_log
            .sent_today(&session.session_id, Utc::now().date_naive())
            .await;
        let verdict = self.guard.verify(&TransferCheck {
            details: &details,
            sent_today,
        });
        if !verdict.approved {
            warn!(
                session_id = %session.session_id,
                failed = ?verdict.failed_rules,
                "Transfer refused by guard"
            );
            return Ok(replies::guard_refused(verdict.reason().unwrap_or("not allowed")));
        }

        let account = match self.bank.resolve_account(&account_number, &bank_code).await {
            Ok(account) => account,
            Err(BankingError::NotFound) | Err(BankingError::InvalidAccount(_)) => {
                return Ok(replies::account_not_found(Intent::Transfer, &account_number, &bank));
            }
            Err(error) => return Err(error.into_read_error()),
        };
        details.account_name = account.account_name;

        let action = new_pending_transfer(
            &session.session_id,
            details,
            Utc::now(),
            self.confirmation_window,
        );
        info!(
            session_id = %session.session_id,
            action_id = %action.action_id,
            amount = action.details.amount.value(),
            bank_code = %action.details.bank_code,
            "Pending transfer created"
        );

        let prompt_action = action.clone();
        let superseded = session.confirmation.begin(action);
        Ok(replies::confirmation_prompt(&prompt_action, superseded.as_ref()))
    }

    //
    // ========== Execution ==========
    //

    /// Run the confirmed action. The pending action is cleared and persisted
    /// before the bank is called.
    async fn execute_confirmed(&self, session: &mut ConversationSession) -> Result<Response> {
        let action = match session.confirmation.confirm(Utc::now()) {
            ConfirmOutcome::Confirmed(action) => action,
            ConfirmOutcome::Expired(action) => return Ok(replies::expired(&action, Intent::Confirm)),
            ConfirmOutcome::NothingPending => return Ok(replies::nothing_pending()),
        };

        self.sessions.save(session).await?;
        self.audit_log.record_dispatch(&session.session_id, &action).await?;

        let request = TransferRequest {
            amount: action.details.amount,
            account_number: action.details.account_number.clone(),
            bank_code: action.details.bank_code.clone(),
            account_name: action.details.account_name.clone(),
            idempotency_key: action.idempotency_key.clone(),
            narration: format!("Transfer to {}", action.details.account_name),
        };

        info!(
            session_id = %session.session_id,
            action_id = %action.action_id,
            amount = request.amount.value(),
            "Dispatching transfer"
        );

        let (outcome, response) = match self.bank.transfer(&request).await {
            Ok(receipt) => match receipt.status {
                TransferStatus::Success => {
                    self.learn(session, &action).await;
                    (
                        AuditOutcome::Succeeded { reference: receipt.reference.clone() },
                        replies::transfer_succeeded(&action, &receipt),
                    )
                }
                TransferStatus::Pending => (
                    AuditOutcome::Processing { reference: receipt.reference.clone() },
                    replies::transfer_processing(&action, &receipt),
                ),
                TransferStatus::Failed => {
                    let reason = receipt
                        .message
                        .clone()
                        .unwrap_or_else(|| "declined by the bank".to_string());
                    (
                        AuditOutcome::Failed { reason: reason.clone() },
                        replies::transfer_failed(&reason),
                    )
                }
            },
            Err(BankingError::Timeout(detail)) => {
                warn!(action_id = %action.action_id, detail = %detail, "Transfer outcome unknown");
                (
                    AuditOutcome::Unknown { reason: detail },
                    replies::transfer_outcome_unknown(&action),
                )
            }
            Err(error) => {
                warn!(action_id = %action.action_id, error = %error, "Transfer failed");
                let reason = error.to_string();
                let reply = Response::new(
                    ResponseKind::Failure,
                    Intent::Confirm,
                    error.into_transfer_error().user_message(),
                );
                (AuditOutcome::Failed { reason }, reply)
            }
        };

        if let Err(error) = self.audit_log.record_outcome(action.action_id, outcome).await {
            error!(action_id = %action.action_id, error = %error, "Failed to record transfer outcome");
        }

        Ok(response)
    }

    /// Learning failures are logged; they never change the transfer's outcome.
    async fn learn(&self, session: &ConversationSession, action: &PendingAction) {
        let user_id = session.session_id.user_id();
        match learn_transfer(self.resolver.store().as_ref(), user_id, &action.details, Utc::now()).await {
            Ok(pattern) => debug!(
                user_id = %user_id,
                use_count = pattern.use_count,
                "Recipient pattern updated"
            ),
            Err(error) => warn!(user_id = %user_id, error = %error, "Failed to update recipient pattern"),
        }
    }
}

/// (code, display name) once the bank is known
fn bank_of(entities: &EntitySet) -> (String, String) {
    let code = entities.resolved_bank_code.clone().unwrap_or_default();
    let name = entities
        .resolved_bank_name
        .clone()
        .or_else(|| entities.bank_alias.clone())
        .unwrap_or_else(|| code.clone());
    (code, name)
}
