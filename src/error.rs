//! Error types for the banking chat orchestrator

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {

    // =============================
    // Conversation Pipeline Errors
    // =============================

    /// Normalizer/classifier could not produce a usable entity set.
    /// Carries the clarifying question put to the user.
    #[error("Could not understand request: {0}")]
    ParseAmbiguous(String),

    /// More than one remembered recipient matched a name.
    /// Carries the choice prompt listing the matches.
    #[error("Recipient is ambiguous: {0}")]
    RecipientAmbiguous(String),

    /// Banking API or memory store unreachable.
    #[error("External service unavailable: {0}")]
    ExternalUnavailable(String),

    /// Explicit business-rule failure (insufficient funds, invalid account, ...).
    #[error("Rejected by bank: {0}")]
    ExternalRejected(String),

    /// Transfer was dispatched but its result is unknown.
    #[error("Transfer outcome unknown: {0}")]
    AmbiguousOutcome(String),

    // =============================
    // Infrastructure Errors
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl EngineError {
    /// Plain-text reply shown to the user when this error ends a turn.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ParseAmbiguous(question) => question.clone(),
            EngineError::RecipientAmbiguous(prompt) => prompt.clone(),
            EngineError::ExternalUnavailable(_) => {
                "I can't reach the bank right now. Please try again shortly.".to_string()
            }
            EngineError::ExternalRejected(reason) => {
                format!("The bank declined this request: {}", reason)
            }
            EngineError::AmbiguousOutcome(_) => {
                "I couldn't confirm whether that transfer went through. Please check your \
                 transaction history before trying again."
                    .to_string()
            }
            _ => "Something went wrong on my side. Please try again in a moment.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_never_empty() {
        let errors = vec![
            EngineError::ParseAmbiguous("two amounts".into()),
            EngineError::RecipientAmbiguous("mom".into()),
            EngineError::ExternalUnavailable("timeout".into()),
            EngineError::ExternalRejected("Insufficient funds".into()),
            EngineError::AmbiguousOutcome("timeout".into()),
            EngineError::DatabaseError("down".into()),
        ];

        for e in errors {
            assert!(!e.user_message().is_empty());
        }
    }

    #[test]
    fn test_ambiguity_carries_the_question() {
        let e = EngineError::ParseAmbiguous("Which amount should I send?".into());
        assert_eq!(e.user_message(), "Which amount should I send?");
        assert!(e.to_string().starts_with("Could not understand request"));
    }

    #[test]
    fn test_rejection_surfaces_reason() {
        let e = EngineError::ExternalRejected("Insufficient funds".into());
        assert!(e.user_message().contains("Insufficient funds"));
    }

    #[test]
    fn test_ambiguous_outcome_points_to_history() {
        let e = EngineError::AmbiguousOutcome("timeout".into());
        assert!(e.user_message().contains("history"));
    }
}
