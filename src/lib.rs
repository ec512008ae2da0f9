//! Banking Chat Orchestrator
//!
//! A conversational banking transaction engine that:
//! - Turns noisy chat messages into typed intents and entities
//! - Resolves recipients from learned patterns, never guessing between several
//! - Stages every transfer as a pending action that needs an explicit YES
//! - Calls the bank's transfer endpoint at most once per confirmation
//! - Keeps an auditable record of every dispatched transfer
//!
//! TURN LOOP:
//! LOCK → LOAD → EXPIRE → NORMALIZE → CLASSIFY → ENRICH → ACT → RECORD → SAVE

pub mod agent;
pub mod api;
pub mod audit;
pub mod banking;
pub mod classifier;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod memory;
pub mod models;
pub mod normalizer;
pub mod state;
pub mod verification;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::Orchestrator;
pub use classifier::{Classification, IntentClassifier};
