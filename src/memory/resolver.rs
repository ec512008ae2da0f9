//! Recipient Memory Resolver
//!
//! Fills gaps in an entity set from the user's learned patterns. It never
//! picks between several candidates and never applies an amount on its own;
//! a typical amount is only ever offered as a suggestion.

use super::MemoryStore;
use crate::models::{EntitySet, Kobo, RecipientPattern};
use crate::normalizer::bank_name;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_NAME_MATCH_TOLERANCE: usize = 1;

/// Names shorter than this are only matched exactly
const MIN_FUZZY_NAME_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "note", rename_all = "snake_case")]
pub enum MemoryNote {
    /// Nothing to do
    Unchanged,
    /// One pattern filled in the recipient
    Resolved {
        pattern: RecipientPattern,
        suggested_amount: Option<Kobo>,
    },
    /// Recipient already complete; amount missing
    SuggestAmount { amount: Kobo },
    NoMatch { name: String },
    Ambiguous {
        name: String,
        candidates: Vec<RecipientPattern>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub entities: EntitySet,
    pub note: MemoryNote,
}

pub struct RecipientMemoryResolver {
    store: Arc<dyn MemoryStore>,
    tolerance: usize,
}

impl RecipientMemoryResolver {
    pub fn new(store: Arc<dyn MemoryStore>, tolerance: usize) -> Self {
        Self { store, tolerance }
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    pub async fn enrich(&self, mut entities: EntitySet, user_id: &str) -> Result<Enrichment> {
        // recipient given by name only
        if entities.account_number.is_none() {
            let Some(name) = entities.recipient_name.clone() else {
                return Ok(Enrichment { entities, note: MemoryNote::Unchanged });
            };

            let patterns = self.store.get_patterns(user_id).await?;
            let mut matches = match_name(&name, &patterns, self.tolerance);
            debug!(user_id = %user_id, name = %name, matches = matches.len(), "Recipient name lookup");

            let note = match matches.len() {
                0 => MemoryNote::NoMatch { name },
                1 => {
                    let pattern = matches.remove(0);
                    apply_pattern(&mut entities, &pattern);
                    let suggested_amount = if entities.amount.is_none() {
                        pattern.typical_amount()
                    } else {
                        None
                    };
                    MemoryNote::Resolved { pattern, suggested_amount }
                }
                _ => MemoryNote::Ambiguous { name, candidates: matches },
            };
            return Ok(Enrichment { entities, note });
        }

        // account known, bank missing: one remembered bank for that account fills it
        if entities.resolved_bank_code.is_none() && entities.bank_alias.is_none() {
            let patterns = self.store.get_patterns(user_id).await?;
            let mut same_account: Vec<RecipientPattern> = patterns
                .into_iter()
                .filter(|p| Some(&p.recipient_identifier) == entities.account_number.as_ref())
                .collect();

            if same_account.len() == 1 {
                let pattern = same_account.remove(0);
                apply_pattern(&mut entities, &pattern);
                let suggested_amount = if entities.amount.is_none() {
                    pattern.typical_amount()
                } else {
                    None
                };
                return Ok(Enrichment {
                    entities,
                    note: MemoryNote::Resolved { pattern, suggested_amount },
                });
            }
            return Ok(Enrichment { entities, note: MemoryNote::Unchanged });
        }

        // complete recipient, amount missing: offer the usual amount
        if entities.recipient_complete() && entities.amount.is_none() {
            let patterns = self.store.get_patterns(user_id).await?;
            let typical = patterns
                .iter()
                .find(|p| {
                    Some(&p.recipient_identifier) == entities.account_number.as_ref()
                        && Some(&p.bank_code) == entities.resolved_bank_code.as_ref()
                })
                .and_then(RecipientPattern::typical_amount);

            if let Some(amount) = typical {
                return Ok(Enrichment { entities, note: MemoryNote::SuggestAmount { amount } });
            }
        }

        Ok(Enrichment { entities, note: MemoryNote::Unchanged })
    }
}

fn apply_pattern(entities: &mut EntitySet, pattern: &RecipientPattern) {
    entities.account_number = Some(pattern.recipient_identifier.clone());
    entities.resolved_bank_code = Some(pattern.bank_code.clone());
    entities.resolved_bank_name = bank_name(&pattern.bank_code).map(str::to_string);
    entities.resolved_account_name = pattern.account_name.clone();
}

/// Patterns whose account name, name words or nicknames match `name`.
/// Exact matches shadow fuzzy ones.
fn match_name(name: &str, patterns: &[RecipientPattern], tolerance: usize) -> Vec<RecipientPattern> {
    let query = name.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let exact: Vec<RecipientPattern> = patterns
        .iter()
        .filter(|p| pattern_names(p).iter().any(|candidate| *candidate == query))
        .cloned()
        .collect();
    if !exact.is_empty() || query.chars().count() < MIN_FUZZY_NAME_LEN || tolerance == 0 {
        return exact;
    }

    patterns
        .iter()
        .filter(|p| {
            pattern_names(p)
                .iter()
                .any(|candidate| levenshtein(candidate, &query) <= tolerance)
        })
        .cloned()
        .collect()
}

fn pattern_names(pattern: &RecipientPattern) -> Vec<String> {
    let mut names: Vec<String> = pattern.nicknames.iter().map(|n| n.to_lowercase()).collect();
    if let Some(account_name) = &pattern.account_name {
        let account_name = account_name.to_lowercase();
        names.extend(account_name.split_whitespace().map(str::to_string));
        names.push(account_name);
    }
    names
}

/// Edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
