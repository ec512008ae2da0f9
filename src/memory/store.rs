//! In-memory recipient pattern store

use super::MemoryStore;
use crate::models::RecipientPattern;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Patterns keyed by user id
pub struct InMemoryPatternStore {
    patterns: Arc<RwLock<HashMap<String, Vec<RecipientPattern>>>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self {
            patterns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed patterns directly (fixtures, imports)
    pub async fn with_patterns(patterns: Vec<RecipientPattern>) -> Self {
        let store = Self::new();
        for pattern in patterns {
            let user_id = pattern.user_id.clone();
            // in-memory upsert cannot fail
            let _ = store.upsert_pattern(&user_id, pattern).await;
        }
        store
    }
}

impl Default for InMemoryPatternStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryPatternStore {
    async fn get_patterns(&self, user_id: &str) -> Result<Vec<RecipientPattern>> {
        let patterns = self.patterns.read().await;
        Ok(patterns.get(user_id).cloned().unwrap_or_default())
    }

    async fn upsert_pattern(&self, user_id: &str, pattern: RecipientPattern) -> Result<()> {
        let mut patterns = self.patterns.write().await;
        let owned = patterns.entry(user_id.to_string()).or_insert_with(Vec::new);

        match owned.iter_mut().find(|existing| existing.same_recipient(&pattern)) {
            Some(existing) => *existing = pattern,
            None => owned.push(pattern),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_same_recipient() {
        let store = InMemoryPatternStore::new();
        let mut pattern = RecipientPattern::new("u1", "0123456789", "058");
        store.upsert_pattern("u1", pattern.clone()).await.unwrap();

        pattern.use_count = 7;
        store.upsert_pattern("u1", pattern).await.unwrap();

        let other_bank = RecipientPattern::new("u1", "0123456789", "044");
        store.upsert_pattern("u1", other_bank).await.unwrap();

        let patterns = store.get_patterns("u1").await.unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].use_count, 7);
    }

    #[test]
    fn test_patterns_are_per_user() {
        let store = tokio_test::block_on(InMemoryPatternStore::with_patterns(vec![
            RecipientPattern::new("u1", "0123456789", "058"),
            RecipientPattern::new("u2", "1234567890", "044"),
        ]));

        let u1 = tokio_test::block_on(store.get_patterns("u1")).unwrap();
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].recipient_identifier, "0123456789");
        assert!(tokio_test::block_on(store.get_patterns("u3")).unwrap().is_empty());
    }
}
