// In-memory PermissionStore

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use runweave_core::{PermissionRules, PermissionStore, Result};

/// In-memory per-user allow/deny lists. A single lock serializes writes,
/// making each `(user, pattern)` update atomic.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    rules: Mutex<HashMap<String, PermissionRules>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get_rules(&self, user_id: &str) -> Result<PermissionRules> {
        Ok(self.rules.lock().get(user_id).cloned().unwrap_or_default())
    }

    async fn add_allow(&self, user_id: &str, pattern: &str) -> Result<()> {
        let mut rules = self.rules.lock();
        let entry = rules.entry(user_id.to_string()).or_default();
        if !entry.allow.iter().any(|p| p == pattern) {
            entry.allow.push(pattern.to_string());
        }
        Ok(())
    }

    async fn add_deny(&self, user_id: &str, pattern: &str) -> Result<()> {
        let mut rules = self.rules.lock();
        let entry = rules.entry(user_id.to_string()).or_default();
        if !entry.deny.iter().any(|p| p == pattern) {
            entry.deny.push(pattern.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_deduplicate() {
        let store = InMemoryPermissionStore::new();
        store.add_allow("u1", "echo(**)").await.unwrap();
        store.add_allow("u1", "echo(**)").await.unwrap();
        store.add_deny("u1", "run_cmd(**)").await.unwrap();

        let rules = store.get_rules("u1").await.unwrap();
        assert_eq!(rules.allow, vec!["echo(**)"]);
        assert_eq!(rules.deny, vec!["run_cmd(**)"]);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = InMemoryPermissionStore::new();
        store.add_allow("u1", "echo(**)").await.unwrap();
        assert!(store.get_rules("u2").await.unwrap().allow.is_empty());
    }
}
