// Pure tool result cache
//
// Results of tools declared pure are cached per process, keyed by
// `(tool_name, canonicalized_arguments)`. A keyed async mutex gives
// single-writer-per-key semantics so concurrent identical calls execute
// the tool once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use runweave_contracts::ToolResult;

/// Per-process cache for pure tool results
#[derive(Default)]
pub struct ToolResultCache {
    entries: RwLock<HashMap<String, ToolResult>>,
    keyed: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ToolResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic cache key: tool name plus canonical (key-sorted,
    /// compact) argument JSON.
    pub fn key(tool_name: &str, args: &Value) -> String {
        format!("{tool_name}:{}", canonical_json(args))
    }

    pub fn get(&self, key: &str) -> Option<ToolResult> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: String, result: ToolResult) {
        self.entries.write().insert(key, result);
    }

    /// Acquire the per-key writer lock. Held across the check-execute-insert
    /// window for cache misses.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut keyed = self.keyed.lock();
            keyed
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Serialize with object keys sorted recursively, so semantically equal
/// argument maps produce identical keys.
fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for key in keys {
                    out.insert(key.clone(), canonicalize(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}
