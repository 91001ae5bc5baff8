// Permission manager
//
// Resource patterns have the form `tool_name(argument_pattern)` where the
// argument pattern supports glob-style wildcards: `*` matches within one
// path-ish segment, `**` matches across segments. A bare tool name is
// shorthand for `tool_name(**)`.
//
// Precedence: deny-match beats allow-match beats the tool's default policy.
// Tools with a default policy of `allow` skip the consent path but remain
// subject to explicit deny entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use runweave_contracts::{InteractionRequest, ToolPolicy};

use crate::error::Result;
use crate::traits::PermissionStore;

/// A user's stored allow/deny pattern lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionRules {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Outcome of a permission check
#[derive(Debug, Clone)]
pub enum PermissionDecision {
    Allow,
    Deny,
    NeedsConsent(InteractionRequest),
}

/// Checks tool calls against per-user rules and records consent decisions
#[derive(Clone)]
pub struct PermissionManager {
    store: Arc<dyn PermissionStore>,
}

impl PermissionManager {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Pure decision over the stored lists for `(tool, arguments, user)`
    pub async fn check(
        &self,
        tool_name: &str,
        default_policy: ToolPolicy,
        args: &Value,
        user_id: &str,
        tool_call_id: &str,
    ) -> Result<PermissionDecision> {
        let resource = resource_string(tool_name, args);
        let rules = self.store.get_rules(user_id).await?;

        if rules.deny.iter().any(|p| pattern_matches(p, &resource)) {
            return Ok(PermissionDecision::Deny);
        }
        if rules.allow.iter().any(|p| pattern_matches(p, &resource)) {
            return Ok(PermissionDecision::Allow);
        }
        if default_policy == ToolPolicy::Allow {
            return Ok(PermissionDecision::Allow);
        }
        Ok(PermissionDecision::NeedsConsent(
            InteractionRequest::confirm(resource, tool_call_id),
        ))
    }

    /// Record the user's consent decision for a resource
    pub async fn record_decision(
        &self,
        user_id: &str,
        resource: &str,
        allowed: bool,
    ) -> Result<()> {
        if allowed {
            self.store.add_allow(user_id, resource).await
        } else {
            self.store.add_deny(user_id, resource).await
        }
    }
}

/// Render a tool call as a resource string, e.g. `run_cmd(ls)`.
///
/// Argument values are taken in key-sorted order; scalars print bare,
/// nested values print as compact JSON.
pub fn resource_string(tool_name: &str, args: &Value) -> String {
    let rendered = match args {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.iter()
                .map(|k| render_value(&map[*k]))
                .collect::<Vec<_>>()
                .join(",")
        }
        Value::Null => String::new(),
        other => render_value(other),
    };
    format!("{tool_name}({rendered})")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Match a stored pattern against a resource string
pub fn pattern_matches(pattern: &str, resource: &str) -> bool {
    let pattern = if pattern.contains('(') {
        pattern.to_string()
    } else {
        format!("{pattern}(**)")
    };
    match compile_pattern(&pattern) {
        Some(re) => re.is_match(resource),
        None => false,
    }
}

fn compile_pattern(pattern: &str) -> Option<regex::Regex> {
    let mut out = String::with_capacity(pattern.len() * 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    regex::Regex::new(&out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        rules: Mutex<HashMap<String, PermissionRules>>,
    }

    #[async_trait]
    impl PermissionStore for MapStore {
        async fn get_rules(&self, user_id: &str) -> Result<PermissionRules> {
            Ok(self.rules.lock().get(user_id).cloned().unwrap_or_default())
        }

        async fn add_allow(&self, user_id: &str, pattern: &str) -> Result<()> {
            self.rules
                .lock()
                .entry(user_id.to_string())
                .or_default()
                .allow
                .push(pattern.to_string());
            Ok(())
        }

        async fn add_deny(&self, user_id: &str, pattern: &str) -> Result<()> {
            self.rules
                .lock()
                .entry(user_id.to_string())
                .or_default()
                .deny
                .push(pattern.to_string());
            Ok(())
        }
    }

    #[test]
    fn resource_string_sorts_keys() {
        let args = serde_json::json!({"b": "two", "a": 1});
        assert_eq!(resource_string("tool", &args), "tool(1,two)");
    }

    #[test]
    fn glob_star_stays_in_segment() {
        assert!(pattern_matches("read_file(/tmp/*)", "read_file(/tmp/a.txt)"));
        assert!(!pattern_matches("read_file(/tmp/*)", "read_file(/tmp/sub/a.txt)"));
        assert!(pattern_matches("read_file(/tmp/**)", "read_file(/tmp/sub/a.txt)"));
    }

    #[test]
    fn bare_tool_name_matches_any_arguments() {
        assert!(pattern_matches("echo", "echo(anything at all)"));
        assert!(!pattern_matches("echo", "other(x)"));
    }

    #[tokio::test]
    async fn deny_beats_allow() {
        let store = Arc::new(MapStore::default());
        store.add_allow("u1", "run_cmd(**)").await.unwrap();
        store.add_deny("u1", "run_cmd(rm *)").await.unwrap();
        let manager = PermissionManager::new(store);

        let allowed = manager
            .check(
                "run_cmd",
                ToolPolicy::RequiresConsent,
                &serde_json::json!({"cmd": "ls"}),
                "u1",
                "t1",
            )
            .await
            .unwrap();
        assert!(matches!(allowed, PermissionDecision::Allow));

        let denied = manager
            .check(
                "run_cmd",
                ToolPolicy::RequiresConsent,
                &serde_json::json!({"cmd": "rm -rf"}),
                "u1",
                "t2",
            )
            .await
            .unwrap();
        assert!(matches!(denied, PermissionDecision::Deny));
    }

    #[tokio::test]
    async fn no_rules_and_consent_policy_raises_request() {
        let manager = PermissionManager::new(Arc::new(MapStore::default()));
        let decision = manager
            .check(
                "run_cmd",
                ToolPolicy::RequiresConsent,
                &serde_json::json!({"cmd": "ls"}),
                "u1",
                "t1",
            )
            .await
            .unwrap();
        match decision {
            PermissionDecision::NeedsConsent(request) => {
                assert_eq!(request.resource, "run_cmd(ls)");
                assert_eq!(request.tool_call_id, "t1");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn allow_policy_bypasses_consent_but_not_deny() {
        let store = Arc::new(MapStore::default());
        store.add_deny("u1", "echo(secret)").await.unwrap();
        let manager = PermissionManager::new(store);

        let open = manager
            .check(
                "echo",
                ToolPolicy::Allow,
                &serde_json::json!({"text": "hi"}),
                "u1",
                "t1",
            )
            .await
            .unwrap();
        assert!(matches!(open, PermissionDecision::Allow));

        let blocked = manager
            .check(
                "echo",
                ToolPolicy::Allow,
                &serde_json::json!({"text": "secret"}),
                "u1",
                "t2",
            )
            .await
            .unwrap();
        assert!(matches!(blocked, PermissionDecision::Deny));
    }
}
