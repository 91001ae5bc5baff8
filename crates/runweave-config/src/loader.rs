// Spec loading
//
// Recursively discovers YAML documents under a config root, substitutes
// `{{ env.VAR | default("...") }}` templates, and parses each file into a
// ComponentSpec. Missing environment variables render to the empty string:
// configs with optional integrations load fine and fail late at component
// build, not at parse.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::ConfigResult;
use crate::spec::ComponentSpec;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*(?:\|\s*default\(\s*"([^"]*)"\s*\)\s*)?\}\}"#,
        )
        .expect("env substitution pattern is valid")
    })
}

/// Replace env templates in a raw spec string. Unset variables fall back to
/// the declared default, or the empty string.
pub fn substitute_env(raw: &str) -> String {
    env_pattern()
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            }
        })
        .into_owned()
}

fn is_spec_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Walk `root` for spec files and parse them. Files that fail to parse or
/// validate are skipped with a logged error; the rest load.
pub fn load_dir(root: impl AsRef<Path>) -> ConfigResult<Vec<ComponentSpec>> {
    let root = root.as_ref();
    let mut specs = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable config entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_spec_file(entry.path()) {
            continue;
        }

        let location = entry.path().display().to_string();
        let raw = match std::fs::read_to_string(entry.path()) {
            Ok(raw) => raw,
            Err(err) => {
                error!(path = %location, error = %err, "failed to read spec file");
                continue;
            }
        };
        let substituted = substitute_env(&raw);

        let value: serde_yaml::Value = match serde_yaml::from_str(&substituted) {
            Ok(value) => value,
            Err(err) => {
                error!(path = %location, error = %err, "failed to parse spec file");
                continue;
            }
        };

        match ComponentSpec::from_value(value, &location) {
            Ok(spec) => {
                if !spec.enabled {
                    info!(path = %location, name = %spec.name, "skipping disabled component");
                    continue;
                }
                specs.push(spec);
            }
            Err(err) => {
                error!(path = %location, error = %err, "invalid component spec");
            }
        }
    }

    info!(root = %root.display(), count = specs.len(), "loaded component specs");
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_set_variables() {
        std::env::set_var("RUNWEAVE_TEST_SUB", "abc123");
        let out = substitute_env("key: {{ env.RUNWEAVE_TEST_SUB }}");
        assert_eq!(out, "key: abc123");
    }

    #[test]
    fn missing_variable_uses_default() {
        std::env::remove_var("RUNWEAVE_TEST_MISSING");
        let out = substitute_env(r#"key: {{ env.RUNWEAVE_TEST_MISSING | default("fallback") }}"#);
        assert_eq!(out, "key: fallback");
    }

    #[test]
    fn missing_variable_without_default_is_empty() {
        std::env::remove_var("RUNWEAVE_TEST_MISSING2");
        let out = substitute_env("key: '{{ env.RUNWEAVE_TEST_MISSING2 }}'");
        assert_eq!(out, "key: ''");
    }

    #[test]
    fn load_dir_discovers_recursively_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(
            dir.path().join("model.yaml"),
            "type: model\nname: m1\nprovider: scripted\n",
        )
        .unwrap();
        std::fs::write(
            nested.join("agent.yml"),
            "type: agent\nname: a1\nmodel: m1\n",
        )
        .unwrap();
        std::fs::write(nested.join("broken.yaml"), "type: [not\n").unwrap();
        std::fs::write(
            nested.join("disabled.yaml"),
            "type: tool\nname: t1\nenabled: false\n",
        )
        .unwrap();
        std::fs::write(nested.join("notes.txt"), "ignored").unwrap();

        let specs = load_dir(dir.path()).unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"m1"));
        assert!(names.contains(&"a1"));
    }
}
