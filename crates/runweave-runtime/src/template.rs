// Workflow template rendering
//
// The template language is deliberately small: `{key}` interpolation over
// the stage environment plus a handful of pure comparisons for stage
// conditions. Unknown keys render to the empty string.

use std::collections::BTreeMap;

/// Render `{key}` placeholders against the environment
pub fn render(template: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        // Escaped brace
        if chars.peek() == Some(&'{') {
            chars.next();
            out.push('{');
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            key.push(inner);
        }
        if closed {
            if let Some(value) = env.get(key.trim()) {
                out.push_str(value);
            }
        } else {
            // Unterminated placeholder: emit literally
            out.push('{');
            out.push_str(&key);
        }
    }
    out
}

/// Evaluate a stage condition. Supported forms, operands rendered first:
/// `a == b`, `a != b`, `a contains b`, and bare truthiness (non-empty,
/// not "false", not "0").
pub fn eval_condition(expr: &str, env: &BTreeMap<String, String>) -> bool {
    let expr = expr.trim();

    if let Some((lhs, rhs)) = split_once_operator(expr, "==") {
        return operand(lhs, env) == operand(rhs, env);
    }
    if let Some((lhs, rhs)) = split_once_operator(expr, "!=") {
        return operand(lhs, env) != operand(rhs, env);
    }
    if let Some((lhs, rhs)) = split_once_operator(expr, " contains ") {
        return operand(lhs, env).contains(&operand(rhs, env));
    }

    truthy(&operand(expr, env))
}

fn split_once_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    expr.split_once(op)
}

fn operand(raw: &str, env: &BTreeMap<String, String>) -> String {
    let rendered = render(raw.trim(), env);
    let rendered = rendered.trim();
    let unquoted = rendered
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| {
            rendered
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
        });
    unquoted.unwrap_or(rendered).to_string()
}

fn truthy(value: &str) -> bool {
    !value.is_empty() && value != "false" && value != "0"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_known_keys() {
        let env = env(&[("input", "topic X"), ("a.output", "alpha")]);
        assert_eq!(
            render("previous said: {a.output} about {input}", &env),
            "previous said: alpha about topic X"
        );
    }

    #[test]
    fn unknown_keys_render_empty() {
        assert_eq!(render("[{missing}]", &env(&[])), "[]");
    }

    #[test]
    fn escaped_brace_is_literal() {
        assert_eq!(render("{{input}", &env(&[("input", "x")])), "{input}");
    }

    #[test]
    fn equality_conditions() {
        let env = env(&[("a.output", "done")]);
        assert!(eval_condition("{a.output} == 'done'", &env));
        assert!(eval_condition("{a.output} != 'pending'", &env));
        assert!(!eval_condition("{a.output} == 'pending'", &env));
    }

    #[test]
    fn contains_condition() {
        let env = env(&[("a.output", "all checks passed")]);
        assert!(eval_condition("{a.output} contains 'passed'", &env));
        assert!(!eval_condition("{a.output} contains 'failed'", &env));
    }

    #[test]
    fn bare_truthiness() {
        assert!(eval_condition("{x}", &env(&[("x", "yes")])));
        assert!(!eval_condition("{x}", &env(&[("x", "")])));
        assert!(!eval_condition("{x}", &env(&[("x", "false")])));
        assert!(!eval_condition("{missing}", &env(&[])));
    }
}
