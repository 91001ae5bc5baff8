// Context builder
//
// Reconstructs the LLM-visible message list from a session's persisted
// steps. The projection never includes `content_for_user`; assistant steps
// that requested tools must be immediately followed by all of their tool
// steps, and truncation keeps whole assistant/tool groups.

use runweave_contracts::{Step, StepRole};

use crate::error::{CoreError, Result};
use crate::llm::{LlmMessage, LlmRole};

/// Options controlling the projection
#[derive(Debug, Clone, Default)]
pub struct ContextBuildOptions {
    /// Project persisted reasoning content into assistant messages
    pub include_reasoning: bool,

    /// Keep only the last N steps, without splitting a group
    pub max_steps: Option<usize>,
}

/// Project one step into its LLM message shape
pub fn step_to_llm_message(step: &Step, include_reasoning: bool) -> LlmMessage {
    let content = step.content.clone().unwrap_or_default();
    match step.role {
        StepRole::System => LlmMessage::system(content),
        StepRole::User => LlmMessage::user(content),
        StepRole::Assistant => {
            let mut msg =
                LlmMessage::assistant_with_tools(content, step.tool_calls().to_vec());
            if include_reasoning {
                msg.reasoning_content = step.reasoning_content.clone();
            }
            msg
        }
        StepRole::Tool => LlmMessage::tool(
            step.tool_call_id.clone().unwrap_or_default(),
            step.name.clone().unwrap_or_default(),
            content,
        ),
    }
}

/// Build the message list for a model call: system prompt first (when
/// present), then each step's projection in sequence order.
pub fn build_context(
    system_prompt: Option<&str>,
    steps: &[Step],
    options: &ContextBuildOptions,
) -> Result<Vec<LlmMessage>> {
    let groups = group_steps(steps)?;
    let selected = truncate_groups(&groups, options.max_steps);

    let mut messages = Vec::new();
    if let Some(prompt) = system_prompt {
        if !prompt.is_empty() {
            messages.push(LlmMessage::system(prompt));
        }
    }
    for group in selected {
        for step in group {
            messages.push(step_to_llm_message(step, options.include_reasoning));
        }
    }
    Ok(messages)
}

/// Partition steps into indivisible groups: an assistant step with tool
/// calls plus all of its tool steps, or a single step otherwise. Rejects
/// projections with gaps or orphaned tool steps.
fn group_steps(steps: &[Step]) -> Result<Vec<Vec<&Step>>> {
    let mut groups: Vec<Vec<&Step>> = Vec::new();
    let mut index = 0;

    while index < steps.len() {
        let step = &steps[index];
        match step.role {
            StepRole::Tool => {
                return Err(CoreError::Projection(format!(
                    "tool step at sequence {} has no preceding assistant step",
                    step.sequence
                )));
            }
            StepRole::Assistant if step.has_tool_calls() => {
                let mut pending: Vec<String> =
                    step.tool_calls().iter().map(|tc| tc.id.clone()).collect();
                let mut group = vec![step];
                index += 1;

                while !pending.is_empty() {
                    let Some(next) = steps.get(index) else {
                        return Err(CoreError::MissingToolResult {
                            step_id: step.id,
                            tool_call_id: pending.remove(0),
                        });
                    };
                    if next.role != StepRole::Tool {
                        return Err(CoreError::MissingToolResult {
                            step_id: step.id,
                            tool_call_id: pending.remove(0),
                        });
                    }
                    let call_id = next.tool_call_id.clone().unwrap_or_default();
                    let Some(position) = pending.iter().position(|id| *id == call_id) else {
                        return Err(CoreError::Projection(format!(
                            "tool step at sequence {} answers unknown call '{call_id}'",
                            next.sequence
                        )));
                    };
                    pending.remove(position);
                    group.push(next);
                    index += 1;
                }
                groups.push(group);
            }
            _ => {
                groups.push(vec![step]);
                index += 1;
            }
        }
    }
    Ok(groups)
}

/// Keep the last groups whose combined step count fits `max_steps`. The
/// newest group is always kept, even when it alone exceeds the limit.
fn truncate_groups<'a>(
    groups: &'a [Vec<&'a Step>],
    max_steps: Option<usize>,
) -> &'a [Vec<&'a Step>] {
    let Some(limit) = max_steps else {
        return groups;
    };
    let mut kept = 0usize;
    let mut start = groups.len();
    for (index, group) in groups.iter().enumerate().rev() {
        if kept + group.len() > limit && start < groups.len() {
            break;
        }
        kept += group.len();
        start = index;
        if kept >= limit {
            break;
        }
    }
    &groups[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use runweave_contracts::ToolCall;
    use uuid::Uuid;

    fn user(seq: u64) -> Step {
        Step::user(Uuid::nil(), Uuid::nil(), format!("u{seq}")).with_sequence(seq)
    }

    fn assistant(seq: u64) -> Step {
        Step::assistant(Uuid::nil(), Uuid::nil(), format!("a{seq}"), vec![]).with_sequence(seq)
    }

    fn assistant_with_call(seq: u64, call_id: &str) -> Step {
        Step::assistant(
            Uuid::nil(),
            Uuid::nil(),
            "",
            vec![ToolCall::new(call_id, "echo", "{}")],
        )
        .with_sequence(seq)
    }

    fn tool(seq: u64, call_id: &str) -> Step {
        Step::tool(Uuid::nil(), Uuid::nil(), call_id, "echo", "out").with_sequence(seq)
    }

    #[test]
    fn system_prompt_comes_first() {
        let steps = vec![user(1), assistant(2)];
        let messages =
            build_context(Some("be terse"), &steps, &ContextBuildOptions::default()).unwrap();
        assert_eq!(messages[0].role, LlmRole::System);
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn tool_group_projects_in_order() {
        let steps = vec![user(1), assistant_with_call(2, "t1"), tool(3, "t1"), assistant(4)];
        let messages = build_context(None, &steps, &ContextBuildOptions::default()).unwrap();
        let roles: Vec<LlmRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![LlmRole::User, LlmRole::Assistant, LlmRole::Tool, LlmRole::Assistant]
        );
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("t1"));
        assert_eq!(messages[2].name.as_deref(), Some("echo"));
    }

    #[test]
    fn gap_between_assistant_and_tool_is_rejected() {
        let steps = vec![assistant_with_call(1, "t1"), user(2), tool(3, "t1")];
        let err = build_context(None, &steps, &ContextBuildOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::MissingToolResult { .. }));
    }

    #[test]
    fn orphan_tool_step_is_rejected() {
        let steps = vec![user(1), tool(2, "t1")];
        assert!(build_context(None, &steps, &ContextBuildOptions::default()).is_err());
    }

    #[test]
    fn truncation_does_not_split_groups() {
        let steps = vec![
            user(1),
            assistant_with_call(2, "t1"),
            tool(3, "t1"),
            user(4),
            assistant(5),
        ];
        let options = ContextBuildOptions {
            include_reasoning: false,
            max_steps: Some(3),
        };
        let messages = build_context(None, &steps, &options).unwrap();
        // The last three steps fit without splitting: tool group excluded
        let roles: Vec<LlmRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![LlmRole::User, LlmRole::Assistant]);
    }

    #[test]
    fn newest_oversized_group_is_kept() {
        let steps = vec![user(1), assistant_with_call(2, "t1"), tool(3, "t1")];
        let options = ContextBuildOptions {
            include_reasoning: false,
            max_steps: Some(1),
        };
        let messages = build_context(None, &steps, &options).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, LlmRole::Assistant);
    }

    #[test]
    fn content_for_user_is_never_projected() {
        let step = Step::tool(Uuid::nil(), Uuid::nil(), "t1", "echo", "model surface")
            .with_content_for_user("user surface")
            .with_sequence(1);
        let msg = step_to_llm_message(&step, false);
        assert_eq!(msg.content, "model surface");
    }

    #[test]
    fn reasoning_projection_is_opt_in() {
        let step = Step::assistant(Uuid::nil(), Uuid::nil(), "answer", vec![])
            .with_reasoning("chain")
            .with_sequence(1);
        assert!(step_to_llm_message(&step, false).reasoning_content.is_none());
        assert_eq!(
            step_to_llm_message(&step, true).reasoning_content.as_deref(),
            Some("chain")
        );
    }
}
