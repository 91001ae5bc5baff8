// Tool executor
//
// Resolves a requested tool by name, parses arguments, consults the
// permission manager, serves pure results from the cache, and invokes the
// tool under the run's abort signal. Failures become failed ToolResults
// with a model-readable description; only consent suspension propagates
// as a signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::warn;

use runweave_contracts::{SuspendSignal, ToolCall, ToolErrorKind, ToolResult};

use crate::cache::ToolResultCache;
use crate::context::ExecutionContext;
use crate::error::{CoreError, Result};
use crate::events::EventFactory;
use crate::llm::ToolSpec;
use crate::permission::{PermissionDecision, PermissionManager};
use crate::tool::Tool;

// ============================================================================
// Error classification
// ============================================================================

/// Decides whether a tool raise is transient. Pluggable; the default
/// classifies nothing as retryable beyond errors that say so themselves.
pub trait ErrorClassifier: Send + Sync {
    fn is_retryable(&self, error: &CoreError) -> bool;
}

/// Default classifier: only explicitly-retryable model errors retry
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn is_retryable(&self, error: &CoreError) -> bool {
        error.is_retryable()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ToolExecutorConfig {
    /// Retries per call for retryable failures
    pub max_retries: u32,

    /// Concurrency cap for batch execution; `None` is unbounded
    pub concurrency: Option<usize>,
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            concurrency: None,
        }
    }
}

/// Invokes registered tools on behalf of the step executor
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    permissions: PermissionManager,
    cache: ToolResultCache,
    classifier: Arc<dyn ErrorClassifier>,
    config: ToolExecutorConfig,
}

impl ToolExecutor {
    pub fn new(tools: Vec<Arc<dyn Tool>>, permissions: PermissionManager) -> Self {
        let tools = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self {
            tools,
            permissions,
            cache: ToolResultCache::new(),
            classifier: Arc::new(DefaultClassifier),
            config: ToolExecutorConfig::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_config(mut self, config: ToolExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn permissions(&self) -> &PermissionManager {
        &self.permissions
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool surfaces advertised to the model
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute one tool call. Permission consent propagates as a
    /// `CoreError::Suspended` signal; every other outcome is a ToolResult.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
        events: &EventFactory,
    ) -> Result<ToolResult> {
        let start = Instant::now();

        let Some(tool) = self.tools.get(&call.name) else {
            events
                .tool_call_failed(&call.id, format!("unknown tool: {}", call.name), false)
                .await?;
            return Ok(ToolResult::failure(
                &call.id,
                &call.name,
                ToolErrorKind::UnknownTool,
                format!("no tool named '{}' is registered", call.name),
            )
            .with_duration_ms(elapsed_ms(start)));
        };

        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(err) => {
                events
                    .tool_call_failed(&call.id, format!("bad arguments: {err}"), false)
                    .await?;
                return Ok(ToolResult::failure(
                    &call.id,
                    &call.name,
                    ToolErrorKind::BadArguments,
                    err.to_string(),
                )
                .with_duration_ms(elapsed_ms(start)));
            }
        };

        match self
            .permissions
            .check(
                tool.name(),
                tool.default_policy(),
                &args,
                &ctx.user_id,
                &call.id,
            )
            .await?
        {
            PermissionDecision::Allow => {}
            PermissionDecision::Deny => {
                events
                    .tool_call_failed(&call.id, "denied by permission rule", false)
                    .await?;
                return Ok(ToolResult::failure(
                    &call.id,
                    &call.name,
                    ToolErrorKind::Denied,
                    format!("call to '{}' denied by permission rule", call.name),
                )
                .with_duration_ms(elapsed_ms(start)));
            }
            PermissionDecision::NeedsConsent(request) => {
                return Err(CoreError::Suspended(Box::new(SuspendSignal {
                    interaction_request: request,
                    pending_tool_call: call.clone(),
                    context: ctx.serialized()?,
                })));
            }
        }

        if ctx.abort.is_aborted() {
            events
                .tool_call_failed(&call.id, "aborted before invocation", false)
                .await?;
            return Ok(aborted_result(call, start));
        }

        events
            .tool_call_started(&call.name, &call.id, args.clone())
            .await?;

        if tool.is_pure() {
            let key = ToolResultCache::key(&call.name, &args);
            let _guard = self.cache.lock_key(&key).await;
            if let Some(hit) = self.cache.get(&key) {
                let result = ToolResult {
                    tool_call_id: call.id.clone(),
                    ..hit
                }
                .cached()
                .with_duration_ms(elapsed_ms(start));
                events.tool_call_completed(&call.id, result.duration_ms).await?;
                return Ok(result);
            }
            let result = self.invoke(tool.as_ref(), call, args, ctx, events, start).await?;
            if !result.is_error() {
                self.cache.insert(key, result.clone());
            }
            return Ok(result);
        }

        self.invoke(tool.as_ref(), call, args, ctx, events, start).await
    }

    /// Execute a batch concurrently. Results come back in the order the
    /// calls were given, regardless of completion order.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        ctx: &ExecutionContext,
        events: &EventFactory,
    ) -> Result<Vec<ToolResult>> {
        let mut futures: Vec<std::pin::Pin<Box<dyn futures::Future<Output = Result<ToolResult>> + Send + '_>>> =
            Vec::with_capacity(calls.len());
        for call in calls {
            futures.push(Box::pin(self.execute(call, ctx, events)));
        }
        match self.config.concurrency {
            None => futures::future::try_join_all(futures).await,
            Some(limit) => {
                stream::iter(futures)
                    .buffered(limit.max(1))
                    .try_collect()
                    .await
            }
        }
    }

    async fn invoke(
        &self,
        tool: &dyn Tool,
        call: &ToolCall,
        args: serde_json::Value,
        ctx: &ExecutionContext,
        events: &EventFactory,
        start: Instant,
    ) -> Result<ToolResult> {
        let mut attempt = 0u32;
        loop {
            let outcome = tokio::select! {
                _ = ctx.abort.aborted() => {
                    events
                        .tool_call_failed(&call.id, "aborted during invocation", false)
                        .await?;
                    return Ok(aborted_result(call, start));
                }
                result = tool.execute(args.clone(), ctx) => result,
            };

            match outcome {
                Ok(output) => {
                    let duration_ms = elapsed_ms(start);
                    let mut result = ToolResult::success(&call.id, &call.name, output.content)
                        .with_duration_ms(duration_ms);
                    if let Some(user_surface) = output.content_for_user {
                        result = result.with_content_for_user(user_surface);
                    }
                    events.tool_call_completed(&call.id, duration_ms).await?;
                    return Ok(result);
                }
                Err(err @ CoreError::Suspended(_)) => return Err(err),
                Err(err) => {
                    let retryable = self.classifier.is_retryable(&err);
                    let will_retry = retryable && attempt < self.config.max_retries;
                    events
                        .tool_call_failed(&call.id, err.to_string(), will_retry)
                        .await?;
                    if will_retry {
                        attempt += 1;
                        warn!(
                            tool = %call.name,
                            tool_call_id = %call.id,
                            attempt,
                            "retrying tool call"
                        );
                        continue;
                    }
                    let kind = if retryable {
                        ToolErrorKind::Retryable
                    } else {
                        ToolErrorKind::Failed
                    };
                    return Ok(ToolResult::failure(&call.id, &call.name, kind, err.to_string())
                        .with_duration_ms(elapsed_ms(start)));
                }
            }
        }
    }
}

fn aborted_result(call: &ToolCall, start: Instant) -> ToolResult {
    ToolResult::failure(
        &call.id,
        &call.name,
        ToolErrorKind::Aborted,
        "abort signal set",
    )
    .with_duration_ms(elapsed_ms(start))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
