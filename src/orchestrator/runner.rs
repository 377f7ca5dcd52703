//! The round loop
//!
//! Each round:
//! 1. Stop if the caller cancelled, or if the round budget is spent
//! 2. Invoke the model with the conversation and the enabled tool schema
//! 3. Append the assistant message
//! 4. No tool calls: done
//! 5. Otherwise run every call in order through the registry, auditing each;
//!    a registered tool outside the request's enabled set is refused, not run
//! 6. Append one user-role message summarizing the round's results

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeStruct;
use tokio_util::sync::CancellationToken;

use super::request::{ChatRequest, OrchestratorConfig, RunSettings};
use super::state::{AuditEntry, Conversation, RoundBudget};
use crate::llm::{Message, ModelClient, ModelError, ModelRequest, ToolDefinition, Usage};
use crate::tools::{ToolRegistry, ToolResult, truncate_text};

/// Per-tool cap on the text fed back to the model
const SUMMARY_FRAGMENT_CHARS: usize = 4_000;

/// Why a run ended without a final answer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model unavailable: {0}")]
    Model(#[from] ModelError),

    #[error("Round budget of {rounds} exhausted before a final answer")]
    BudgetExhausted { rounds: u32 },

    #[error("Run cancelled after {rounds} rounds")]
    Cancelled { rounds: u32 },
}

impl OrchestratorError {
    /// Machine-readable category for callers
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidRequest(_) => "validation",
            OrchestratorError::Model(_) => "service_unavailable",
            OrchestratorError::BudgetExhausted { .. } => "budget_exhausted",
            OrchestratorError::Cancelled { .. } => "cancelled",
        }
    }
}

/// A run that produced a final answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedRun {
    pub response: String,
    pub conversation: Conversation,
    pub audit_trail: Vec<AuditEntry>,
    pub rounds: u32,
    pub usage: Usage,
}

/// A run that ended early, with whatever it had collected
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub error: OrchestratorError,
    pub conversation: Conversation,
    pub audit_trail: Vec<AuditEntry>,
    pub rounds: u32,
}

impl RunFailure {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl Serialize for RunFailure {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RunFailure", 4)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("error", &self.error.to_string())?;
        state.serialize_field("rounds", &self.rounds)?;
        state.serialize_field("audit_trail", &self.audit_trail)?;
        state.end()
    }
}

/// Drives model rounds and tool execution for chat requests
///
/// Holds no per-run state; one orchestrator can serve concurrent runs.
pub struct Orchestrator<M: ModelClient> {
    client: Arc<M>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl<M: ModelClient> Orchestrator<M> {
    pub fn new(client: Arc<M>, registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(client, registry, OrchestratorConfig::default())
    }

    pub fn with_config(client: Arc<M>, registry: Arc<ToolRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run a request to completion
    pub async fn run(&self, request: ChatRequest) -> Result<CompletedRun, RunFailure> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run a request, stopping at the next round boundary once `cancel` fires
    ///
    /// A tool call already started always runs to completion.
    pub async fn run_with_cancel(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<CompletedRun, RunFailure> {
        let settings = request.resolve(&self.config).map_err(|error| RunFailure {
            error,
            conversation: Conversation::default(),
            audit_trail: Vec::new(),
            rounds: 0,
        })?;

        let tools: Vec<ToolDefinition> = self
            .registry
            .list_descriptors(request.tools.as_deref())
            .iter()
            .map(|d| d.to_definition())
            .collect();

        let enabled: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        let mut run = Run {
            conversation: Conversation::new(request.messages),
            audit_trail: Vec::new(),
            budget: RoundBudget::new(settings.max_tool_rounds),
            usage: Usage::default(),
        };

        tracing::debug!(
            model = self.client.model(),
            tools = tools.len(),
            budget = settings.max_tool_rounds,
            "Starting run"
        );

        loop {
            if cancel.is_cancelled() {
                tracing::info!(rounds = run.budget.used(), "Run cancelled");
                let rounds = run.budget.used();
                return Err(run.fail(OrchestratorError::Cancelled { rounds }));
            }

            let Some(round) = run.budget.start_round() else {
                tracing::warn!(rounds = run.budget.limit(), "Round budget exhausted");
                let rounds = run.budget.limit();
                return Err(run.fail(OrchestratorError::BudgetExhausted { rounds }));
            };

            let reply = match self.client.invoke(&build_request(&run.conversation, &tools, &settings)).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(round, error = %e, kind = e.kind(), "Model invocation failed");
                    return Err(run.fail(OrchestratorError::Model(e)));
                }
            };

            run.usage.add(&reply.usage);
            run.conversation.push(Message::assistant(&reply.content));

            if !reply.needs_tool_execution() {
                tracing::info!(round, "Run completed");
                return Ok(CompletedRun {
                    response: reply.content,
                    conversation: run.conversation,
                    audit_trail: run.audit_trail,
                    rounds: round,
                    usage: run.usage,
                });
            }

            tracing::debug!(round, tool_calls = reply.tool_calls.len(), "Executing tool calls");

            let mut summary = String::from("Tool results:");
            for call in reply.tool_calls {
                let result = if self.registry.has_tool(&call.name) && !enabled.contains(&call.name.as_str()) {
                    tracing::warn!(round, tool = %call.name, "Model called a tool outside the request's set");
                    ToolResult::failure(format!("tool {} is not enabled for this request", call.name))
                } else {
                    self.registry.execute(&call.name, call.arguments.clone()).await
                };
                summary.push('\n');
                summary.push_str(&format!(
                    "{}: {}",
                    call.name,
                    truncate_text(&result.summary(), SUMMARY_FRAGMENT_CHARS)
                ));
                run.audit_trail.push(AuditEntry {
                    round,
                    tool_name: call.name,
                    arguments: call.arguments,
                    result,
                });
            }

            run.conversation.push(Message::user(summary));
        }
    }
}

/// Mutable state of one run; never shared
struct Run {
    conversation: Conversation,
    audit_trail: Vec<AuditEntry>,
    budget: RoundBudget,
    usage: Usage,
}

impl Run {
    fn fail(self, error: OrchestratorError) -> RunFailure {
        RunFailure {
            error,
            rounds: self.budget.used(),
            conversation: self.conversation,
            audit_trail: self.audit_trail,
        }
    }
}

fn build_request(conversation: &Conversation, tools: &[ToolDefinition], settings: &RunSettings) -> ModelRequest {
    ModelRequest::new(conversation.messages().to_vec())
        .with_tools(tools.to_vec())
        .with_max_tokens(settings.max_tokens)
        .with_temperature(settings.temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModelClient, ModelReply, Role, ToolCall};
    use crate::tools::{Arguments, ParameterSchema, Tool, ToolContext, ToolError, ToolResult};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;

    /// Cancels the run's token from inside its own execution
    struct CancellingTool {
        token: CancellationToken,
    }

    #[async_trait]
    impl Tool for CancellingTool {
        fn name(&self) -> &'static str {
            "slow_lookup"
        }

        fn description(&self) -> &'static str {
            "Cancels the run while executing"
        }

        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::empty()
        }

        async fn execute(&self, _args: &Arguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            self.token.cancel();
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!({"finished": true}))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::standard(ToolContext::new("/tmp")))
    }

    fn calc(expression: &str) -> ModelReply {
        ModelReply::with_tool_calls("", vec![ToolCall::new("calculate", json!({"expression": expression}))])
    }

    #[tokio::test]
    async fn test_single_round_answer() {
        let client = Arc::new(MockModelClient::new(vec![ModelReply::text("Hello!")]));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let run = orchestrator.run(ChatRequest::new(vec![Message::user("hi")])).await.unwrap();

        assert_eq!(run.response, "Hello!");
        assert_eq!(run.rounds, 1);
        assert!(run.audit_trail.is_empty());
        assert_eq!(run.conversation.len(), 2);
        assert_eq!(client.invocation_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let client = Arc::new(MockModelClient::new(vec![calc("6*7"), ModelReply::text("42")]));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let run = orchestrator.run(ChatRequest::new(vec![Message::user("6*7?")])).await.unwrap();

        assert_eq!(run.response, "42");
        assert_eq!(run.rounds, 2);
        assert_eq!(run.audit_trail.len(), 1);
        assert_eq!(run.audit_trail[0].round, 1);

        // user, assistant, tool summary, assistant
        let messages = run.conversation.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::User);
        assert!(messages[2].content.starts_with("Tool results:\ncalculate: "));
        assert!(messages[2].content.contains(r#""result":42"#));

        // Second invocation sees the summary
        let requests = client.requests();
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_multiple_calls_one_summary() {
        let reply = ModelReply::with_tool_calls(
            "",
            vec![
                ToolCall::new("calculate", json!({"expression": "1+1"})),
                ToolCall::new("no_such_tool", json!({})),
                ToolCall::new("calculate", json!({"expression": "1/0"})),
            ],
        );
        let client = Arc::new(MockModelClient::new(vec![reply, ModelReply::text("done")]));
        let orchestrator = Orchestrator::new(client, registry());

        let run = orchestrator.run(ChatRequest::new(vec![Message::user("go")])).await.unwrap();

        assert_eq!(run.audit_trail.len(), 3);
        let names: Vec<_> = run.audit_trail.iter().map(|e| e.tool_name.as_str()).collect();
        assert_eq!(names, vec!["calculate", "no_such_tool", "calculate"]);
        assert!(run.audit_trail[0].result.is_success());
        assert!(!run.audit_trail[1].result.is_success());
        assert!(!run.audit_trail[2].result.is_success());

        let summary = &run.conversation.messages()[2].content;
        assert_eq!(summary.lines().count(), 4);
        assert!(summary.contains("no_such_tool: error: unknown tool no_such_tool"));
        assert!(summary.contains("calculate: error: Evaluation error: division by zero"));
    }

    #[tokio::test]
    async fn test_tool_filter_limits_schema() {
        let client = Arc::new(MockModelClient::new(vec![ModelReply::text("ok")]));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let request = ChatRequest::new(vec![Message::user("hi")]).with_tools(["calculate", "bogus"]);
        orchestrator.run(request).await.unwrap();

        let sent = &client.requests()[0];
        assert_eq!(sent.tools.len(), 1);
        assert_eq!(sent.tools[0].name, "calculate");
        assert_eq!(sent.max_tokens, 512);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let client = Arc::new(MockModelClient::repeating(calc("1+1")));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let failure = orchestrator
            .run(ChatRequest::new(vec![Message::user("loop")]).with_max_tool_rounds(3))
            .await
            .unwrap_err();

        assert_eq!(failure.error, OrchestratorError::BudgetExhausted { rounds: 3 });
        assert_eq!(failure.kind(), "budget_exhausted");
        assert_eq!(failure.rounds, 3);
        assert_eq!(failure.audit_trail.len(), 3);
        assert_eq!(client.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_model_error_aborts_with_trail() {
        let client = Arc::new(MockModelClient::scripted(vec![
            Ok(calc("2+3")),
            Err(ModelError::Timeout {
                after: Duration::from_secs(30),
            }),
        ]));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let failure = orchestrator
            .run(ChatRequest::new(vec![Message::user("go")]))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, OrchestratorError::Model(ModelError::Timeout { .. })));
        assert_eq!(failure.kind(), "service_unavailable");
        assert_eq!(failure.audit_trail.len(), 1);
        assert_eq!(failure.rounds, 2);
        // No retry
        assert_eq!(client.invocation_count(), 2);
    }

    #[tokio::test]
    async fn test_validation_error_makes_no_calls() {
        let client = Arc::new(MockModelClient::repeating(ModelReply::text("never")));
        let orchestrator = Orchestrator::new(client.clone(), registry());

        let failure = orchestrator.run(ChatRequest::new(vec![])).await.unwrap_err();

        assert_eq!(failure.kind(), "validation");
        assert_eq!(failure.rounds, 0);
        assert!(failure.conversation.is_empty());
        assert_eq!(client.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Arc::new(MockModelClient::repeating(ModelReply::text("never")));
        let orchestrator = Orchestrator::new(client.clone(), registry());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = orchestrator
            .run_with_cancel(ChatRequest::new(vec![Message::user("hi")]), cancel)
            .await
            .unwrap_err();

        assert_eq!(failure.error, OrchestratorError::Cancelled { rounds: 0 });
        assert_eq!(client.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_tool_finishes_the_call() {
        let cancel = CancellationToken::new();
        let registry = Arc::new(
            ToolRegistry::builder(ToolContext::new("/tmp"))
                .register(CancellingTool { token: cancel.clone() })
                .build(),
        );
        let client = Arc::new(MockModelClient::repeating(ModelReply::with_tool_calls(
            "",
            vec![ToolCall::new("slow_lookup", json!({}))],
        )));
        let orchestrator = Orchestrator::new(client.clone(), registry);

        let failure = orchestrator
            .run_with_cancel(ChatRequest::new(vec![Message::user("look it up")]), cancel)
            .await
            .unwrap_err();

        assert_eq!(failure.error, OrchestratorError::Cancelled { rounds: 1 });
        assert_eq!(client.invocation_count(), 1);
        assert_eq!(failure.audit_trail.len(), 1);
        assert_eq!(
            failure.audit_trail[0].result,
            ToolResult::success(json!({"finished": true}))
        );
        // The round's summary was still recorded
        assert!(failure.conversation.last().unwrap().content.contains("slow_lookup: "));
    }

    #[tokio::test]
    async fn test_disabled_tool_is_not_dispatched() {
        let reply = ModelReply::with_tool_calls(
            "",
            vec![
                ToolCall::new("execute_command", json!({"command": "whoami"})),
                ToolCall::new("calculate", json!({"expression": "1+1"})),
            ],
        );
        let client = Arc::new(MockModelClient::new(vec![reply, ModelReply::text("ok")]));
        let orchestrator = Orchestrator::new(client, registry());

        let request = ChatRequest::new(vec![Message::user("hi")]).with_tools(["calculate"]);
        let run = orchestrator.run(request).await.unwrap();

        assert_eq!(
            run.audit_trail[0].result,
            ToolResult::failure("tool execute_command is not enabled for this request")
        );
        assert!(run.audit_trail[1].result.is_success());
    }

    #[tokio::test]
    async fn test_usage_is_summed() {
        let mut first = calc("1+1");
        first.usage = Usage::new(10, 5);
        let mut second = ModelReply::text("2");
        second.usage = Usage::new(20, 1);
        let client = Arc::new(MockModelClient::new(vec![first, second]));
        let orchestrator = Orchestrator::new(client, registry());

        let run = orchestrator.run(ChatRequest::new(vec![Message::user("1+1")])).await.unwrap();
        assert_eq!(run.usage, Usage::new(30, 6));
    }

    #[tokio::test]
    async fn test_summary_fragment_truncated() {
        let long = "1+".repeat(3_000) + "1";
        let client = Arc::new(MockModelClient::new(vec![calc(&long), ModelReply::text("done")]));
        let orchestrator = Orchestrator::new(client, registry());

        let run = orchestrator.run(ChatRequest::new(vec![Message::user("sum")])).await.unwrap();
        let summary = &run.conversation.messages()[2].content;
        assert!(summary.contains("[truncated"));
        assert!(matches!(run.audit_trail[0].result, ToolResult::Success { .. }));
    }

    #[test]
    fn test_failure_serialization() {
        let failure = RunFailure {
            error: OrchestratorError::BudgetExhausted { rounds: 2 },
            conversation: Conversation::default(),
            audit_trail: Vec::new(),
            rounds: 2,
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["kind"], "budget_exhausted");
        assert_eq!(value["rounds"], 2);
        assert!(value["error"].as_str().unwrap().contains("exhausted"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Orchestrator<MockModelClient>>();
    }
}
