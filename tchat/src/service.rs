//! Tool-calling turn orchestration.
//!
//! One user turn is a bounded loop: call the model, execute any tool calls
//! it requests, feed the results back, repeat. The loop ends when the model
//! answers in plain text or the round budget runs out, in which case the
//! user gets a fixed apology instead of a half-finished analysis.

use std::sync::Arc;

use futures_util::future::join_all;
use tcommon::SessionId;
use tprovider::{
    CompletionRequest, CompletionResult, Message, ProviderRouter, TokenUsage, ToolSchema,
};
use tracing::{debug, warn};
use ttooling::{ToolContext, ToolExecutor};

use crate::{AgentConfig, AgentReply, ChatError, ConversationStore};

/// Completion calls allowed per user turn unless configured otherwise.
pub const MAX_TOOL_ROUNDS: u32 = 10;

/// Sampling temperature applied when the agent config does not override it.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Reply used when a turn exhausts its round budget.
pub const ROUND_LIMIT_REPLY: &str =
    "I'm having trouble completing this analysis. Please try a simpler question.";

pub struct AgentService {
    router: Arc<ProviderRouter>,
    executor: Arc<dyn ToolExecutor>,
    tools: Vec<ToolSchema>,
    config: AgentConfig,
}

impl AgentService {
    pub fn new(
        router: Arc<ProviderRouter>,
        executor: Arc<dyn ToolExecutor>,
        tools: Vec<ToolSchema>,
        config: AgentConfig,
    ) -> Self {
        Self {
            router,
            executor,
            tools,
            config,
        }
    }

    /// Runs one user turn against the given prior history.
    ///
    /// The returned history is the input history plus this turn's user,
    /// assistant, and tool messages; the system turn never leaves here.
    pub async fn run(
        &self,
        session_id: &SessionId,
        history: Vec<Message>,
        user_input: &str,
    ) -> Result<AgentReply, ChatError> {
        if user_input.trim().is_empty() {
            return Err(ChatError::invalid_request("user_input must not be empty"));
        }

        // One route per turn; every round of this turn talks to the same
        // adapter with the same vendor-facing model id.
        let (provider, model) = self.router.resolve(&self.config.model)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.config.system_prompt.clone()));
        messages.extend(history);
        messages.push(Message::user(user_input));

        let mut usage = TokenUsage::default();
        let mut rounds = 0;

        while rounds < self.config.max_rounds {
            let mut request = CompletionRequest::new(model.clone(), messages.clone())
                .with_tools(self.tools.clone());
            if let Some(temperature) = self.config.temperature {
                request = request.with_temperature(temperature);
            }

            let result = provider.complete(request).await?;
            rounds += 1;
            accumulate(&mut usage, &result.usage);
            debug!(
                session = %session_id,
                vendor = provider.vendor(),
                round = rounds,
                tool_calls = result.tool_calls.len(),
                "completed model round"
            );

            if !result.has_tool_calls() {
                messages.push(Message::assistant(result.text.clone()));
                return Ok(self.reply(messages, result.text, rounds, false, usage));
            }

            let CompletionResult {
                text, tool_calls, ..
            } = result;
            messages.push(Message::assistant_with_calls(
                Some(text).filter(|text| !text.is_empty()),
                tool_calls.clone(),
            ));

            // Calls run concurrently; results are appended in request order
            // so histories replay identically regardless of timing.
            let context = ToolContext::new(session_id.clone());
            let outputs = join_all(
                tool_calls
                    .iter()
                    .map(|call| self.executor.execute(call.clone(), context.clone())),
            )
            .await;

            for (call, output) in tool_calls.iter().zip(outputs) {
                messages.push(Message::tool(call.id.clone(), output));
            }
        }

        warn!(
            session = %session_id,
            model = %self.config.model,
            rounds = self.config.max_rounds,
            "turn exhausted its tool round budget"
        );
        // The apology goes to the caller only; history keeps just the turns
        // the model actually produced.
        Ok(self.reply(messages, ROUND_LIMIT_REPLY.to_string(), rounds, true, usage))
    }

    /// Runs one turn with history loaded from and saved back to the store.
    pub async fn run_for_session(
        &self,
        store: &dyn ConversationStore,
        session_id: &SessionId,
        user_input: &str,
    ) -> Result<AgentReply, ChatError> {
        let history = store.load(session_id).await?;
        let reply = self.run(session_id, history, user_input).await?;
        store.save(session_id, reply.history.clone()).await?;
        Ok(reply)
    }

    fn reply(
        &self,
        mut messages: Vec<Message>,
        text: String,
        rounds: u32,
        round_limit_reached: bool,
        usage: TokenUsage,
    ) -> AgentReply {
        let history = messages.split_off(1);
        AgentReply {
            text,
            history,
            rounds,
            round_limit_reached,
            usage,
        }
    }
}

fn accumulate(total: &mut TokenUsage, round: &TokenUsage) {
    total.prompt_tokens += round.prompt_tokens;
    total.completion_tokens += round.completion_tokens;
    total.total_tokens += round.total_tokens;
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tprovider::{
        ChatProvider, FinishReason, ProviderError, ProviderFuture, Role, ToolCallRequest,
    };
    use ttooling::{RegistryToolExecutor, ToolFuture, ToolRegistry};

    use super::*;

    fn text_result(text: &str) -> CompletionResult {
        CompletionResult {
            text: text.to_string(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            raw: serde_json::Value::Null,
        }
    }

    fn calls_result(calls: Vec<ToolCallRequest>) -> CompletionResult {
        CompletionResult {
            text: String::new(),
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            raw: serde_json::Value::Null,
        }
    }

    /// Pops scripted results per call; repeats the last one when empty.
    struct ScriptedProvider {
        script: Mutex<VecDeque<CompletionResult>>,
        calls: AtomicU32,
        last: CompletionResult,
    }

    impl ScriptedProvider {
        fn new(script: Vec<CompletionResult>) -> Self {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| text_result("scripted provider is empty"));
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                last,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatProvider for ScriptedProvider {
        fn vendor(&self) -> &str {
            "scripted"
        }

        fn complete<'a>(
            &'a self,
            request: CompletionRequest,
        ) -> ProviderFuture<'a, Result<CompletionResult, ProviderError>> {
            Box::pin(async move {
                request.validate()?;
                self.calls.fetch_add(1, Ordering::SeqCst);
                let next = self.script.lock().expect("script lock").pop_front();
                Ok(next.unwrap_or_else(|| self.last.clone()))
            })
        }
    }

    struct NoopExecutor;

    impl ToolExecutor for NoopExecutor {
        fn execute<'a>(
            &'a self,
            call: ToolCallRequest,
            _context: ToolContext,
        ) -> ToolFuture<'a, String> {
            Box::pin(async move { format!("ran {}", call.name) })
        }
    }

    fn service_with(
        provider: Arc<ScriptedProvider>,
        executor: Arc<dyn ToolExecutor>,
    ) -> AgentService {
        let router = Arc::new(ProviderRouter::new());
        router.register("openai", provider);
        AgentService::new(
            router,
            executor,
            Vec::new(),
            AgentConfig::new("openai/gpt-4o", "You are a market analyst."),
        )
    }

    #[tokio::test]
    async fn direct_answer_finishes_in_one_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_result("AAPL is $150")]));
        let service = service_with(Arc::clone(&provider), Arc::new(NoopExecutor));

        let reply = service
            .run(&SessionId::new("s-1"), Vec::new(), "What is AAPL at?")
            .await
            .expect("turn should succeed");

        assert_eq!(reply.text, "AAPL is $150");
        assert_eq!(reply.rounds, 1);
        assert!(!reply.round_limit_reached);
        assert_eq!(provider.call_count(), 1);
        // System turn stays out of the returned history.
        assert_eq!(reply.history.len(), 2);
        assert_eq!(reply.history[0].role, Role::User);
        assert_eq!(reply.history[1].role, Role::Assistant);
        assert_eq!(reply.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn tool_results_are_appended_in_request_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            calls_result(vec![
                ToolCallRequest::new("c1", "get_quote", "{\"ticker\":\"AAPL\"}"),
                ToolCallRequest::new("c2", "get_news", "{\"ticker\":\"AAPL\"}"),
            ]),
            text_result("AAPL is up on good news"),
        ]));
        let service = service_with(Arc::clone(&provider), Arc::new(NoopExecutor));

        let reply = service
            .run(&SessionId::new("s-2"), Vec::new(), "How is AAPL doing?")
            .await
            .expect("turn should succeed");

        assert_eq!(reply.rounds, 2);
        let history = &reply.history;
        // user, assistant(calls), tool, tool, assistant
        assert_eq!(history.len(), 5);
        assert_eq!(history[1].tool_calls.len(), 2);
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(history[2].content_str(), "ran get_quote");
        assert_eq!(history[3].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(history[3].content_str(), "ran get_news");
        assert_eq!(history[4].content_str(), "AAPL is up on good news");
        assert_eq!(reply.usage.total_tokens, 30);
    }

    #[tokio::test]
    async fn round_budget_exhaustion_yields_the_fixed_reply() {
        let provider = Arc::new(ScriptedProvider::new(vec![calls_result(vec![
            ToolCallRequest::new("c1", "get_quote", "{}"),
        ])]));
        let service = service_with(Arc::clone(&provider), Arc::new(NoopExecutor));

        let reply = service
            .run(&SessionId::new("s-3"), Vec::new(), "loop forever")
            .await
            .expect("turn should succeed");

        assert_eq!(provider.call_count(), MAX_TOOL_ROUNDS);
        assert_eq!(reply.rounds, MAX_TOOL_ROUNDS);
        assert!(reply.round_limit_reached);
        assert_eq!(reply.text, ROUND_LIMIT_REPLY);
        // The apology is caller-facing only; the history ends on the last
        // tool result and never carries an assistant turn the model did not
        // produce.
        let last = reply.history.last().expect("history non-empty");
        assert_eq!(last.role, Role::Tool);
        assert!(
            reply
                .history
                .iter()
                .all(|message| message.content_str() != ROUND_LIMIT_REPLY)
        );
    }

    #[tokio::test]
    async fn round_budget_override_is_honored() {
        let provider = Arc::new(ScriptedProvider::new(vec![calls_result(vec![
            ToolCallRequest::new("c1", "get_quote", "{}"),
        ])]));
        let router = Arc::new(ProviderRouter::new());
        router.register("openai", Arc::clone(&provider) as Arc<dyn ChatProvider>);
        let service = AgentService::new(
            router,
            Arc::new(NoopExecutor),
            Vec::new(),
            AgentConfig::new("openai/gpt-4o", "You are a market analyst.").with_max_rounds(2),
        );

        let reply = service
            .run(&SessionId::new("s-override"), Vec::new(), "loop")
            .await
            .expect("turn should succeed");

        assert_eq!(provider.call_count(), 2);
        assert_eq!(reply.rounds, 2);
        assert!(reply.round_limit_reached);
    }

    #[tokio::test]
    async fn unknown_tool_output_is_fed_back_not_raised() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            calls_result(vec![ToolCallRequest::new("c1", "missing_tool", "{}")]),
            text_result("I could not use that tool."),
        ]));
        let executor = Arc::new(RegistryToolExecutor::new(Arc::new(ToolRegistry::new())));
        let service = service_with(Arc::clone(&provider), executor);

        let reply = service
            .run(&SessionId::new("s-4"), Vec::new(), "use a tool")
            .await
            .expect("turn should succeed");

        assert!(reply.history[2].content_str().contains("\"error\""));
        assert_eq!(reply.text, "I could not use that tool.");
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_result("unused")]));
        let service = service_with(Arc::clone(&provider), Arc::new(NoopExecutor));

        let error = service
            .run(&SessionId::new("s-5"), Vec::new(), "   ")
            .await
            .expect_err("blank input should fail");
        assert_eq!(error.kind, crate::ChatErrorKind::InvalidRequest);
        assert_eq!(provider.call_count(), 0);
    }
}
