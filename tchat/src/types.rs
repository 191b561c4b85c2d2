//! Agent configuration and turn result types.

use tprovider::{Message, TokenUsage};

/// Static configuration for one agent: which model string to route, the
/// system prompt prepended to every run, the sampling temperature, and the
/// completion-call budget per turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_rounds: u32,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: Some(crate::DEFAULT_TEMPERATURE),
            max_rounds: crate::MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// Outcome of one user turn, tool rounds included.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// Final assistant text shown to the user.
    pub text: String,
    /// Updated conversation history, system turn excluded, ready to persist.
    pub history: Vec<Message>,
    /// Completion calls made this turn.
    pub rounds: u32,
    /// True when the turn ended by budget rather than a final answer.
    pub round_limit_reached: bool,
    /// Token usage summed across every completion call of the turn.
    pub usage: TokenUsage,
}
