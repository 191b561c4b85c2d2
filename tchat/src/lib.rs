//! Conversational orchestration over routed providers and registered tools.

mod error;
mod service;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        AgentConfig, AgentReply, AgentService, ChatError, ChatErrorKind, ConversationStore,
        DEFAULT_TEMPERATURE, InMemoryConversationStore, MAX_TOOL_ROUNDS, ROUND_LIMIT_REPLY,
    };
    pub use tcommon::SessionId;
    pub use ttooling::{
        RegistryToolExecutor, Tool, ToolContext, ToolError, ToolErrorKind, ToolExecutor,
        ToolRegistry,
    };
}

pub use error::{ChatError, ChatErrorKind};
pub use service::{AgentService, DEFAULT_TEMPERATURE, MAX_TOOL_ROUNDS, ROUND_LIMIT_REPLY};
pub use store::{ChatFuture, ConversationStore, InMemoryConversationStore};
pub use types::{AgentConfig, AgentReply};
pub use tcommon::SessionId;
