//! Tool trait contract for registry-managed capabilities.
//!
//! ```rust
//! use serde_json::json;
//! use tprovider::ToolSchema;
//! use ttooling::{FunctionTool, Tool};
//!
//! let tool = FunctionTool::new(
//!     ToolSchema::new("echo", "Echoes input", json!({"type": "object"})),
//!     |args, _ctx| async move { Ok(args) },
//! );
//!
//! assert_eq!(tool.schema().name, "echo");
//! ```

use std::future::Future;
use std::sync::Arc;

use tcommon::{BoxFuture, SessionId};
use tprovider::ToolSchema;

use crate::ToolError;

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

/// Per-invocation context handed to every tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub session_id: SessionId,
}

impl ToolContext {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// One model-invocable capability: a declaration the model sees and a
/// handler fed the model's JSON-encoded argument string.
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    fn invoke<'a>(
        &'a self,
        args_json: &'a str,
        context: &'a ToolContext,
    ) -> ToolFuture<'a, Result<String, ToolError>>;
}

type ToolHandler =
    dyn Fn(String, ToolContext) -> ToolFuture<'static, Result<String, ToolError>> + Send + Sync;

/// Closure-backed [`Tool`] for handlers that need no state of their own.
pub struct FunctionTool {
    schema: ToolSchema,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(String, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let handler: Arc<ToolHandler> =
            Arc::new(move |args_json, context| Box::pin(handler(args_json, context)));

        Self { schema, handler }
    }
}

impl Tool for FunctionTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    fn invoke<'a>(
        &'a self,
        args_json: &'a str,
        context: &'a ToolContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        let args_json = args_json.to_string();
        let context = context.clone();
        (self.handler)(args_json, context)
    }
}
