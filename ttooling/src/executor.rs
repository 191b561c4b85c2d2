//! Registry-backed tool execution with error absorption.
//!
//! The orchestration loop feeds every tool output straight back to the
//! model, so execution never surfaces an `Err`: unknown tools, bad
//! arguments, and handler failures all come back as an `{"error": ...}`
//! JSON payload the model can read and recover from.

use std::sync::Arc;

use serde_json::json;
use tprovider::ToolCallRequest;
use tracing::warn;

use crate::{ToolContext, ToolFuture, ToolRegistry};

pub trait ToolExecutor: Send + Sync {
    /// Runs one requested call and returns the output string for the tool
    /// message. Infallible by contract.
    fn execute<'a>(
        &'a self,
        call: ToolCallRequest,
        context: ToolContext,
    ) -> ToolFuture<'a, String>;
}

#[derive(Clone, Default)]
pub struct RegistryToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl RegistryToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }
}

impl ToolExecutor for RegistryToolExecutor {
    fn execute<'a>(&'a self, call: ToolCallRequest, context: ToolContext) -> ToolFuture<'a, String> {
        Box::pin(async move {
            let Some(tool) = self.registry.get(&call.name) else {
                warn!(tool = %call.name, call_id = %call.id, "requested tool is not registered");
                return error_payload(format!("tool '{}' is not registered", call.name));
            };

            match tool.invoke(&call.arguments, &context).await {
                Ok(output) => output,
                Err(error) => {
                    warn!(tool = %call.name, call_id = %call.id, %error, "tool execution failed");
                    error_payload(error.to_string())
                }
            }
        })
    }
}

fn error_payload(message: String) -> String {
    json!({"error": message}).to_string()
}
