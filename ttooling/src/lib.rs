//! Capability layer for registering and executing model-invocable tools.

mod args;
mod error;
mod executor;
mod registry;
mod tool;

pub mod prelude {
    pub use crate::{
        RegistryToolExecutor, Tool, ToolContext, ToolError, ToolErrorKind, ToolExecutor,
        ToolFuture, ToolRegistry,
    };
}

pub use args::{optional_string, parse_json_object, parse_json_value, required_string};
pub use error::{ToolError, ToolErrorKind};
pub use executor::{RegistryToolExecutor, ToolExecutor};
pub use registry::ToolRegistry;
pub use tool::{FunctionTool, Tool, ToolContext, ToolFuture};
