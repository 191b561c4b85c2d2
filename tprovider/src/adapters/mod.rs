//! Vendor adapters. Each submodule owns one wire codec; shared HTTP
//! plumbing and error mapping live in [`http`].

mod http;

pub mod anthropic;
pub mod bedrock;
pub mod gemini;
pub mod generic;
pub mod openai;
