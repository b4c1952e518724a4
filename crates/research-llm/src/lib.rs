//! LLM provider abstraction layer for the research orchestrator
//!
//! This crate provides provider-agnostic abstractions for talking to a chat
//! completion service and adapts them to the [`research_core::Reasoner`]
//! contract. It includes:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait
//! - An OpenAI-compatible provider (feature `openai`, on by default)
//! - [`LlmReasoner`], which turns a provider into a JSON-producing reasoner

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod reasoner;

pub use completion::{CompletionRequest, CompletionResponse, ResponseFormat, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use reasoner::{parse_json_response, LlmReasoner};

#[cfg(feature = "openai")]
pub mod providers;
