//! AI/LLM provider implementations.
//!
//! This module provides a unified interface for the LLM backend that turns
//! raw document text into structured data. The [`LlmProvider`] trait keeps
//! the pipeline independent of any one vendor; [`GeminiProvider`] is the
//! shipped implementation.

mod gemini;
mod traits;

pub use gemini::GeminiProvider;
pub use traits::{
    CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmResult, TokenUsage,
};

#[cfg(test)]
pub use traits::MockLlmProvider;
