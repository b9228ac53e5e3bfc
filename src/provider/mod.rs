//! LLM provider access and prompt construction.

pub mod client;
#[cfg(test)]
pub mod fake;
pub mod prompts;

pub use client::{CompletionProvider, HttpProvider, ProviderError, ProviderSettings};
