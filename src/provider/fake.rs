//! Scripted provider for tests.

use super::{CompletionProvider, ProviderError};
use crate::config::ProviderKind;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers prompts from a script of `(marker, response)` pairs: the first
/// marker contained in the prompt selects the response. A response of
/// `Err(status)` fails with that HTTP status.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Vec<(String, Result<String, u16>)>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `response` when the prompt contains `marker`.
    pub fn on(mut self, marker: &str, response: &str) -> Self {
        self.script.push((marker.to_string(), Ok(response.to_string())));
        self
    }

    /// Fail with `status` when the prompt contains `marker`.
    pub fn fail_on(mut self, marker: &str, status: u16) -> Self {
        self.script.push((marker.to_string(), Err(status)));
        self
    }

    /// Answer every unmatched prompt with `response`.
    pub fn otherwise(mut self, response: &str) -> Self {
        self.fallback = Some(response.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let scripted = self
            .script
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, response)| response.clone());

        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err(status)) => Err(ProviderError::Status {
                provider: ProviderKind::OpenAi,
                status,
                body: "scripted failure".to_string(),
            }),
            None => self
                .fallback
                .clone()
                .ok_or(ProviderError::EmptyCompletion(ProviderKind::OpenAi)),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}
