//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the writing assistant LLM.
//! It implements the `TextGenerationService` port from the `core` crate.

use std::sync::OnceLock;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use quillwright_core::{
    ports::{PortError, PortResult, TextGenerationService},
    prompt::Prompt,
};
use regex::Regex;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiTextAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTextAdapter {
    /// Creates a new `OpenAiTextAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Strips the wrapping models add around prose: code fences, markdown
/// headings, and runs of blank lines.
pub fn clean_generated_text(text: &str) -> String {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    static HEADING: OnceLock<Option<Regex>> = OnceLock::new();
    static BLANKS: OnceLock<Option<Regex>> = OnceLock::new();

    let mut out = text.trim().to_string();
    if let Some(fence) = FENCE.get_or_init(|| Regex::new(r"(?m)^```[a-zA-Z]*\s*$").ok()) {
        out = fence.replace_all(&out, "").into_owned();
    }
    if let Some(heading) = HEADING.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s+").ok()) {
        out = heading.replace_all(&out, "").into_owned();
    }
    if let Some(blanks) = BLANKS.get_or_init(|| Regex::new(r"\n\s*\n(\s*\n)+").ok()) {
        out = blanks.replace_all(&out, "\n\n").into_owned();
    }
    out.trim().to_string()
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiTextAdapter {
    async fn generate(&self, prompt: &Prompt) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(prompt.max_tokens)
            .temperature(prompt.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "LLM usage"
            );
        }

        // A missing choice or empty content is passed up as empty text; the
        // caller decides what an empty answer means.
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(clean_generated_text(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_fences_and_headings() {
        let raw = "```markdown\n# Chapter Two\nThe rain fell.\n\n\n\nShe ran.\n```\n";
        assert_eq!(clean_generated_text(raw), "Chapter Two\nThe rain fell.\n\nShe ran.");
    }

    #[test]
    fn leaves_plain_prose_alone() {
        assert_eq!(clean_generated_text("  One.\n\nTwo.  "), "One.\n\nTwo.");
        assert_eq!(clean_generated_text("   "), "");
    }
}
