use crate::error::AnalysisError;
use crate::services::prompt_builder::Prompt;

/// Trait for chat-completion backends (OpenRouter, OpenAI, ...)
#[async_trait::async_trait]
pub trait AIService: Send + Sync {
    /// Submits the prompt to `model` asking for a JSON object and returns the
    /// raw completion text
    async fn complete_json(&self, model: &str, prompt: &Prompt) -> Result<String, AnalysisError>;
}
