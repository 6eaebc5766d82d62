use serde::{Deserialize, Serialize};

use super::ai_service::AIService;
use super::prompt_builder::{ContentPart, Prompt};
use crate::error::AnalysisError;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageBody,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageBody {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client (OpenRouter by default)
pub struct OpenRouterService {
    api_key: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn new(api_key: String, base_url: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, model: &str, prompt: &Prompt) -> ChatRequest {
        let parts = prompt
            .data
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => WirePart::Text {
                    content_type: "text".to_string(),
                    text: text.clone(),
                },
                ContentPart::Image(image) => WirePart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData {
                        url: image.data_url(),
                        detail: "high".to_string(),
                    },
                },
            })
            .collect();

        ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: MessageBody::Text(prompt.instruction.clone()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: MessageBody::Parts(parts),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }

    fn extract_content(response_text: &str) -> Result<String, AnalysisError> {
        let chat_response: ChatResponse = serde_json::from_str(response_text)
            .map_err(|e| AnalysisError::Upstream(format!("unexpected response body: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalysisError::Upstream("response contained no completion".to_string()))
    }
}

#[async_trait::async_trait]
impl AIService for OpenRouterService {
    async fn complete_json(&self, model: &str, prompt: &Prompt) -> Result<String, AnalysisError> {
        let request = self.build_request(model, prompt);

        log::info!(
            "🤖 Sending analysis request to {} with model: {} ({} images)",
            self.base_url,
            model,
            prompt.image_count()
        );
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(payload) = serde_json::to_string(&request) {
                log::debug!("📤 Request payload size: {} bytes", payload.len());
            }
        }

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/meal-analysis-service")
            .header("X-Title", "Meal Analysis Service")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let status = response.status();
        log::debug!("📥 LLM response status: {}", status);

        let response_text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        if !status.is_success() {
            log::error!("❌ LLM API error response ({}): {}", status, response_text);
            return Err(AnalysisError::Upstream(format!(
                "API error ({}): {}",
                status, response_text
            )));
        }

        log::debug!("📄 Raw LLM response size: {} bytes", response_text.len());
        let content = Self::extract_content(&response_text)?;
        log::info!("💬 LLM completion received ({} chars)", content.len());

        Ok(content)
    }
}
