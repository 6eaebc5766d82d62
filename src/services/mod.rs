pub mod ai_service;
pub mod image_loader;
pub mod openrouter; // OpenRouter / OpenAI-compatible chat completions
pub mod prompt_builder;

pub use ai_service::AIService;
pub use image_loader::ImageLoader;
pub use openrouter::OpenRouterService;
