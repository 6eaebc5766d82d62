use anyhow::{Context, Result};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_PUBLIC_DIR: &str = "../public";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub public_dir: PathBuf,
    pub bind_addr: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ["LLM_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .context("LLM_API_KEY (or OPENROUTER_API_KEY / OPENAI_API_KEY) must be set")?;

        let temperature = match lookup("LLM_TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .with_context(|| format!("LLM_TEMPERATURE is not a number: {}", raw))?,
            None => DEFAULT_TEMPERATURE,
        };

        let max_tokens = match lookup("LLM_MAX_TOKENS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("LLM_MAX_TOKENS is not a positive integer: {}", raw))?,
            None => DEFAULT_MAX_TOKENS,
        };

        Ok(Self {
            api_key,
            base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            public_dir: PathBuf::from(
                lookup("PUBLIC_DIR").unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string()),
            ),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            temperature,
            max_tokens,
        })
    }
}
