use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Per-product estimate returned by the model; weights in grams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub sku: String,
    pub name: String,
    pub estimated_weight_before: f64,
    pub estimated_weight_after: f64,
    pub estimated_consumed: f64,
    /// 1-100
    pub confidence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealAnalysisResult {
    pub total_estimated_weight_before: f64,
    pub total_estimated_weight_after: f64,
    pub total_estimated_consumed: f64,
    pub products_analysis: Vec<ProductAnalysis>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MealAnalysisResult {
    /// Parses raw completion text. Bare JSON is taken as is; otherwise the
    /// object is cut out of a Markdown fence or surrounding prose.
    pub fn from_llm_output(raw: &str) -> Result<Self, AnalysisError> {
        let trimmed = raw.trim();
        let json = if serde_json::from_str::<serde::de::IgnoredAny>(trimmed).is_ok() {
            trimmed
        } else {
            extract_json_object(trimmed).ok_or_else(|| {
                AnalysisError::MalformedOutput("response did not contain a JSON object".to_string())
            })?
        };

        let result: MealAnalysisResult = serde_json::from_str(json)
            .map_err(|e| AnalysisError::MalformedOutput(e.to_string()))?;

        result.validate()?;
        Ok(result)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        for product in &self.products_analysis {
            if !(1..=100).contains(&product.confidence) {
                return Err(AnalysisError::MalformedOutput(format!(
                    "confidence for {} must be between 1 and 100, got {}",
                    product.sku, product.confidence
                )));
            }
        }
        Ok(())
    }
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    let body = match trimmed.find("```") {
        Some(open) => {
            let after_fence = &trimmed[open + 3..];
            // Skip the info string (```json)
            let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
            let content = &after_fence[content_start..];
            match content.find("```") {
                Some(close) => &content[..close],
                None => content,
            }
        }
        None => trimmed,
    };

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}
