use std::sync::Arc;

use crate::error::AnalysisError;
use crate::models::{AnalysisRequest, MealAnalysisResult, MealEvent};
use crate::services::image_loader::{EncodedImage, ImageError, ImageLoader, PictureLoad};
use crate::services::prompt_builder::{
    build_prompt, PreparedPicture, PreparedProduct, PromptInput,
};
use crate::services::AIService;

/// Reference picture left out of the prompt, and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPicture {
    pub sku: String,
    pub picture_id: i64,
    pub reason: ImageError,
}

/// Prompt input plus what had to be dropped to build it
#[derive(Debug)]
pub struct PreparedMeal<'a> {
    pub input: PromptInput<'a>,
    pub skipped: Vec<SkippedPicture>,
}

pub struct MealAnalysisHandler {
    images: ImageLoader,
    ai: Arc<dyn AIService>,
}

impl MealAnalysisHandler {
    pub fn new(images: ImageLoader, ai: Arc<dyn AIService>) -> Self {
        Self { images, ai }
    }

    /// Loads every image the meal references. The before/after photos are
    /// required; reference pictures that fail to load are skipped.
    pub async fn prepare<'a>(&self, meal: &'a MealEvent) -> Result<PreparedMeal<'a>, AnalysisError> {
        let picture_before = self.load_required(&meal.picture_before).await?;
        let picture_after = self.load_required(&meal.picture_after).await?;

        let mut products = Vec::with_capacity(meal.products.len());
        let mut skipped = Vec::new();

        for product in &meal.products {
            let mut pictures = Vec::with_capacity(product.pictures.len());

            for picture in &product.pictures {
                match self.images.load_picture(&picture.image_url).await {
                    PictureLoad::Loaded(image) => pictures.push(PreparedPicture { picture, image }),
                    PictureLoad::Skipped(reason) => {
                        log::warn!(
                            "⚠️ Skipping reference picture {} of {}: {}",
                            picture.id,
                            product.sku,
                            reason
                        );
                        skipped.push(SkippedPicture {
                            sku: product.sku.clone(),
                            picture_id: picture.id,
                            reason,
                        });
                    }
                }
            }

            products.push(PreparedProduct { product, pictures });
        }

        Ok(PreparedMeal {
            input: PromptInput {
                weight_before: meal.weight_before,
                description: meal.description.as_deref(),
                picture_before,
                picture_after,
                products,
            },
            skipped,
        })
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<MealAnalysisResult, AnalysisError> {
        request.validate().map_err(AnalysisError::InvalidRequest)?;

        let meal = &request.meal_details;
        log::info!(
            "🍽️ Analyzing meal for person {} with {} products (model: {})",
            meal.person_id,
            meal.products.len(),
            request.model_name
        );

        let prepared = self.prepare(meal).await?;
        if !prepared.skipped.is_empty() {
            log::info!(
                "ℹ️ {} reference pictures were unavailable and left out",
                prepared.skipped.len()
            );
        }

        let prompt = build_prompt(&prepared.input);
        let raw = self.ai.complete_json(&request.model_name, &prompt).await?;

        let result = MealAnalysisResult::from_llm_output(&raw).map_err(|e| {
            log::error!("❌ Could not parse LLM output: {}", e);
            e
        })?;

        log::info!(
            "✅ Meal analyzed: {:.1}g consumed across {} products",
            result.total_estimated_consumed,
            result.products_analysis.len()
        );
        Ok(result)
    }

    async fn load_required(&self, relative: &str) -> Result<EncodedImage, AnalysisError> {
        self.images.load(relative).await.map_err(|e| match &e {
            ImageError::NotFound(_) => {
                log::error!("❌ Meal image missing: {}", e);
                AnalysisError::ImageNotFound(e.to_string())
            }
            ImageError::Unreadable { .. } => AnalysisError::ImageUnreadable(e.to_string()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{LooseValue, Product, ReferencePicture};
    use crate::services::prompt_builder::Prompt;
    use std::sync::Mutex;

    pub(crate) const CANNED_RESULT: &str = r#"{
        "total_estimated_weight_before": 500,
        "total_estimated_weight_after": 300,
        "total_estimated_consumed": 200,
        "products_analysis": [
            {
                "sku": "SKU-RICE",
                "name": "Rice",
                "estimated_weight_before": 500,
                "estimated_weight_after": 300,
                "estimated_consumed": 200,
                "confidence": 72
            }
        ],
        "notes": null
    }"#;

    /// Returns a fixed completion and records every prompt it receives
    pub(crate) struct FakeAIService {
        response: Result<String, String>,
        pub prompts: Mutex<Vec<(String, Prompt)>>,
    }

    impl FakeAIService {
        pub(crate) fn replying(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl AIService for FakeAIService {
        async fn complete_json(&self, model: &str, prompt: &Prompt) -> Result<String, AnalysisError> {
            self.prompts
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.clone()));
            self.response.clone().map_err(AnalysisError::Upstream)
        }
    }

    pub(crate) fn public_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn picture(id: i64, image_url: &str) -> ReferencePicture {
        ReferencePicture {
            id,
            image_url: image_url.to_string(),
            weight: LooseValue::Numeric(120.0),
            plate_id: LooseValue::Text("P-1".to_string()),
            upper_diameter: LooseValue::Numeric(26.0),
            lower_diameter: LooseValue::Numeric(20.0),
            depth: LooseValue::Text("3".to_string()),
        }
    }

    pub(crate) fn request(products: Vec<Product>) -> AnalysisRequest {
        AnalysisRequest {
            meal_details: MealEvent {
                weight_before: 500.0,
                weight_after: 300.0,
                person_id: "person-1".to_string(),
                description: Some("School lunch".to_string()),
                picture_before: "meals\\before.jpg".to_string(),
                picture_after: "meals/after.jpg".to_string(),
                products,
            },
            model_name: "openai/gpt-4o".to_string(),
        }
    }

    fn rice(pictures: Vec<ReferencePicture>) -> Product {
        Product {
            sku: "SKU-RICE".to_string(),
            name: "Rice".to_string(),
            pictures,
            weight_in_req: 200.0,
        }
    }

    #[tokio::test]
    async fn test_missing_primary_image_never_reaches_llm() {
        let dir = public_dir(&["meals/before.jpg"]);
        let ai = Arc::new(FakeAIService::replying(CANNED_RESULT));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai.clone());

        let err = handler.analyze(&request(vec![])).await.unwrap_err();

        assert!(matches!(err, AnalysisError::ImageNotFound(_)));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_reference_picture_is_skipped() {
        let dir = public_dir(&["meals/before.jpg", "meals/after.jpg", "products/rice-1.jpg"]);
        let ai = Arc::new(FakeAIService::replying(CANNED_RESULT));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai.clone());

        let request = request(vec![rice(vec![
            picture(1, "products/rice-1.jpg"),
            picture(2, "products/rice-2.jpg"),
        ])]);

        let prepared = handler.prepare(&request.meal_details).await.unwrap();
        assert_eq!(prepared.input.products.len(), 1);
        assert_eq!(prepared.input.products[0].pictures.len(), 1);
        assert_eq!(prepared.input.products[0].pictures[0].picture.id, 1);
        assert_eq!(prepared.skipped.len(), 1);
        assert_eq!(prepared.skipped[0].sku, "SKU-RICE");
        assert_eq!(prepared.skipped[0].picture_id, 2);
        assert!(matches!(prepared.skipped[0].reason, ImageError::NotFound(_)));

        handler.analyze(&request).await.unwrap();

        let prompts = ai.prompts.lock().unwrap();
        let (model, prompt) = &prompts[0];
        let text = prompt.data_text();
        assert_eq!(model, "openai/gpt-4o");
        assert_eq!(text.matches("### Rice (SKU: SKU-RICE)").count(), 1);
        assert_eq!(text.matches("Reference image").count(), 1);
        // before + after + one reference picture
        assert_eq!(prompt.image_count(), 3);
    }

    #[tokio::test]
    async fn test_meal_without_products_still_calls_llm() {
        let dir = public_dir(&["meals/before.jpg", "meals/after.jpg"]);
        let ai = Arc::new(FakeAIService::replying(CANNED_RESULT));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai.clone());

        let result = handler.analyze(&request(vec![])).await.unwrap();

        assert_eq!(result.total_estimated_consumed, 200.0);
        assert_eq!(ai.calls(), 1);
        let prompts = ai.prompts.lock().unwrap();
        let text = prompts[0].1.data_text();
        assert!(text.contains("- Total weight before: 500g"));
        assert!(text.contains("## Products to Analyze"));
        assert_eq!(prompts[0].1.image_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_llm_output_fails_request() {
        let dir = public_dir(&["meals/before.jpg", "meals/after.jpg"]);
        let ai = Arc::new(FakeAIService::replying(r#"{"total_estimated_weight_before": 500}"#));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai);

        let err = handler.analyze(&request(vec![])).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_propagated() {
        let dir = public_dir(&["meals/before.jpg", "meals/after.jpg"]);
        let ai = Arc::new(FakeAIService::failing("quota exceeded"));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai);

        let err = handler.analyze(&request(vec![])).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Upstream(ref m) if m == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_loading_images() {
        let dir = tempfile::tempdir().unwrap();
        let ai = Arc::new(FakeAIService::replying(CANNED_RESULT));
        let handler = MealAnalysisHandler::new(ImageLoader::new(dir.path()), ai.clone());

        let mut request = request(vec![]);
        request.model_name = String::new();

        let err = handler.analyze(&request).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRequest(_)));
        assert_eq!(ai.calls(), 0);
    }
}
