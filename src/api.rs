use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::handlers::MealAnalysisHandler;
use crate::models::{AnalysisRequest, MealAnalysisResult};

pub struct AppState {
    pub analysis_handler: Arc<MealAnalysisHandler>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: MealAnalysisResult,
}

pub fn create_router(analysis_handler: Arc<MealAnalysisHandler>) -> Router {
    let state = Arc::new(AppState { analysis_handler });

    Router::new()
        .route("/", get(root_handler))
        .route("/analyze-meal", post(analyze_meal_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn analyze_meal_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<AnalysisResponse>, AnalysisError> {
    log::info!("🔔 Analysis request received ({} bytes)", body.len());

    let request: AnalysisRequest = serde_json::from_str(&body).map_err(|e| {
        log::error!("❌ Failed to parse analysis request: {}", e);
        AnalysisError::InvalidRequest(e.to_string())
    })?;

    match state.analysis_handler.analyze(&request).await {
        Ok(analysis) => Ok(Json(AnalysisResponse { analysis })),
        Err(e) => {
            log::error!("❌ Meal analysis failed ({}): {}", e.kind(), e);
            Err(e)
        }
    }
}

async fn root_handler() -> &'static str {
    "Meal Analysis Service - POST /analyze-meal with { meal_details, model_name }"
}

async fn health_check() -> &'static str {
    "OK"
}
