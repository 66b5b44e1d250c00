use serde::{Deserialize, Serialize};

/// Failure channel of every endpoint: `{"error": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct NutritionRequest {
    pub fruit_name: String,
    #[serde(default)]
    pub ripeness: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeParams {
    #[serde(default)]
    pub fruit_name: Option<String>,
    #[serde(default)]
    pub ripeness: Option<String>,
}

// Axum integration (optional - requires axum dependency)
#[cfg(feature = "http-server")]
pub mod server {
    use super::*;
    use axum::{
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use std::sync::Arc;
    use tower::ServiceBuilder;
    use tower_http::limit::RequestBodyLimitLayer;

    use crate::handlers::FruitAnalyzer;
    use crate::services::OpenAiVisionService;

    /// Uploads above this size are rejected before reaching a handler.
    const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

    pub struct AppState {
        pub analyzer: Arc<FruitAnalyzer>,
        pub openai: Arc<OpenAiVisionService>,
    }

    pub fn create_api_router(
        analyzer: Arc<FruitAnalyzer>,
        openai: Arc<OpenAiVisionService>,
    ) -> Router {
        let state = Arc::new(AppState { analyzer, openai });

        Router::new()
            .route("/", get(root_handler))
            .route("/api/analyze", post(analyze_handler))
            .route("/api/recipes", post(recipes_handler))
            .route("/api/nutrition", post(nutrition_handler))
            .route("/health", get(health_check))
            .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES)))
            .with_state(state)
    }

    /// Run the fallback resolver over an uploaded image. Terminal
    /// analysis failures map to 502 with the error body; the resolver
    /// never panics or leaks provider errors.
    async fn analyze_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
        if body.is_empty() {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "empty image upload");
        }

        log::info!("📸 /api/analyze received {} bytes", body.len());

        match state.analyzer.analyze_image(&body).await {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => {
                log::error!("❌ Analysis failed: {}", e);
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }

    async fn recipes_handler(
        State(state): State<Arc<AppState>>,
        Query(params): Query<RecipeParams>,
        body: Bytes,
    ) -> Response {
        if body.is_empty() {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "empty image upload");
        }

        log::info!("🍳 /api/recipes received {} bytes", body.len());

        let result = state
            .openai
            .recipes_and_safety(&body, params.fruit_name.as_deref(), params.ripeness.as_deref())
            .await;

        match result {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => {
                log::error!("❌ Recipe lookup failed: {}", e);
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }

    async fn nutrition_handler(
        State(state): State<Arc<AppState>>,
        Json(request): Json<NutritionRequest>,
    ) -> Response {
        let ripeness = request.ripeness.as_deref().unwrap_or("ripe");

        match state
            .openai
            .nutrition_and_impact(&request.fruit_name, ripeness)
            .await
        {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => {
                log::error!("❌ Nutrition lookup failed: {}", e);
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }

    fn error_response(status: StatusCode, message: &str) -> Response {
        (
            status,
            Json(ErrorBody {
                error: message.to_string(),
            }),
        )
            .into_response()
    }

    async fn root_handler() -> &'static str {
        "Fruit Ripeness API - POST an image to /api/analyze"
    }

    async fn health_check() -> &'static str {
        "OK"
    }
}
