use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;

use crate::config::RoboflowConfig;
use crate::models::Prediction;

/// Input size the detection model was trained on.
const INFER_WIDTH: u32 = 640;
const INFER_HEIGHT: u32 = 640;

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

/// CV-model boundary. Mocked in resolver tests.
#[async_trait::async_trait]
pub trait FruitDetector: Send + Sync {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Prediction>>;
}

/// Client for a Roboflow-style hosted inference endpoint.
pub struct RoboflowClient {
    api_url: String,
    api_key: String,
    model_id: String,
    client: reqwest::Client,
}

impl RoboflowClient {
    pub fn new(config: RoboflowConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model_id: config.model_id,
            client,
        })
    }

    /// Decode whatever the caller uploaded, force RGB and resize to the
    /// model's fixed input dimensions, then re-encode as JPEG.
    fn normalize_image(image_bytes: &[u8]) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(image_bytes)?;
        let resized = image::imageops::resize(
            &decoded.to_rgb8(),
            INFER_WIDTH,
            INFER_HEIGHT,
            FilterType::Triangle,
        );

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(resized).write_to(&mut buffer, ImageFormat::Jpeg)?;
        Ok(buffer.into_inner())
    }
}

#[async_trait::async_trait]
impl FruitDetector for RoboflowClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Prediction>> {
        let normalized = Self::normalize_image(image)?;
        let base64_image = general_purpose::STANDARD.encode(&normalized);

        let url = format!(
            "{}/{}?api_key={}",
            self.api_url, self.model_id, self.api_key
        );

        log::debug!(
            "📤 Sending {} base64 bytes to CV model {}",
            base64_image.len(),
            self.model_id
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(base64_image)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ CV inference error ({}): {}", status, error_text);
            anyhow::bail!("CV inference error ({}): {}", status, error_text);
        }

        let infer_response: InferResponse = response.json().await?;
        log::info!(
            "✓ CV model returned {} prediction(s)",
            infer_response.predictions.len()
        );
        Ok(infer_response.predictions)
    }
}

/// Highest-confidence prediction. On equal confidence the first one in
/// the provider's order wins, so this is a fold with strict `>` rather
/// than `Iterator::max_by` (which keeps the last maximum).
pub fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions.iter().fold(None, |best, p| match best {
        Some(b) if p.confidence > b.confidence => Some(p),
        Some(b) => Some(b),
        None => Some(p),
    })
}
