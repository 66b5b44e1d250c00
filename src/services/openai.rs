use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{NutritionReport, RecipeReport, RipenessAnalysis};
use crate::services::parser;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
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
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
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
    content: String,
}

/// The two vision operations the fallback resolver needs. Mocked in
/// resolver tests.
#[async_trait::async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn fruit_name(&self, image: &[u8]) -> Result<String>;
    async fn analyze_ripeness(&self, image: &[u8]) -> Result<RipenessAnalysis>;
}

/// OpenAI vision client. Holding `api_key: None` is a valid state:
/// every call then fails with a "not configured" error instead of the
/// process refusing to start.
pub struct OpenAiVisionService {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiVisionService {
    pub fn new(api_key: Option<String>, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    fn image_part(image: &[u8]) -> ContentPart {
        let base64_image = general_purpose::STANDARD.encode(image);
        ContentPart::ImageUrl {
            content_type: "image_url".to_string(),
            image_url: ImageData {
                url: format!("data:image/jpeg;base64,{}", base64_image),
            },
        }
    }

    fn text_part(text: String) -> ContentPart {
        ContentPart::Text {
            content_type: "text".to_string(),
            text,
        }
    }

    /// Send one user message and return the raw completion text.
    async fn chat(&self, content: Vec<ContentPart>, max_tokens: u32) -> Result<String> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => anyhow::bail!("OpenAI API not configured"),
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens,
        };

        log::debug!("📤 Sending request to OpenAI with model: {}", self.model);

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenAI response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ OpenAI API error ({}): {}", status, error_text);
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no choices"))?;

        log::debug!("💬 OpenAI response content: {}", content);
        Ok(content.trim().to_string())
    }

    /// Recipe suggestions and food-safety info for the photographed
    /// fruit, optionally primed with an already-resolved name and stage.
    pub async fn recipes_and_safety(
        &self,
        image: &[u8],
        fruit_name: Option<&str>,
        ripeness: Option<&str>,
    ) -> Result<RecipeReport> {
        log::info!("🍳 Getting recipes and safety info from OpenAI...");

        let context = match (fruit_name, ripeness) {
            (Some(name), Some(stage)) => format!(
                "\nThe fruit has been identified as: {}\nCurrent ripeness: {}",
                name, stage
            ),
            _ => String::new(),
        };

        let prompt = format!(
            "Analyze this fruit image and provide comprehensive information.{}\n\
             \n\
             Provide:\n\
             1. Fruit identification\n\
             2. Ripeness level: unripe, ripe, or overripe\n\
             3. Food safety: Is it safe to eat?\n\
             4. Days until discard: 0-14 days\n\
             5. Storage tips\n\
             6. 3 recipes optimized for this ripeness level\n\
             \n\
             Respond in EXACTLY this JSON format with no additional text:\n\
             {{\n\
               \"fruit_name\": \"banana\",\n\
               \"ripeness\": \"overripe\",\n\
               \"is_safe_to_eat\": true,\n\
               \"days_until_discard\": 2,\n\
               \"storage_tips\": \"Store overripe bananas in the freezer for smoothies.\",\n\
               \"recipes\": [\n\
                 {{\n\
                   \"name\": \"Banana Bread\",\n\
                   \"difficulty\": \"easy\",\n\
                   \"prep_time\": \"15 minutes\",\n\
                   \"cook_time\": \"60 minutes\",\n\
                   \"why_this_ripeness\": \"Overripe bananas are sweeter and mash easily\",\n\
                   \"ingredients\": [\"3 overripe bananas, mashed\", \"1/3 cup butter\"],\n\
                   \"instructions\": \"1. Preheat oven to 350F. 2. Mix and bake 60 minutes.\"\n\
                 }}\n\
               ]\n\
             }}",
            context
        );

        let text = self
            .chat(
                vec![Self::text_part(prompt), Self::image_part(image)],
                2000,
            )
            .await?;

        parser::parse_json_report(&text)
    }

    /// Nutrition facts and environmental impact. Text-only prompt, no
    /// image needed once the fruit is named.
    pub async fn nutrition_and_impact(
        &self,
        fruit_name: &str,
        ripeness: &str,
    ) -> Result<NutritionReport> {
        log::info!("📊 Getting nutrition info for {} ({})...", fruit_name, ripeness);

        let prompt = format!(
            "Provide nutritional information for a {} {}.\n\
             \n\
             Return in EXACT JSON format:\n\
             {{\n\
               \"fruit_name\": \"{}\",\n\
               \"serving_size\": \"1 medium (approx Xg)\",\n\
               \"nutrition\": {{\n\
                 \"calories\": 95,\n\
                 \"carbs_g\": 25,\n\
                 \"fiber_g\": 4,\n\
                 \"sugar_g\": 19,\n\
                 \"protein_g\": 1,\n\
                 \"vitamin_c_percent\": 17,\n\
                 \"potassium_mg\": 422\n\
               }},\n\
               \"health_benefits\": [\"High in potassium\", \"Good vitamin B6 source\"],\n\
               \"environmental_impact\": {{\n\
                 \"carbon_footprint_kg\": 0.7,\n\
                 \"water_usage_liters\": 790,\n\
                 \"sustainability_rating\": \"medium\",\n\
                 \"local_season\": \"Year-round (imported)\"\n\
               }},\n\
               \"waste_reduction_tip\": \"Use overripe in smoothies or freeze\"\n\
             }}",
            ripeness, fruit_name, fruit_name
        );

        let text = self.chat(vec![Self::text_part(prompt)], 800).await?;
        parser::parse_json_report(&text)
    }
}

#[async_trait::async_trait]
impl VisionAnalyzer for OpenAiVisionService {
    /// Identify the fruit. The reply is expected to be a single bare
    /// word; anything else is cleaned down to its first token.
    async fn fruit_name(&self, image: &[u8]) -> Result<String> {
        log::info!("🍎 Getting fruit name from OpenAI...");

        let prompt = "Identify the fruit in this image. Return ONLY the fruit name in \
                      lowercase, nothing else. Examples: apple, banana, mango, strawberry, \
                      orange, etc. If you cannot identify a fruit, return 'unknown'."
            .to_string();

        let text = self
            .chat(vec![Self::text_part(prompt), Self::image_part(image)], 50)
            .await?;

        let name = parser::extract_fruit_name(&text);
        log::info!("✓ Fruit identified: {}", name);
        Ok(name)
    }

    /// Structured ripeness analysis. The reply is parsed tolerantly:
    /// malformed JSON degrades to a keyword scan instead of failing.
    async fn analyze_ripeness(&self, image: &[u8]) -> Result<RipenessAnalysis> {
        log::info!("🔍 Starting OpenAI ripeness analysis...");

        let prompt = "Analyze this fruit image and determine:\n\
                      1. The fruit name (e.g., apple, banana, mango, strawberry)\n\
                      2. Its ripeness stage: must be one of these exact values: \
                      \"unripe\", \"ripe\", or \"overripe\"\n\
                      \n\
                      Criteria:\n\
                      - unripe: green, hard, not ready to eat\n\
                      - ripe: perfect for eating, good color, firm\n\
                      - overripe: brown spots, very soft, past prime\n\
                      \n\
                      Respond in EXACTLY this JSON format with no additional text:\n\
                      {\n\
                        \"fruit_name\": \"name of fruit in lowercase\",\n\
                        \"ripeness\": \"unripe/ripe/overripe\",\n\
                        \"confidence\": 85.0\n\
                      }"
            .to_string();

        let text = self
            .chat(vec![Self::text_part(prompt), Self::image_part(image)], 200)
            .await?;

        Ok(parser::parse_ripeness(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_service_errors_without_calling_out() {
        let service = OpenAiVisionService::new(
            None,
            "gpt-4o-mini".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = service.fruit_name(b"not a real image").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));

        let err = service
            .nutrition_and_impact("banana", "ripe")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_image_part_builds_data_url() {
        let part = OpenAiVisionService::image_part(&[0xff, 0xd8, 0xff]);
        let json = serde_json::to_value(&part).unwrap();
        let url = json["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
