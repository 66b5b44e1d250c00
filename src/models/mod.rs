use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ripeness stage of a fruit. Every report carries exactly one of these
/// four values; anything a provider returns outside the set is mapped in
/// by the parser or the resolver, never passed through raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ripeness {
    Unripe,
    Ripe,
    Overripe,
    Unknown,
}

impl std::fmt::Display for Ripeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Ripeness::Unripe => "unripe",
            Ripeness::Ripe => "ripe",
            Ripeness::Overripe => "overripe",
            Ripeness::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl Ripeness {
    /// Map one token of a CV class label ("banana overripe" -> "overripe")
    /// onto a stage. Unrecognized tokens become Unknown.
    pub fn from_label_token(token: &str) -> Self {
        match token.to_lowercase().as_str() {
            "unripe" => Ripeness::Unripe,
            "ripe" => Ripeness::Ripe,
            "overripe" => Ripeness::Overripe,
            _ => Ripeness::Unknown,
        }
    }

    /// Strict parse of the three stages the LLM is instructed to emit.
    /// Returns None for anything else so the caller can apply its own
    /// default policy.
    pub fn from_llm_value(value: &str) -> Option<Self> {
        match value {
            "unripe" => Some(Ripeness::Unripe),
            "ripe" => Some(Ripeness::Ripe),
            "overripe" => Some(Ripeness::Overripe),
            _ => None,
        }
    }
}

/// Which provider/path produced the ripeness value in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RipenessSource {
    /// Roboflow CV model prediction
    CvModel,
    /// OpenAI was the primary path (CV model not configured)
    OpenaiPrimary,
    /// OpenAI after the CV model failed or returned nothing
    OpenaiFallback,
    /// Raw OpenAI analysis, before the resolver re-tags it
    Openai,
}

impl std::fmt::Display for RipenessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RipenessSource::CvModel => "cv_model",
            RipenessSource::OpenaiPrimary => "openai_primary",
            RipenessSource::OpenaiFallback => "openai_fallback",
            RipenessSource::Openai => "openai",
        };
        write!(f, "{}", s)
    }
}

/// One candidate class from the CV model. Confidence is in [0,1] as
/// returned by the inference API; extra response fields (bounding box,
/// detection id) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub confidence: f64,
}

/// Final merged analysis returned to the caller. `confidence` is on the
/// 0-100 scale and always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RipenessReport {
    pub fruit_name: String,
    pub ripeness: Ripeness,
    pub confidence: f64,
    pub source: RipenessSource,
}

/// Parsed form of the LLM's ripeness reply, before the resolver decides
/// the final source tag and fruit name.
#[derive(Debug, Clone, PartialEq)]
pub struct RipenessAnalysis {
    pub fruit_name: String,
    pub ripeness: Ripeness,
    pub confidence: f64,
    pub source: RipenessSource,
}

/// Terminal failures of the analysis pipeline. Provider-level problems
/// (unavailable config, call failures, empty predictions, malformed
/// text) are absorbed inside the resolver and only reach the caller as
/// one of these doubly-failed cases.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("OpenAI analysis failed")]
    OpenAiAnalysisFailed,
    #[error("No predictions found from CV model and OpenAI fallback failed")]
    NoPredictionsAndFallbackFailed,
    #[error("CV model error and OpenAI fallback failed: {0}")]
    CvAndFallbackFailed(String),
}

pub type AnalysisOutcome = Result<RipenessReport, AnalysisError>;

/// Recipe and food-safety payload from the LLM's recipe contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeReport {
    pub fruit_name: String,
    pub ripeness: String,
    pub is_safe_to_eat: bool,
    pub days_until_discard: i32,
    pub storage_tips: String,
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub difficulty: String,
    pub prep_time: String,
    pub cook_time: String,
    pub why_this_ripeness: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
}

/// Nutrition payload from the LLM's text-only nutrition contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionReport {
    pub fruit_name: String,
    pub serving_size: String,
    pub nutrition: NutritionFacts,
    pub health_benefits: Vec<String>,
    pub environmental_impact: EnvironmentalImpact,
    pub waste_reduction_tip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub protein_g: f64,
    pub vitamin_c_percent: f64,
    pub potassium_mg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentalImpact {
    pub carbon_footprint_kg: f64,
    pub water_usage_liters: f64,
    pub sustainability_rating: String,
    pub local_season: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ripeness_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Ripeness::Overripe).unwrap(), "\"overripe\"");
        assert_eq!(serde_json::to_string(&Ripeness::Unknown).unwrap(), "\"unknown\"");
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(serde_json::to_string(&RipenessSource::CvModel).unwrap(), "\"cv_model\"");
        assert_eq!(
            serde_json::to_string(&RipenessSource::OpenaiPrimary).unwrap(),
            "\"openai_primary\""
        );
        assert_eq!(
            serde_json::to_string(&RipenessSource::OpenaiFallback).unwrap(),
            "\"openai_fallback\""
        );
        assert_eq!(serde_json::to_string(&RipenessSource::Openai).unwrap(), "\"openai\"");
    }

    #[test]
    fn test_label_token_mapping() {
        assert_eq!(Ripeness::from_label_token("overripe"), Ripeness::Overripe);
        assert_eq!(Ripeness::from_label_token("Ripe"), Ripeness::Ripe);
        assert_eq!(Ripeness::from_label_token("banana"), Ripeness::Unknown);
        assert_eq!(Ripeness::from_label_token("unknown"), Ripeness::Unknown);
    }

    #[test]
    fn test_llm_value_is_strict() {
        assert_eq!(Ripeness::from_llm_value("ripe"), Some(Ripeness::Ripe));
        assert_eq!(Ripeness::from_llm_value("rotten"), None);
        assert_eq!(Ripeness::from_llm_value("unknown"), None);
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = RipenessReport {
            fruit_name: "banana".to_string(),
            ripeness: Ripeness::Ripe,
            confidence: 91.0,
            source: RipenessSource::CvModel,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fruit_name"], "banana");
        assert_eq!(json["ripeness"], "ripe");
        assert_eq!(json["confidence"], 91.0);
        assert_eq!(json["source"], "cv_model");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AnalysisError::OpenAiAnalysisFailed.to_string(),
            "OpenAI analysis failed"
        );
        assert_eq!(
            AnalysisError::CvAndFallbackFailed("boom".to_string()).to_string(),
            "CV model error and OpenAI fallback failed: boom"
        );
    }
}
