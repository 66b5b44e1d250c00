use std::sync::Arc;

use crate::models::{AnalysisError, AnalysisOutcome, RipenessReport, RipenessSource, Ripeness};
use crate::services::cv::{top_prediction, FruitDetector};
use crate::services::openai::VisionAnalyzer;
use crate::services::parser::round2;

/// Merges the two providers into one ripeness report.
///
/// The CV model, when configured, decides the ripeness stage; OpenAI
/// always decides the fruit name and takes over ripeness whenever the
/// CV model is absent, empty-handed or failing. No provider error
/// escapes this type: the caller sees either a full report or one
/// terminal error.
pub struct FruitAnalyzer {
    cv: Option<Arc<dyn FruitDetector>>,
    openai: Arc<dyn VisionAnalyzer>,
}

impl FruitAnalyzer {
    pub fn new(cv: Option<Arc<dyn FruitDetector>>, openai: Arc<dyn VisionAnalyzer>) -> Self {
        Self { cv, openai }
    }

    pub async fn analyze_image(&self, image: &[u8]) -> AnalysisOutcome {
        // The fruit name always comes from OpenAI, never from the CV
        // model's class labels. A failed name lookup does not abort the
        // analysis.
        let fruit_name = match self.openai.fruit_name(image).await {
            Ok(name) => name,
            Err(e) => {
                log::warn!("⚠️ Fruit name lookup failed, using 'unknown': {}", e);
                "unknown".to_string()
            }
        };

        let cv = match &self.cv {
            Some(cv) => cv,
            None => {
                log::warn!("⚠️ CV model not available, using OpenAI for ripeness detection...");
                return match self.openai.analyze_ripeness(image).await {
                    Ok(analysis) => Ok(RipenessReport {
                        fruit_name,
                        ripeness: analysis.ripeness,
                        confidence: analysis.confidence,
                        source: RipenessSource::OpenaiPrimary,
                    }),
                    Err(e) => {
                        log::error!("❌ OpenAI ripeness analysis failed: {}", e);
                        Err(AnalysisError::OpenAiAnalysisFailed)
                    }
                };
            }
        };

        match cv.detect(image).await {
            Ok(predictions) => match top_prediction(&predictions) {
                Some(top) => {
                    let token = top.class.split_whitespace().last().unwrap_or("unknown");
                    log::info!(
                        "✓ CV model winner: class='{}' confidence={:.2}",
                        top.class,
                        top.confidence
                    );
                    Ok(RipenessReport {
                        fruit_name,
                        ripeness: Ripeness::from_label_token(token),
                        confidence: round2(top.confidence * 100.0),
                        source: RipenessSource::CvModel,
                    })
                }
                None => {
                    log::warn!("⚠️ No predictions from CV model, falling back to OpenAI...");
                    self.openai_fallback(image, fruit_name, AnalysisError::NoPredictionsAndFallbackFailed)
                        .await
                }
            },
            Err(e) => {
                log::error!("❌ Error in CV model, falling back to OpenAI: {}", e);
                self.openai_fallback(
                    image,
                    fruit_name,
                    AnalysisError::CvAndFallbackFailed(e.to_string()),
                )
                .await
            }
        }
    }

    /// Second attempt at ripeness via OpenAI. `terminal` is what the
    /// caller gets when this one fails too.
    async fn openai_fallback(
        &self,
        image: &[u8],
        fruit_name: String,
        terminal: AnalysisError,
    ) -> AnalysisOutcome {
        match self.openai.analyze_ripeness(image).await {
            Ok(analysis) => Ok(RipenessReport {
                fruit_name,
                ripeness: analysis.ripeness,
                confidence: analysis.confidence,
                source: RipenessSource::OpenaiFallback,
            }),
            Err(e) => {
                log::error!("❌ OpenAI fallback failed: {}", e);
                Err(terminal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prediction, RipenessAnalysis};
    use anyhow::Result;

    struct StubDetector(DetectorBehavior);

    enum DetectorBehavior {
        Predictions(Vec<Prediction>),
        Fail(&'static str),
    }

    #[async_trait::async_trait]
    impl FruitDetector for StubDetector {
        async fn detect(&self, _image: &[u8]) -> Result<Vec<Prediction>> {
            match &self.0 {
                DetectorBehavior::Predictions(preds) => Ok(preds.clone()),
                DetectorBehavior::Fail(msg) => anyhow::bail!("{}", msg),
            }
        }
    }

    struct StubAnalyzer {
        name: Option<&'static str>,
        ripeness: Option<RipenessAnalysis>,
    }

    #[async_trait::async_trait]
    impl VisionAnalyzer for StubAnalyzer {
        async fn fruit_name(&self, _image: &[u8]) -> Result<String> {
            match self.name {
                Some(name) => Ok(name.to_string()),
                None => anyhow::bail!("name lookup down"),
            }
        }

        async fn analyze_ripeness(&self, _image: &[u8]) -> Result<RipenessAnalysis> {
            match &self.ripeness {
                Some(analysis) => Ok(analysis.clone()),
                None => anyhow::bail!("ripeness analysis down"),
            }
        }
    }

    fn analysis(ripeness: Ripeness, confidence: f64) -> RipenessAnalysis {
        RipenessAnalysis {
            fruit_name: "banana".to_string(),
            ripeness,
            confidence,
            source: RipenessSource::Openai,
        }
    }

    fn pred(class: &str, confidence: f64) -> Prediction {
        Prediction {
            class: class.to_string(),
            confidence,
        }
    }

    fn with_cv(behavior: DetectorBehavior, openai: StubAnalyzer) -> FruitAnalyzer {
        FruitAnalyzer::new(Some(Arc::new(StubDetector(behavior))), Arc::new(openai))
    }

    #[tokio::test]
    async fn test_no_cv_uses_openai_primary() {
        let analyzer = FruitAnalyzer::new(
            None,
            Arc::new(StubAnalyzer {
                name: Some("mango"),
                ripeness: Some(analysis(Ripeness::Ripe, 85.0)),
            }),
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.source, RipenessSource::OpenaiPrimary);
        assert_eq!(report.fruit_name, "mango");
        assert_eq!(report.ripeness, Ripeness::Ripe);
        assert_eq!(report.confidence, 85.0);
    }

    #[tokio::test]
    async fn test_no_cv_and_openai_down_is_terminal() {
        let analyzer = FruitAnalyzer::new(
            None,
            Arc::new(StubAnalyzer {
                name: Some("mango"),
                ripeness: None,
            }),
        );

        let err = analyzer.analyze_image(b"img").await.unwrap_err();
        assert!(matches!(err, AnalysisError::OpenAiAnalysisFailed));
    }

    #[tokio::test]
    async fn test_cv_predictions_pick_max_confidence() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![
                pred("banana unripe", 0.4),
                pred("banana ripe", 0.91),
            ]),
            StubAnalyzer {
                name: Some("banana"),
                ripeness: None,
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.ripeness, Ripeness::Ripe);
        assert_eq!(report.confidence, 91.0);
        assert_eq!(report.source, RipenessSource::CvModel);
    }

    #[tokio::test]
    async fn test_cv_tie_broken_by_first_prediction() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![
                pred("mango overripe", 0.8),
                pred("mango unripe", 0.8),
            ]),
            StubAnalyzer {
                name: Some("mango"),
                ripeness: None,
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.ripeness, Ripeness::Overripe);
    }

    #[tokio::test]
    async fn test_fruit_name_always_from_openai() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![pred("banana ripe", 0.9)]),
            StubAnalyzer {
                name: Some("kiwi"),
                ripeness: None,
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.fruit_name, "kiwi");
        assert_eq!(report.ripeness, Ripeness::Ripe);
    }

    #[tokio::test]
    async fn test_name_failure_defaults_to_unknown() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![pred("banana overripe", 0.75)]),
            StubAnalyzer {
                name: None,
                ripeness: None,
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.fruit_name, "unknown");
        assert_eq!(report.ripeness, Ripeness::Overripe);
        assert_eq!(report.confidence, 75.0);
    }

    #[tokio::test]
    async fn test_unknown_class_label_gives_unknown_ripeness() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![pred("unknown", 0.5)]),
            StubAnalyzer {
                name: Some("banana"),
                ripeness: None,
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.ripeness, Ripeness::Unknown);
        assert_eq!(report.source, RipenessSource::CvModel);
    }

    #[tokio::test]
    async fn test_empty_predictions_fall_back_to_openai() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![]),
            StubAnalyzer {
                name: Some("banana"),
                ripeness: Some(analysis(Ripeness::Overripe, 60.0)),
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.ripeness, Ripeness::Overripe);
        assert_eq!(report.confidence, 60.0);
        assert_eq!(report.source, RipenessSource::OpenaiFallback);
    }

    #[tokio::test]
    async fn test_empty_predictions_and_openai_down_is_terminal() {
        let analyzer = with_cv(
            DetectorBehavior::Predictions(vec![]),
            StubAnalyzer {
                name: Some("banana"),
                ripeness: None,
            },
        );

        let err = analyzer.analyze_image(b"img").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoPredictionsAndFallbackFailed));
    }

    #[tokio::test]
    async fn test_cv_error_falls_back_to_openai() {
        let analyzer = with_cv(
            DetectorBehavior::Fail("connection refused"),
            StubAnalyzer {
                name: Some("peach"),
                ripeness: Some(analysis(Ripeness::Unripe, 72.5)),
            },
        );

        let report = analyzer.analyze_image(b"img").await.unwrap();
        assert_eq!(report.fruit_name, "peach");
        assert_eq!(report.ripeness, Ripeness::Unripe);
        assert_eq!(report.source, RipenessSource::OpenaiFallback);
    }

    #[tokio::test]
    async fn test_cv_error_and_openai_down_names_both_failures() {
        let analyzer = with_cv(
            DetectorBehavior::Fail("connection refused"),
            StubAnalyzer {
                name: Some("peach"),
                ripeness: None,
            },
        );

        let err = analyzer.analyze_image(b"img").await.unwrap_err();
        match err {
            AnalysisError::CvAndFallbackFailed(cause) => {
                assert!(cause.contains("connection refused"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
