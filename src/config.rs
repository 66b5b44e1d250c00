use std::env;
use std::time::Duration;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CV_MODEL_ID: &str = "fruit-ripeness-unjex/2";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Process configuration, read once at startup. Provider availability is
/// decided here and never re-checked per request: if the Roboflow
/// settings are incomplete the CV model stays unavailable for the whole
/// process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub roboflow: Option<RoboflowConfig>,
    pub request_timeout: Duration,
    pub bind_addr: String,
}

#[derive(Debug, Clone)]
pub struct RoboflowConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_id: String,
}

impl Config {
    pub fn from_env() -> Self {
        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        let openai_model =
            env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());

        // Both settings are required for the CV model to be usable
        let roboflow = match (env::var("ROBOFLOW_URL"), env::var("ROBOFLOW_API_KEY")) {
            (Ok(api_url), Ok(api_key)) if !api_url.is_empty() && !api_key.is_empty() => {
                Some(RoboflowConfig {
                    api_url,
                    api_key,
                    model_id: env::var("CV_MODEL_ID")
                        .unwrap_or_else(|_| DEFAULT_CV_MODEL_ID.to_string()),
                })
            }
            _ => None,
        };

        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Self {
            openai_api_key,
            openai_model,
            roboflow,
            request_timeout,
            bind_addr,
        }
    }
}
