use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::models::{Ripeness, RipenessAnalysis, RipenessSource};

/// Fallback default when the structured JSON reply carries no confidence.
const JSON_DEFAULT_CONFIDENCE: f64 = 75.0;
/// Default for the degraded keyword-scan path.
const SCAN_DEFAULT_CONFIDENCE: f64 = 70.0;

/// Fruits the degraded scanner knows about. The earliest match in the
/// text wins.
const COMMON_FRUITS: [&str; 10] = [
    "apple",
    "banana",
    "mango",
    "strawberry",
    "orange",
    "grape",
    "pear",
    "peach",
    "plum",
    "cherry",
];

/// Remove markdown code-fence markers the LLM likes to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse the LLM's ripeness reply. Tries the strict JSON contract first;
/// if that fails, falls back to scanning the prose for keywords. Never
/// errors: every malformed reply degrades to defaults.
pub fn parse_ripeness(raw: &str) -> RipenessAnalysis {
    let text = strip_code_fences(raw);
    let trimmed = text.trim();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
        let fruit_name = map
            .get("fruit_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_lowercase();

        let ripeness_raw = map
            .get("ripeness")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_lowercase();

        // Anything outside the three stages the prompt allows is forced
        // to "ripe". This is the original contract: it throws away an
        // "unknown" signal, so make the bias visible in the logs.
        let ripeness = Ripeness::from_llm_value(&ripeness_raw).unwrap_or_else(|| {
            log::warn!("⚠️ Unrecognized ripeness value '{}', defaulting to ripe", ripeness_raw);
            Ripeness::Ripe
        });

        let confidence = round2(coerce_confidence(map.get("confidence")));

        return RipenessAnalysis {
            fruit_name,
            ripeness,
            confidence,
            source: RipenessSource::Openai,
        };
    }

    log::warn!("⚠️ JSON parse of ripeness reply failed, scanning text for keywords");
    scan_ripeness_text(trimmed)
}

/// Degraded extraction over free-form prose. The specific substrings
/// come first: "unripe" and "overripe" both contain "ripe".
fn scan_ripeness_text(text: &str) -> RipenessAnalysis {
    let lower = text.to_lowercase();

    let ripeness = if lower.contains("unripe") {
        Ripeness::Unripe
    } else if lower.contains("overripe") {
        Ripeness::Overripe
    } else if lower.contains("ripe") {
        Ripeness::Ripe
    } else {
        Ripeness::Unknown
    };

    // Earliest fruit mention in the text wins
    let fruit_name = COMMON_FRUITS
        .iter()
        .copied()
        .filter_map(|fruit| lower.find(fruit).map(|pos| (pos, fruit)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, fruit)| fruit.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    RipenessAnalysis {
        fruit_name,
        ripeness,
        confidence: SCAN_DEFAULT_CONFIDENCE,
        source: RipenessSource::Openai,
    }
}

/// The API may return the confidence as a number or a quoted number.
fn coerce_confidence(value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(JSON_DEFAULT_CONFIDENCE),
        Some(serde_json::Value::String(s)) => {
            s.trim().parse().unwrap_or(JSON_DEFAULT_CONFIDENCE)
        }
        _ => JSON_DEFAULT_CONFIDENCE,
    }
}

/// Extract a bare fruit name from a reply that should be a single word.
/// Strips everything outside lowercase letters and whitespace, then
/// takes the first token. Never errors.
pub fn extract_fruit_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}

/// Strict decode for the recipe and nutrition contracts. No degraded
/// path here: a reply that is not the expected JSON is a hard error.
pub fn parse_json_report<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let text = strip_code_fences(raw);
    serde_json::from_str(text.trim())
        .map_err(|e| anyhow::anyhow!("Failed to parse structured response: {}", e))
}
