//! Parse LLM responses into a [`Narrative`]
//!
//! Structured JSON is preferred. Anything that is not valid JSON with the
//! three required keys goes through line extraction instead, so parsing
//! never fails.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::Narrative;
use crate::types::{Insight, Recommendation, VitalSign};

#[derive(Debug, Deserialize)]
struct RawResponse {
    summary: String,
    insights: Vec<RawInsight>,
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    text: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    related_measurements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    text: String,
    #[serde(default = "default_priority")]
    priority: i64,
    #[serde(default)]
    rationale: String,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_priority() -> i64 {
    1
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```\s*$").ok())
        .as_ref()
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let captured = fence_regex()
        .and_then(|re| re.captures(content))
        .and_then(|c| c.get(1));
    match captured {
        Some(inner) => inner.as_str().trim(),
        None => content.trim(),
    }
}

/// How the response was understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Json,
    Lines,
}

/// Parse a response; never fails.
pub fn parse_response(content: &str) -> (Narrative, ParseMode) {
    let body = strip_code_fence(content);
    match serde_json::from_str::<RawResponse>(body) {
        Ok(raw) => (from_raw(raw), ParseMode::Json),
        Err(e) => {
            tracing::debug!(error = %e, "LLM response is not structured JSON; extracting lines");
            (from_lines(body), ParseMode::Lines)
        }
    }
}

fn from_raw(raw: RawResponse) -> Narrative {
    let insights = raw
        .insights
        .into_iter()
        .map(|i| {
            let confidence = if i.confidence.is_finite() { i.confidence } else { default_confidence() };
            // Unknown signal names are dropped rather than failing the whole answer
            let related = i
                .related_measurements
                .iter()
                .filter_map(|m| m.parse::<VitalSign>().ok())
                .collect();
            Insight::new(i.text, confidence, related)
        })
        .collect();

    let recommendations = raw
        .recommendations
        .into_iter()
        .map(|r| {
            let priority = r.priority.clamp(1, 5) as u8;
            Recommendation::new(r.text, priority, r.rationale)
        })
        .collect();

    Narrative {
        summary: raw.summary,
        insights,
        recommendations,
    }
}

fn from_lines(body: &str) -> Narrative {
    let mut lines = body.lines();
    let summary = lines
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("No summary provided")
        .to_string();

    let mut insights = Vec::new();
    let mut recommendations = Vec::new();
    for line in lines {
        if let Some(text) = line.strip_prefix("Insight:") {
            insights.push(Insight::new(text.trim(), default_confidence(), Vec::new()));
        } else if let Some(text) = line.strip_prefix("Recommendation:") {
            recommendations.push(Recommendation::new(text.trim(), 1, ""));
        }
    }

    Narrative {
        summary,
        insights,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_BODY: &str = r#"{
        "summary": "Stable overall",
        "insights": [
            {"text": "HR normal", "confidence": 1.7, "related_measurements": ["hr", "steps"]},
            {"text": "No confidence given"}
        ],
        "recommendations": [
            {"text": "Keep going", "priority": 9, "rationale": "fine"},
            {"text": "Defaults"}
        ]
    }"#;

    #[test]
    fn test_plain_json() {
        let (n, mode) = parse_response(JSON_BODY);
        assert_eq!(mode, ParseMode::Json);
        assert_eq!(n.summary, "Stable overall");
        assert_eq!(n.insights[0].confidence, 1.0);
        assert_eq!(n.insights[0].related_signals, vec![VitalSign::HeartRate]);
        assert_eq!(n.insights[1].confidence, 1.0);
        assert!(n.insights[1].related_signals.is_empty());
        assert_eq!(n.recommendations[0].priority, 5);
        assert_eq!(n.recommendations[1].priority, 1);
        assert_eq!(n.recommendations[1].rationale, "");
    }

    #[test]
    fn test_fenced_json() {
        let fenced = format!("```json\n{JSON_BODY}\n```");
        let (n, mode) = parse_response(&fenced);
        assert_eq!(mode, ParseMode::Json);
        assert_eq!(n.insights.len(), 2);

        let bare = format!("```\n{JSON_BODY}\n```\n");
        assert_eq!(parse_response(&bare).1, ParseMode::Json);
    }

    #[test]
    fn test_missing_required_key_uses_lines() {
        let (n, mode) = parse_response(r#"{"summary": "only a summary"}"#);
        assert_eq!(mode, ParseMode::Lines);
        assert_eq!(n.summary, r#"{"summary": "only a summary"}"#);
        assert!(n.insights.is_empty());
    }

    #[test]
    fn test_line_extraction() {
        let text = "Patient is stable.\nInsight: HR within range\nsome chatter\nRecommendation: Recheck tomorrow\nInsight:   Oxygen fine  ";
        let (n, mode) = parse_response(text);
        assert_eq!(mode, ParseMode::Lines);
        assert_eq!(n.summary, "Patient is stable.");
        assert_eq!(n.insights.len(), 2);
        assert_eq!(n.insights[1].text, "Oxygen fine");
        assert_eq!(n.recommendations[0].text, "Recheck tomorrow");
        assert_eq!(n.recommendations[0].priority, 1);
    }

    #[test]
    fn test_strip_without_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
