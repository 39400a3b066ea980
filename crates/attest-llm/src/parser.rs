//! Parse LLM output into candidate facts and recovery answers

use crate::LlmError;
use attest_domain::{CandidateFact, EvidenceQuote, LineRange};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Parse an extraction response into candidate facts
///
/// Quotes whose location is missing or unreadable fall back to `chunk_range`.
/// Malformed facts are logged and skipped, and one unreadable evidence entry
/// makes the whole fact malformed. Only a response that is not a JSON array
/// at all is an error.
pub fn parse_candidates(response: &str, chunk_range: LineRange) -> Result<Vec<CandidateFact>, LlmError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| LlmError::Malformed(format!("JSON parse error: {}", e)))?;

    let items = json
        .as_array()
        .ok_or_else(|| LlmError::Malformed("Expected JSON array".to_string()))?;

    let mut candidates = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match parse_candidate(item, chunk_range) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!("Failed to parse fact {}: {}", idx, e),
        }
    }

    Ok(candidates)
}

/// Answer of the quote recoverer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecoveryResponse {
    /// Whether supporting text was found
    #[serde(default)]
    pub found: bool,

    /// Exact quote, when found
    #[serde(default)]
    pub quote: Option<String>,

    /// Model confidence
    #[serde(default)]
    pub confidence: f64,

    /// Short explanation
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Parse a recovery response
pub fn parse_recovery(response: &str) -> Result<RecoveryResponse, LlmError> {
    let json_str = extract_json(response)?;
    serde_json::from_str(json_str)
        .map_err(|e| LlmError::Malformed(format!("Recovery JSON parse error: {}", e)))
}

/// Parse a summary response into the compact JSON text kept in the session
pub fn parse_summary(response: &str) -> Result<String, LlmError> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| LlmError::Malformed(format!("Summary JSON parse error: {}", e)))?;
    if !value.is_object() {
        return Err(LlmError::Malformed("Expected a JSON object summary".to_string()));
    }
    serde_json::to_string_pretty(&value).map_err(|e| LlmError::Malformed(e.to_string()))
}

/// Extract JSON from response, handling markdown code blocks and chatter
fn extract_json(response: &str) -> Result<&str, LlmError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        // Skip the fence line (```json or ```)
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let body = &after_fence[body_start..];
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(LlmError::Malformed("Empty code block".to_string()));
        }
        return Ok(body);
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    // Prose around the payload: take the outermost bracketed span
    let open = trimmed.find(['[', '{']);
    let close = trimmed.rfind([']', '}']);
    match (open, close) {
        (Some(open), Some(close)) if close > open => Ok(&trimmed[open..=close]),
        _ => Err(LlmError::Malformed("No JSON found in response".to_string())),
    }
}

/// Parse a single candidate fact
fn parse_candidate(json: &Value, chunk_range: LineRange) -> Result<CandidateFact, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Fact is not a JSON object".to_string())?;

    let claim = obj
        .get("claim")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "Missing or empty 'claim'".to_string())?
        .to_string();

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 1.0,
        Some(v) => v
            .as_f64()
            .filter(|c| (0.0..=1.0).contains(c))
            .ok_or_else(|| format!("confidence {} out of range [0.0, 1.0]", v))?,
    };

    let fact_location = obj
        .get("source_location")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<LineRange>().ok());

    let mut evidence_quotes = Vec::new();
    match obj.get("evidence_quotes") {
        Some(Value::Array(quotes)) => {
            for (idx, q) in quotes.iter().enumerate() {
                let quote = parse_quote(q, fact_location.unwrap_or(chunk_range))
                    .map_err(|e| format!("evidence quote {}: {}", idx, e))?;
                evidence_quotes.push(quote);
            }
        }
        _ => {
            // Single-quote shape: {"evidence_quote": "...", "source_location": "..."}
            if let Some(text) = obj.get("evidence_quote").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    evidence_quotes.push(EvidenceQuote::new(text, fact_location.unwrap_or(chunk_range)));
                }
            }
        }
    }

    let metadata = match obj.get("metadata") {
        Some(Value::Object(m)) => m.clone(),
        _ => Map::new(),
    };

    Ok(CandidateFact {
        claim,
        evidence_quotes,
        confidence,
        metadata,
    })
}

fn parse_quote(json: &Value, fallback: LineRange) -> Result<EvidenceQuote, String> {
    match json {
        Value::String(text) if !text.trim().is_empty() => Ok(EvidenceQuote::new(text.as_str(), fallback)),
        Value::Object(obj) => {
            let text = obj
                .get("quote")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| "missing or empty 'quote'".to_string())?;
            let location = obj
                .get("source_location")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<LineRange>().ok())
                .unwrap_or(fallback);
            let relevance = obj
                .get("relevance")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(EvidenceQuote {
                quote: text.to_string(),
                source_location: location,
                relevance,
            })
        }
        other => Err(format!("unreadable quote {}", other)),
    }
}
