//! Facts and the evidence that backs them

use crate::location::LineRange;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A verbatim excerpt from the source supporting a fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceQuote {
    /// Quoted source text
    pub quote: String,

    /// Where the quote was found (or claimed to be found)
    pub source_location: LineRange,

    /// Optional note on why the quote supports the claim
    #[serde(default)]
    pub relevance: Option<String>,
}

impl EvidenceQuote {
    /// Create a quote without a relevance note
    pub fn new(quote: impl Into<String>, source_location: LineRange) -> Self {
        Self {
            quote: quote.into(),
            source_location,
            relevance: None,
        }
    }

    /// Attach a relevance note
    pub fn with_relevance(mut self, relevance: impl Into<String>) -> Self {
        self.relevance = Some(relevance.into());
        self
    }
}

/// A fact as proposed for a chunk, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFact {
    /// Atomic factual statement
    pub claim: String,

    /// Supporting quotes with claimed locations
    #[serde(default)]
    pub evidence_quotes: Vec<EvidenceQuote>,

    /// Proposer confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Open metadata (entities, process details, quantitative values, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_confidence() -> f64 {
    1.0
}

impl CandidateFact {
    /// Create a candidate with empty metadata
    pub fn new(claim: impl Into<String>, evidence_quotes: Vec<EvidenceQuote>, confidence: f64) -> Self {
        Self {
            claim: claim.into(),
            evidence_quotes,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A validated fact, traceable to verbatim source text
///
/// Every accepted fact carries at least one quote and every quote has passed
/// validation. `source_location` covers all quote locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Atomic factual statement
    pub claim: String,

    /// Name of the source document
    pub source_doc: String,

    /// Smallest range covering every evidence quote
    pub source_location: LineRange,

    /// Validated quotes, at least one
    pub evidence_quotes: Vec<EvidenceQuote>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Open metadata carried over from the candidate
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Fact {
    /// Metadata lookup
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// True when the metadata entry exists and is a non-empty string, array or object
    pub fn has_meta(&self, key: &str) -> bool {
        match self.metadata.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }
}

/// Output of a quote recovery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredQuote {
    /// Exact quote as found in the window
    pub quote: String,

    /// Location reported by the recoverer
    pub source_location: LineRange,

    /// Recoverer confidence in [0, 1]
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fact_record_shape() {
        let fact = Fact {
            claim: "Backups run nightly".to_string(),
            source_doc: "soc2.pdf".to_string(),
            source_location: LineRange::new(120, 121),
            evidence_quotes: vec![EvidenceQuote::new("backups run nightly at 2 AM", LineRange::new(120, 121))],
            confidence: 0.9,
            metadata: Map::new(),
        };

        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["source_location"], json!("Lines 120-121"));
        assert_eq!(value["evidence_quotes"][0]["relevance"], Value::Null);
        assert_eq!(value["evidence_quotes"][0]["source_location"], json!("Lines 120-121"));
    }

    #[test]
    fn test_candidate_defaults() {
        let candidate: CandidateFact = serde_json::from_value(json!({
            "claim": "MFA is enforced",
            "evidence_quotes": [{"quote": "MFA is enforced", "source_location": "Line 4"}]
        }))
        .unwrap();

        assert_eq!(candidate.confidence, 1.0);
        assert!(candidate.metadata.is_empty());
        assert_eq!(candidate.evidence_quotes[0].source_location, LineRange::single(4));
    }

    #[test]
    fn test_has_meta() {
        let mut fact_meta = Map::new();
        fact_meta.insert("entities".into(), json!(["Okta"]));
        fact_meta.insert("process_details".into(), json!({}));
        fact_meta.insert("quantitative_values".into(), json!(""));
        let fact = Fact {
            claim: "c".into(),
            source_doc: "d".into(),
            source_location: LineRange::single(1),
            evidence_quotes: vec![],
            confidence: 1.0,
            metadata: fact_meta,
        };

        assert!(fact.has_meta("entities"));
        assert!(!fact.has_meta("process_details"));
        assert!(!fact.has_meta("quantitative_values"));
        assert!(!fact.has_meta("missing"));
    }
}
