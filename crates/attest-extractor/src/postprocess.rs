//! Metadata-driven ranking and filtering of extracted facts
//!
//! Facts carrying quantitative values are always kept. The remaining facts
//! are ranked by how specific their metadata looks and the best of them are
//! added back until the quantitative share would drop below the target.

use attest_domain::Fact;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Boilerplate audit-test wording that carries no control substance
const TEST_ONLY_PATTERNS: &[&str] = &[
    r"^no exceptions? (were |was )?(noted|found|identified)\.?$",
    r"^auditor (inspected|tested|examined|observed) .* and found no exceptions?\.?$",
    r"^(inspection|testing|examination) (found|revealed|showed) no (exceptions?|issues?|problems?)\.?$",
];

/// Wording that shows a claim describes an actual control
const CONTROL_SUBSTANCE_PATTERN: &str = r"\b(requires?|performs?|maintains?|reviews?|monitors?|encrypts?|restricts?|configures?|implements?|enforces?|passwords?|encryption|firewalls?|access|authentication|backups?|policy|policies|procedures?|daily|weekly|monthly|quarterly|annually|users?|security|systems?)\b";

/// Fact types worth a bonus, and how much
const FACT_TYPE_WEIGHTS: &[(&str, f64)] = &[
    ("technical_control", 0.5),
    ("process", 0.5),
    ("architecture", 0.5),
    ("organizational", 0.3),
    ("test_result", -0.5),
];

/// Scoring weights for ranking facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Multiplier for the `specificity_score` metadata value
    pub specificity: f64,

    /// Bonus for naming any entity
    pub entities: f64,

    /// Extra bonus for naming three or more entities
    pub many_entities: f64,

    /// Bonus for quantitative values
    pub quantitative: f64,

    /// Bonus for process attribution (who/when/how)
    pub process_details: f64,

    /// Extra bonus for two or more process details
    pub rich_process_details: f64,

    /// Bonus when confidence is at least `high_confidence`
    pub confidence_bonus: f64,

    /// Confidence that earns the bonus
    pub high_confidence: f64,

    /// Penalty for generic wording
    pub generic_penalty: f64,

    /// Penalty for test-only boilerplate
    pub test_only_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            specificity: 2.0,
            entities: 1.0,
            many_entities: 0.5,
            quantitative: 1.0,
            process_details: 0.5,
            rich_process_details: 0.5,
            confidence_bonus: 0.3,
            high_confidence: 0.9,
            generic_penalty: 0.5,
            test_only_penalty: 1.0,
        }
    }
}

/// Configuration for post-processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Minimum share of facts with quantitative values after filtering
    pub target_fraction: f64,

    /// Terms that mark a claim as generic
    pub generic_terms: Vec<String>,

    /// Ranking weights
    pub weights: ScoringWeights,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            target_fraction: 0.35,
            generic_terms: [
                "personnel",
                "management",
                "appropriate",
                "reasonable",
                "adequate",
                "sufficient",
                "policies and procedures",
                "security program",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            weights: ScoringWeights::default(),
        }
    }
}

impl PostProcessConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.target_fraction > 0.0 && self.target_fraction <= 1.0) {
            return Err(format!(
                "target_fraction must be in (0.0, 1.0], got {}",
                self.target_fraction
            ));
        }
        if !(0.0..=1.0).contains(&self.weights.high_confidence) {
            return Err(format!(
                "high_confidence must be in [0.0, 1.0], got {}",
                self.weights.high_confidence
            ));
        }
        Ok(())
    }
}

/// Whether a fact carries quantitative values in its metadata
pub fn has_quantitative_values(fact: &Fact) -> bool {
    fact.has_meta("quantitative_values")
}

/// Share of facts satisfying `predicate`; 0.0 for an empty set
pub fn coverage<P>(facts: &[Fact], predicate: P) -> f64
where
    P: Fn(&Fact) -> bool,
{
    if facts.is_empty() {
        return 0.0;
    }
    facts.iter().filter(|f| predicate(f)).count() as f64 / facts.len() as f64
}

/// Ranks facts and filters them towards a target share of qualifying facts
pub struct PostProcessor {
    config: PostProcessConfig,
    generic_terms: Vec<String>,
    test_only: Vec<Regex>,
    control_substance: Regex,
}

impl PostProcessor {
    /// Create a post-processor
    pub fn new(config: PostProcessConfig) -> Result<Self, crate::ExtractorError> {
        config.validate().map_err(crate::ExtractorError::Config)?;

        let test_only = TEST_ONLY_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| crate::ExtractorError::Config(format!("Invalid pattern: {}", e)))?;
        let control_substance = Regex::new(CONTROL_SUBSTANCE_PATTERN)
            .map_err(|e| crate::ExtractorError::Config(format!("Invalid pattern: {}", e)))?;
        let generic_terms = config.generic_terms.iter().map(|t| t.to_lowercase()).collect();

        Ok(Self {
            config,
            generic_terms,
            test_only,
            control_substance,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// True for audit boilerplate such as "No exceptions noted."
    pub fn is_test_only(&self, claim: &str) -> bool {
        let claim = claim.trim().to_lowercase();
        if self.control_substance.is_match(&claim) {
            return false;
        }
        self.test_only.iter().any(|re| re.is_match(&claim))
    }

    /// True when the claim uses any configured generic term
    pub fn is_generic(&self, claim: &str) -> bool {
        let claim = claim.to_lowercase();
        self.generic_terms.iter().any(|t| claim.contains(t.as_str()))
    }

    /// Metadata completeness score, higher is more specific
    pub fn score(&self, fact: &Fact) -> f64 {
        let w = &self.config.weights;
        let mut score = 0.0;

        let specificity = fact
            .meta("specificity_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        score += specificity * w.specificity;

        let entities = fact.meta("entities").and_then(Value::as_array).map_or(0, Vec::len);
        if entities > 0 {
            score += w.entities;
            if entities >= 3 {
                score += w.many_entities;
            }
        }

        if has_quantitative_values(fact) {
            score += w.quantitative;
        }

        let details = fact
            .meta("process_details")
            .and_then(Value::as_object)
            .map_or(0, |m| m.values().filter(|v| !v.is_null()).count());
        if details > 0 {
            score += w.process_details;
            if details >= 2 {
                score += w.rich_process_details;
            }
        }

        if let Some(fact_type) = fact.meta("fact_type").and_then(Value::as_str) {
            if let Some((_, bonus)) = FACT_TYPE_WEIGHTS.iter().find(|(t, _)| *t == fact_type) {
                score += bonus;
            }
        }

        if fact.confidence >= w.high_confidence {
            score += w.confidence_bonus;
        }

        if self.is_generic(&fact.claim) {
            score -= w.generic_penalty;
        }
        if self.is_test_only(&fact.claim) {
            score -= w.test_only_penalty;
        }

        score
    }

    /// Filter using the configured target fraction
    pub fn filter_default<P>(&self, facts: &[Fact], predicate: P) -> Vec<Fact>
    where
        P: Fn(&Fact) -> bool,
    {
        self.filter(facts, self.config.target_fraction, predicate)
    }

    /// Keep every qualifying fact plus the best-scoring others
    ///
    /// With `Q` qualifying facts, at most `floor(Q / target_fraction) - Q`
    /// others are kept so the qualifying share stays at or above the target.
    /// Ties in score go to the earlier fact. Output preserves input order.
    /// With no qualifying facts the input is returned unchanged.
    pub fn filter<P>(&self, facts: &[Fact], target_fraction: f64, predicate: P) -> Vec<Fact>
    where
        P: Fn(&Fact) -> bool,
    {
        let qualifying: Vec<bool> = facts.iter().map(|f| predicate(f)).collect();
        let q = qualifying.iter().filter(|&&keep| keep).count();

        if q == 0 {
            info!("No qualifying facts among {}; nothing filtered", facts.len());
            return facts.to_vec();
        }
        if target_fraction <= 0.0 {
            return facts.to_vec();
        }

        let target = target_fraction.min(1.0);
        // Epsilon absorbs float error in exact ratios like 7 / 0.35
        let allowed_total = ((q as f64 / target) + 1e-9).floor() as usize;
        let budget = allowed_total.saturating_sub(q);

        let mut ranked: Vec<(usize, f64)> = facts
            .iter()
            .enumerate()
            .filter(|(idx, _)| !qualifying[*idx])
            .map(|(idx, fact)| (idx, self.score(fact)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let mut keep = qualifying;
        for (idx, _) in ranked.iter().take(budget) {
            keep[*idx] = true;
        }

        let kept: Vec<Fact> = facts
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(f, _)| f.clone())
            .collect();

        debug!("Filter budget: {} non-qualifying of {}", budget.min(ranked.len()), ranked.len());
        info!(
            "Filtered {} facts to {} ({:.1}% qualifying, target {:.1}%)",
            facts.len(),
            kept.len(),
            coverage(&kept, &predicate) * 100.0,
            target * 100.0
        );

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_domain::{EvidenceQuote, LineRange};
    use serde_json::{json, Map};

    fn fact(claim: &str, metadata: Value) -> Fact {
        let metadata: Map<String, Value> = match metadata {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Fact {
            claim: claim.to_string(),
            source_doc: "doc".to_string(),
            source_location: LineRange::single(1),
            evidence_quotes: vec![EvidenceQuote::new(claim, LineRange::single(1))],
            confidence: 0.8,
            metadata,
        }
    }

    fn quantitative(claim: &str) -> Fact {
        fact(claim, json!({"quantitative_values": ["90 days"]}))
    }

    fn processor() -> PostProcessor {
        PostProcessor::new(PostProcessConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_target_rejected() {
        let config = PostProcessConfig {
            target_fraction: 0.0,
            ..PostProcessConfig::default()
        };
        assert!(PostProcessor::new(config).is_err());
    }

    #[test]
    fn test_specific_fact_outscores_generic() {
        let pp = processor();
        let specific = fact(
            "Firewall rules are reviewed by the network team",
            json!({
                "fact_type": "technical_control",
                "specificity_score": 0.9,
                "entities": ["Palo Alto", "Panorama", "AWS"],
                "process_details": {"who": "network team", "when": "quarterly"}
            }),
        );
        let generic = fact(
            "Management maintains appropriate controls",
            json!({"fact_type": "organizational", "specificity_score": 0.2}),
        );

        // 1.8 + 1.5 + 1.0 + 0.5 = 4.8 vs 0.4 + 0.3 - 0.5 = 0.2
        assert!((pp.score(&specific) - 4.8).abs() < 1e-9);
        assert!((pp.score(&generic) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_test_only_detection() {
        let pp = processor();
        assert!(pp.is_test_only("No exceptions noted."));
        assert!(pp.is_test_only("Auditor inspected the sample and found no exceptions."));
        assert!(pp.is_test_only("Testing revealed no issues"));
        assert!(!pp.is_test_only("Inspection found no exceptions in quarterly access reviews"));
        assert!(!pp.is_test_only("Backups run daily at 2 AM"));

        let boilerplate = fact("No exceptions noted.", json!({"fact_type": "test_result"}));
        assert!((pp.score(&boilerplate) - (-1.5)).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_bonus() {
        let pp = processor();
        let mut f = fact("Logs are retained", json!({}));
        let base = pp.score(&f);
        f.confidence = 0.95;
        assert!((pp.score(&f) - base - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_filter_seven_of_thirty() {
        let pp = processor();
        let mut facts = Vec::new();
        for i in 0..30 {
            if i % 4 == 0 && facts.iter().filter(|f| has_quantitative_values(f)).count() < 7 {
                facts.push(quantitative(&format!("Quantitative fact {}", i)));
            } else {
                let specificity = (i % 10) as f64 / 10.0;
                facts.push(fact(
                    &format!("Qualitative fact {}", i),
                    json!({"specificity_score": specificity}),
                ));
            }
        }
        assert_eq!(facts.iter().filter(|f| has_quantitative_values(f)).count(), 7);

        let kept = pp.filter(&facts, 0.35, has_quantitative_values);

        assert_eq!(kept.len(), 20);
        assert_eq!(kept.iter().filter(|f| has_quantitative_values(f)).count(), 7);
        assert!(coverage(&kept, has_quantitative_values) >= 0.35);

        // Original order is preserved
        let positions: Vec<usize> = kept
            .iter()
            .map(|k| facts.iter().position(|f| f.claim == k.claim).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // The 13 best qualitative facts survive: every dropped one scores no higher
        let min_kept = kept
            .iter()
            .filter(|f| !has_quantitative_values(f))
            .map(|f| pp.score(f))
            .fold(f64::INFINITY, f64::min);
        for dropped in facts.iter().filter(|f| !kept.iter().any(|k| k.claim == f.claim)) {
            assert!(pp.score(dropped) <= min_kept);
        }
    }

    #[test]
    fn test_filter_ties_go_to_earlier_fact() {
        let pp = processor();
        let facts = vec![
            quantitative("q"),
            fact("a", json!({})),
            fact("b", json!({})),
            fact("c", json!({})),
        ];

        // floor(1 / 0.5) - 1 = 1 extra fact
        let kept = pp.filter(&facts, 0.5, has_quantitative_values);
        let claims: Vec<&str> = kept.iter().map(|f| f.claim.as_str()).collect();
        assert_eq!(claims, vec!["q", "a"]);
    }

    #[test]
    fn test_filter_without_qualifying_facts_is_identity() {
        let pp = processor();
        let facts = vec![fact("a", json!({})), fact("b", json!({}))];
        let kept = pp.filter_default(&facts, has_quantitative_values);
        assert_eq!(kept, facts);
    }

    #[test]
    fn test_filter_keeps_everything_when_target_already_met() {
        let pp = processor();
        let facts = vec![quantitative("q1"), fact("a", json!({})), quantitative("q2")];
        assert_eq!(pp.filter(&facts, 0.35, has_quantitative_values), facts);
    }

    #[test]
    fn test_coverage() {
        assert_eq!(coverage(&[], has_quantitative_values), 0.0);
        let facts = vec![quantitative("q"), fact("a", json!({}))];
        assert_eq!(coverage(&facts, has_quantitative_values), 0.5);
    }

    #[test]
    fn test_empty_quantitative_values_do_not_qualify() {
        assert!(!has_quantitative_values(&fact("a", json!({"quantitative_values": []}))));
        assert!(has_quantitative_values(&quantitative("b")));
    }
}
