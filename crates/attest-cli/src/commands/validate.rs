//! Validate command implementation.

use super::consolidate::write_json;
use super::read_facts;
use crate::cli::ValidateArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::{Formatter, QuoteCheck};
use attest_domain::traits::QuoteRecoverer;
use attest_domain::{Fact, LineRange, ProviderError, RecoveredQuote, SourceDocument};
use attest_gatekeeper::{QuoteMatch, Validator};
use std::fs;

/// Recoverer for offline checks; never finds anything.
struct NoRecovery;

impl QuoteRecoverer for NoRecovery {
    fn recover(
        &self,
        _claim: &str,
        _original_quote: &str,
        _window_text: &str,
        _window_range: LineRange,
    ) -> std::result::Result<Option<RecoveredQuote>, ProviderError> {
        Ok(None)
    }
}

/// Execute the validate command.
pub fn execute_validate(args: ValidateArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let (_, facts) = read_facts(&args.input)?;
    let text = fs::read_to_string(&args.text_file)?;
    let source = SourceDocument::from_text(args.text_file.display().to_string(), &text);

    let mut validation = config.extractor.validation.clone();
    validation.enable_recovery = false;
    let validator = Validator::new(validation, NoRecovery).map_err(|e| CliError::Config(e.to_string()))?;

    let checks = check_facts(&validator, &facts, &source);
    let invalid = checks.iter().filter(|c| !c.is_valid()).count();

    if let Some(path) = &args.output {
        write_json(path, &checks)?;
        println!("{}", formatter.info(&format!("Report written to {}", path.display())));
    }

    let shown: Vec<QuoteCheck> = if args.invalid_only {
        checks.iter().filter(|c| !c.is_valid()).cloned().collect()
    } else {
        checks.clone()
    };
    println!("{}", formatter.format_checks(&shown)?);

    let summary = format!(
        "{} of {} quotes valid across {} facts",
        checks.len() - invalid,
        checks.len(),
        facts.len()
    );
    if invalid == 0 {
        println!("{}", formatter.success(&summary));
    } else {
        println!("{}", formatter.warning(&summary));
    }

    Ok(())
}

/// Locate every evidence quote of every fact in `source`.
fn check_facts<R>(validator: &Validator<R>, facts: &[Fact], source: &SourceDocument) -> Vec<QuoteCheck>
where
    R: QuoteRecoverer + 'static,
{
    let mut checks = Vec::new();
    for (fact_index, fact) in facts.iter().enumerate() {
        for quote in &fact.evidence_quotes {
            let (matched_location, score, status) = match validator.locate(quote, source) {
                QuoteMatch::Found { location, score } => (Some(location.to_string()), score, "valid"),
                QuoteMatch::NearMiss { best_score } => (None, best_score, "near_miss"),
                QuoteMatch::Missing { best_score } => (None, best_score, "missing"),
            };
            checks.push(QuoteCheck {
                fact_index,
                claim: fact.claim.clone(),
                quote: quote.quote.clone(),
                claimed_location: quote.source_location.to_string(),
                matched_location,
                score,
                status,
            });
        }
    }
    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_domain::EvidenceQuote;
    use attest_gatekeeper::ValidationConfig;
    use serde_json::Map;

    const SOURCE: &str = "Access Control\nMulti-factor authentication is required for all remote access.\nBackups run daily at 2 AM.\n";

    fn fact(quote: &str, line: usize) -> Fact {
        Fact {
            claim: "claim".to_string(),
            source_doc: "report.txt".to_string(),
            source_location: LineRange::single(line),
            evidence_quotes: vec![EvidenceQuote::new(quote, LineRange::single(line))],
            confidence: 0.9,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_check_facts_classifies_quotes() {
        let validator = Validator::new(ValidationConfig::default(), NoRecovery).unwrap();
        let source = SourceDocument::from_text("report.txt", SOURCE);
        let facts = vec![
            fact("Backups run daily at 2 AM.", 3),
            fact("Encryption keys rotate every quarter under the vault policy.", 2),
        ];

        let checks = check_facts(&validator, &facts, &source);
        assert_eq!(checks.len(), 2);
        assert!(checks[0].is_valid());
        assert_eq!(checks[0].matched_location.as_deref(), Some("Lines 3-3"));
        assert!(!checks[1].is_valid());
        assert_eq!(checks[1].fact_index, 1);
    }

    #[test]
    fn test_execute_validate_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("facts.json");
        let text_file = dir.path().join("report.txt");
        let output = dir.path().join("report.json");
        fs::write(&input, serde_json::to_string(&vec![fact("Backups run daily at 2 AM.", 3)]).unwrap()).unwrap();
        fs::write(&text_file, SOURCE).unwrap();

        let args = ValidateArgs { input, text_file, invalid_only: true, output: Some(output.clone()) };
        let formatter = Formatter::new(crate::config::OutputFormat::Table, false);
        execute_validate(args, &Config::default(), &formatter).unwrap();

        let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(report[0]["status"], "valid");
    }
}
