//! Filter command implementation.

use super::consolidate::write_json;
use super::read_facts;
use crate::cli::FilterArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use attest_extractor::{coverage, has_quantitative_values, PostProcessor};
use std::path::{Path, PathBuf};

/// Execute the filter command.
pub fn execute_filter(args: FilterArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let (consolidation, facts) = read_facts(&args.input)?;

    let mut postprocess = config.extractor.postprocess.clone();
    if let Some(target) = args.target {
        postprocess.target_fraction = target;
    }
    let processor = PostProcessor::new(postprocess).map_err(|e| CliError::InvalidInput(e.to_string()))?;

    let kept = processor.filter_default(&facts, has_quantitative_values);
    let before = coverage(&facts, has_quantitative_values);
    let after = coverage(&kept, has_quantitative_values);

    let output = args.output.unwrap_or_else(|| filtered_path(&args.input));
    match consolidation {
        Some(mut consolidation) => {
            consolidation.total_facts = kept.len();
            consolidation.facts = kept.clone();
            write_json(&output, &consolidation)?;
        }
        None => write_json(&output, &kept)?,
    }

    println!(
        "{}",
        formatter.success(&format!(
            "Kept {} of {} facts; quantitative coverage {:.1}% -> {:.1}%",
            kept.len(),
            facts.len(),
            before * 100.0,
            after * 100.0
        ))
    );
    println!("{}", formatter.info(&format!("Wrote {}", output.display())));

    Ok(())
}

/// `<dir>/<stem>_filtered.json` next to the input file.
fn filtered_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "facts".to_string());
    input.with_file_name(format!("{}_filtered.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use attest_domain::{EvidenceQuote, Fact, LineRange};
    use serde_json::{json, Map, Value};
    use std::fs;

    fn fact(claim: &str, metadata: Value) -> Fact {
        let metadata: Map<String, Value> = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Fact {
            claim: claim.to_string(),
            source_doc: "policy.txt".to_string(),
            source_location: LineRange::single(1),
            evidence_quotes: vec![EvidenceQuote::new(claim, LineRange::single(1))],
            confidence: 0.8,
            metadata,
        }
    }

    #[test]
    fn test_filtered_path() {
        assert_eq!(
            filtered_path(Path::new("out/consolidated_facts.json")),
            PathBuf::from("out/consolidated_facts_filtered.json")
        );
    }

    #[test]
    fn test_filter_fact_list() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("facts.json");
        let mut facts = vec![fact(
            "Passwords expire every 90 days",
            json!({"quantitative_values": ["90 days"]}),
        )];
        for i in 0..9 {
            facts.push(fact(&format!("Personnel follow appropriate policy {}", i), json!({})));
        }
        fs::write(&input, serde_json::to_string(&facts).unwrap()).unwrap();

        let args = FilterArgs { input: input.clone(), target: Some(0.5), output: None };
        let formatter = Formatter::new(OutputFormat::Table, false);
        execute_filter(args, &Config::default(), &formatter).unwrap();

        let written: Vec<Fact> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("facts_filtered.json")).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].claim, "Passwords expire every 90 days");
    }

    #[test]
    fn test_invalid_target_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("facts.json");
        fs::write(&input, "[]").unwrap();

        let args = FilterArgs { input, target: Some(1.5), output: None };
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert!(matches!(
            execute_filter(args, &Config::default(), &formatter),
            Err(CliError::InvalidInput(_))
        ));
    }
}
