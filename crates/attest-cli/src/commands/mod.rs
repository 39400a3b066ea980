//! Command implementations.

pub mod consolidate;
pub mod extract;
pub mod filter;
pub mod status;
pub mod validate;

pub use self::consolidate::execute_consolidate;
pub use self::extract::execute_extract;
pub use self::filter::execute_filter;
pub use self::status::execute_status;
pub use self::validate::execute_validate;

use crate::error::{CliError, Result};
use attest_domain::{Consolidation, Fact};
use std::fs;
use std::path::Path;

/// Read facts from a consolidated file or a bare JSON array of facts.
pub(crate) fn read_facts(path: &Path) -> Result<(Option<Consolidation>, Vec<Fact>)> {
    let contents = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;

    if value.is_array() {
        let facts: Vec<Fact> = serde_json::from_value(value)?;
        return Ok((None, facts));
    }
    if value.get("facts").is_some() {
        let consolidation: Consolidation = serde_json::from_value(value)?;
        let facts = consolidation.facts.clone();
        return Ok((Some(consolidation), facts));
    }

    Err(CliError::InvalidInput(format!(
        "{} holds neither a fact list nor a consolidated document",
        path.display()
    )))
}
