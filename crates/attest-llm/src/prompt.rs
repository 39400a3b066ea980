//! LLM prompt engineering for fact extraction and quote recovery

use attest_domain::{DocumentContext, LineRange};

/// Builds the per-chunk fact extraction prompt
pub struct ExtractionPrompt<'a> {
    chunk_text: &'a str,
    range: LineRange,
    context: &'a DocumentContext,
}

impl<'a> ExtractionPrompt<'a> {
    /// Create a new prompt builder for a chunk covering `range`
    pub fn new(chunk_text: &'a str, range: LineRange, context: &'a DocumentContext) -> Self {
        Self {
            chunk_text,
            range,
            context,
        }
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Document: {}\n", self.context.source_doc));
        prompt.push_str(&format!("Chunk: {}\n\n", self.range));

        if let Some(summary) = &self.context.summary {
            prompt.push_str("Document summary (for context only, do not quote it):\n");
            prompt.push_str(summary.trim());
            prompt.push_str("\n\n");
        }

        // Every line carries its absolute number so quotes can cite locations
        prompt.push_str("Text to analyze:\n---\n");
        for (offset, line) in self.chunk_text.lines().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", self.range.start + offset, line));
        }
        prompt.push_str("---\n\n");

        prompt.push_str(EXTRACTION_OUTPUT_FORMAT);
        prompt
    }
}

/// Builds the quote recovery prompt for a near-miss quote
pub struct RecoveryPrompt<'a> {
    claim: &'a str,
    original_quote: &'a str,
    window_text: &'a str,
    window: LineRange,
}

impl<'a> RecoveryPrompt<'a> {
    /// Create a new recovery prompt builder
    pub fn new(claim: &'a str, original_quote: &'a str, window_text: &'a str, window: LineRange) -> Self {
        Self {
            claim,
            original_quote,
            window_text,
            window,
        }
    }

    /// Build the complete recovery prompt
    pub fn build(&self) -> String {
        format!(
            "{}\n\nClaim: {}\n\nOriginal quote (not found verbatim): {}\n\nContext ({}):\n---\n{}\n---\n\n{}",
            RECOVERY_INSTRUCTIONS,
            self.claim,
            self.original_quote,
            self.window,
            self.window_text,
            RECOVERY_OUTPUT_FORMAT
        )
    }
}

/// Characters of the document shown to the summarizer
pub const SUMMARY_INPUT_CHARS: usize = 30_000;

/// Builds the whole-document summary prompt
pub struct SummaryPrompt<'a> {
    document_text: &'a str,
    document_name: &'a str,
}

impl<'a> SummaryPrompt<'a> {
    /// Create a summary prompt for `document_name`
    pub fn new(document_text: &'a str, document_name: &'a str) -> Self {
        Self {
            document_text,
            document_name,
        }
    }

    /// Build the prompt; only the first [`SUMMARY_INPUT_CHARS`] characters are included
    pub fn build(&self) -> String {
        let excerpt = match self.document_text.char_indices().nth(SUMMARY_INPUT_CHARS) {
            Some((cut, _)) => &self.document_text[..cut],
            None => self.document_text,
        };
        format!(
            "{}\n\nDocument: {}\n\nDocument text (first {} characters):\n---\n{}\n---\n\n{}",
            SUMMARY_INSTRUCTIONS, self.document_name, SUMMARY_INPUT_CHARS, excerpt, SUMMARY_OUTPUT_FORMAT
        )
    }
}

const SUMMARY_INSTRUCTIONS: &str = r#"Analyze this document and write a structural summary that will guide fact extraction from its chunks.

Describe:
- document_type: the specific kind of document (SOC 2 Type II report, penetration test, security policy, architecture doc)
- structural_pattern: how it is organized and which elements repeat (controls, findings, requirements)
- section_headings: 8-12 major headings or control categories
- table_structure: column layout of any tables, or null
- key_entities: important systems, organizations and technologies
- scope: timeframe, systems and boundaries covered
- extraction_guidance: which facts matter most; always WHO performs a control, WHEN or how often, WHAT tools, and quantitative values"#;

const SUMMARY_OUTPUT_FORMAT: &str = r#"Respond with ONLY a JSON object using the keys above."#;

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract discrete, atomic, source-verifiable facts from the following document chunk.

Rules:
- One idea per fact; if a sentence holds several technical details, emit one fact per detail
- Every fact needs at least one evidence quote copied WORD FOR WORD from the text
- Cite each quote's location with the bracketed line numbers, e.g. "Lines 120-121"
- Never quote the document summary, only the text between the --- markers
- Prefer specific facts (named tools, versions, frequencies, thresholds) over generic ones
- Put numbers with units, percentages, frequencies and thresholds in quantitative_values

Metadata for each fact:
- fact_type: technical_control, organizational, process, metric, test_result, architecture or compliance
- specificity_score: 0.0 (generic) to 1.0 (names exact tools, values, versions)
- entities: named tools, technologies, protocols, standards, vendors
- quantitative_values: numbers, percentages, timeframes, ranges
- process_details: {"who": "role", "when": "frequency", "how": "procedure"} for process facts"#;

const EXTRACTION_OUTPUT_FORMAT: &str = r#"Output format (JSON array only, no additional text):
[
  {
    "claim": "atomic factual statement",
    "evidence_quotes": [
      {"quote": "exact text", "source_location": "Lines N-M", "relevance": "why it supports the claim"}
    ],
    "confidence": 0.0-1.0,
    "metadata": {
      "fact_type": "technical_control",
      "specificity_score": 0.0-1.0,
      "entities": [],
      "quantitative_values": [],
      "process_details": {}
    }
  }
]

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const RECOVERY_INSTRUCTIONS: &str = r#"A fact was extracted but its evidence quote could not be found verbatim in the source.

Your task:
1. Search the context for text that DIRECTLY supports the claim
2. Copy the EXACT quote (word for word) from the context
3. If the context does not support the claim, report that nothing was found"#;

const RECOVERY_OUTPUT_FORMAT: &str = r#"Respond with ONLY a JSON object:
{
  "found": true/false,
  "quote": "exact quote from context if found",
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation"
}"#;
