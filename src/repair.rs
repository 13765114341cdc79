//! Repair of near-JSON text produced by language models.
//!
//! Models asked for JSON routinely emit unquoted keys, single-quoted strings,
//! dangling commas, truncated documents or values left blank. [`repair_json`]
//! parses such text with a tolerant grammar into an intermediate tree and
//! writes the tree back as strict JSON.

#[path = "repair/node.rs"]
mod node;

#[path = "repair/parser.rs"]
mod parser;

#[path = "repair/writer.rs"]
mod writer;

use thiserror::Error;

/// Maximum nesting of objects and arrays accepted by the tolerant parser.
pub const MAX_DEPTH: usize = 512;

/// Reasons a text blob cannot be turned into JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    /// Nothing but whitespace was supplied
    #[error("empty input: no JSON structure to recover")]
    EmptyInput,
    /// A character that no repair rule accounts for
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    /// Objects/arrays nested beyond [`MAX_DEPTH`]
    #[error("nesting deeper than {limit} levels at position {position}")]
    TooDeep { limit: usize, position: usize },
}

/// Repairs `input` into syntactically valid JSON text.
///
/// Input that already is strict JSON is returned unchanged. Anything else is
/// re-serialized canonically: `": "` after keys, `", "` between members and no
/// other whitespace. Member order and numeric literals are kept as written.
///
/// ```
/// use llm_eval::repair::repair_json;
///
/// assert_eq!(repair_json("{name: 'John', age: }").unwrap(), r#"{"name": "John", "age": null}"#);
/// assert_eq!(repair_json(r#"{"name":"John"}"#).unwrap(), r#"{"name":"John"}"#);
/// ```
pub fn repair_json(input: &str) -> Result<String, RepairError> {
    if input.trim().is_empty() {
        return Err(RepairError::EmptyInput);
    }
    if serde_json::from_str::<serde::de::IgnoredAny>(input).is_ok() {
        return Ok(input.to_string());
    }

    let tree = parser::parse(input)?;
    let mut repaired = String::with_capacity(input.len() + 8);
    writer::write_node(&tree, &mut repaired);
    log::debug!(
        "repaired model output ({} -> {} bytes)",
        input.len(),
        repaired.len()
    );
    Ok(repaired)
}
