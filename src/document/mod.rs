//! Parsing of the model's fenced YAML answer into a [`RewrittenDocument`].
//!
//! The answer is first cleaned by [`normalize::normalize`], then deserialized as
//! a YAML mapping. Any missing key, non-mapping root, or unbalanced structure is a
//! hard [`ParseError`]; no partial document is ever returned. A parse failure is
//! final for that article: the caller skips it and moves on.

pub mod normalize;

use crate::error::ParseError;
use crate::models::RewrittenDocument;
use tracing::debug;

/// Parse a raw model answer.
pub fn parse_document(raw: &str) -> Result<RewrittenDocument, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let cleaned = normalize::normalize(raw)?;
    debug!(bytes = cleaned.len(), "Normalized model answer");

    let doc: RewrittenDocument = serde_yaml::from_str(&cleaned)?;
    if doc.title.trim().is_empty() {
        return Err(ParseError::EmptyField("title"));
    }
    if doc.content.trim().is_empty() {
        return Err(ParseError::EmptyField("content"));
    }
    Ok(doc)
}
