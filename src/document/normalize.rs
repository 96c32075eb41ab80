//! Text cleanup applied to model answers before YAML parsing.
//!
//! Stages run in a fixed order ([`STAGES`]); each is a plain function so it can be
//! tested on its own:
//!
//! 1. [`strip_fences_and_sentinels`]: drop model sentinel tokens, then unwrap the
//!    ```` ```yaml ```` fence (an opening fence without a closing one is an error)
//! 2. [`normalize_quotes`]: curly quotes to ASCII
//! 3. [`strip_trailing_markers`]: stray backticks left at the very end
//! 4. [`normalize_line_endings`]: CRLF / CR to LF

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinels glued to a fence, e.g. ```` ```<｜begin▁of▁sentence｜> ````.
static FENCED_SENTINEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```<[^>\n]*>").unwrap());
/// Bare DeepSeek/OpenRouter sentinels, e.g. `<｜end▁of▁sentence｜>`.
static SENTINEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<｜[^｜\n]*｜>").unwrap());
/// Opening fence with an optional language tag, up to the end of its line.
static OPENING_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```[ \t]*(?:yaml|yml)?[ \t]*(?:\r?\n|$)").unwrap());

pub type Stage = fn(&str) -> Result<String, ParseError>;

/// The normalization pipeline, in application order.
pub const STAGES: [(&str, Stage); 4] = [
    ("strip_fences_and_sentinels", strip_fences_and_sentinels),
    ("normalize_quotes", normalize_quotes),
    ("strip_trailing_markers", strip_trailing_markers),
    ("normalize_line_endings", normalize_line_endings),
];

/// Run every stage in order.
pub fn normalize(raw: &str) -> Result<String, ParseError> {
    STAGES
        .iter()
        .try_fold(raw.to_string(), |text, (_, stage)| stage(&text))
}

pub fn strip_fences_and_sentinels(text: &str) -> Result<String, ParseError> {
    let without_fenced = FENCED_SENTINEL_RE.replace_all(text, "```");
    let cleaned = SENTINEL_RE.replace_all(&without_fenced, "");
    let trimmed = cleaned.trim();

    let Some(opening) = OPENING_FENCE_RE.find(trimmed) else {
        // No fence at all: treat the answer as bare YAML.
        return Ok(trimmed.to_string());
    };
    let body = &trimmed[opening.end()..];
    let Some(close) = body.rfind("```") else {
        return Err(ParseError::UnterminatedFence);
    };
    Ok(body[..close].trim().to_string())
}

pub fn normalize_quotes(text: &str) -> Result<String, ParseError> {
    Ok(text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect())
}

pub fn strip_trailing_markers(text: &str) -> Result<String, ParseError> {
    Ok(text
        .trim_end_matches(|c: char| c == '`' || c.is_whitespace())
        .to_string())
}

pub fn normalize_line_endings(text: &str) -> Result<String, ParseError> {
    Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
}
