//! Data models flowing through the publishing pipeline.
//!
//! - [`ArticleLink`]: a candidate article discovered on the source's archive pages
//! - [`ArticleBody`]: the fetched page of one article
//! - [`Credential`] / [`ProviderKind`]: generation credentials in fail-over order
//! - [`RewriteRequest`] / [`RewriteResult`]: input and output of the rewrite engine
//! - [`RewrittenDocument`]: the model's structured answer after parsing
//! - [`PublishOutcome`] / [`PublishedArticleRecord`]: what the CMS returned and what gets stored
//!
//! The YAML field names of [`RewrittenDocument`] are snake_case to match the schema
//! requested in the rewrite prompt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate article link. Identity is the `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub title: String,
    pub url: String,
    /// The listing date, formatted with the pipeline's date format.
    pub published_date: String,
}

/// A fetched article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleBody {
    pub title: String,
    pub image: Option<String>,
    pub image_alt: String,
    pub date_posted: Option<String>,
    /// Raw `<body>` HTML handed to the model.
    pub article_html: String,
}

/// How a category's archive page is laid out on the source site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Grid,
    List,
}

/// A news category processed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub layout: LayoutKind,
}

impl Category {
    pub fn new(name: impl Into<String>, layout: LayoutKind) -> Self {
        Self {
            name: name.into(),
            layout,
        }
    }
}

/// Which generation backend a credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenRouter,
    Gemini,
    /// A source label no provider is registered for. Skipped at rewrite time.
    Unknown(String),
}

impl ProviderKind {
    /// Map the stored `api_source` label to a provider kind (case-insensitive).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "open router" | "openrouter" | "open-router" => ProviderKind::OpenRouter,
            "gemini" => ProviderKind::Gemini,
            other => ProviderKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenRouter => write!(f, "open router"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Unknown(label) => write!(f, "unknown({label})"),
        }
    }
}

/// A provider secret. Position in the pool defines fail-over priority.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: ProviderKind,
    pub secret: String,
}

impl Credential {
    pub fn new(provider: ProviderKind, secret: impl Into<String>) -> Self {
        Self {
            provider,
            secret: secret.into(),
        }
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("secret", &if self.secret.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

/// Input to the rewrite engine.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub raw_content: String,
    pub category: String,
}

/// Outcome of the rewrite engine. Carries no partial data on failure, and never
/// says which credential produced the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteResult {
    Success { text: String },
    Failure,
}

impl RewriteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RewriteResult::Success { .. })
    }

    pub fn into_answer(self) -> Option<String> {
        match self {
            RewriteResult::Success { text } => Some(text),
            RewriteResult::Failure => None,
        }
    }
}

/// The structured article produced by the model.
///
/// Every field is required; a missing key fails deserialization as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenDocument {
    pub original_title: String,
    pub category: String,
    pub title: String,
    pub featured_image: String,
    pub focus_keyphrase: String,
    pub meta_description: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub content: String,
}

impl RewrittenDocument {
    /// Tags as hashtags, space separated (`#a #b`).
    pub fn hashtags(&self) -> String {
        self.tags
            .iter()
            .map(|t| format!("#{t}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the CMS reported after publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub link: String,
    pub status: String,
}

/// One row of the article log. Its `original_link` is what marks a url as seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArticleRecord {
    pub source: String,
    pub original_link: String,
    pub original_title: String,
    /// RFC 3339 time the article was processed.
    pub original_date: String,
    pub original_featured_image: String,
    pub original_blog_content: String,
    pub wp_content: String,
    pub new_title: String,
    /// JSON array text.
    pub keywords: String,
    /// JSON array text.
    pub tags: String,
    /// JSON string text.
    pub summary: String,
    pub category: String,
    pub wp_permalink: String,
    pub status: String,
    pub description: String,
}

impl PublishedArticleRecord {
    /// Assemble the stored record from every stage's output.
    pub fn assemble(
        source: &str,
        link: &ArticleLink,
        body: &ArticleBody,
        doc: &RewrittenDocument,
        category: &str,
        outcome: &PublishOutcome,
        processed_at: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            source: source.to_string(),
            original_link: link.url.clone(),
            original_title: doc.original_title.clone(),
            original_date: processed_at.to_string(),
            original_featured_image: doc.featured_image.clone(),
            original_blog_content: body.article_html.clone(),
            wp_content: doc.content.clone(),
            new_title: doc.title.clone(),
            keywords: serde_json::to_string(&doc.keywords)?,
            tags: serde_json::to_string(&doc.tags)?,
            summary: serde_json::to_string(&doc.summary)?,
            category: category.to_string(),
            wp_permalink: outcome.link.clone(),
            status: outcome.status.clone(),
            description: outcome.status.clone(),
        })
    }
}

/// Aggregate counts reported by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub links_fetched: usize,
    pub new_links: usize,
    pub published: usize,
    pub failed: usize,
    pub announcements: usize,
}

#[cfg(test)]
pub(crate) fn sample_document(title: &str) -> RewrittenDocument {
    RewrittenDocument {
        original_title: format!("Original {title}"),
        category: "soccer".to_string(),
        title: title.to_string(),
        featured_image: "https://images.example.com/a.jpg".to_string(),
        focus_keyphrase: "transfer news".to_string(),
        meta_description: "A description".to_string(),
        tags: vec!["Arsenal".to_string(), "PremierLeague".to_string()],
        keywords: vec!["arsenal".to_string()],
        summary: format!("Summary of {title}"),
        content: "<!-- wp:paragraph --><p>Body</p><!-- /wp:paragraph -->".to_string(),
    }
}
