//! News source scrapers.
//!
//! Each source follows the same two-phase pattern:
//!
//! 1. **Listing**: discover the day's article links for a category
//! 2. **Fetching**: download one article page and pull out its metadata and body
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Sports Illustrated | [`si`] | archive-page HTML scraping |

pub mod si;

use crate::error::SourceError;
use crate::models::{ArticleBody, ArticleLink, Category};
use async_trait::async_trait;

/// A site the pipeline pulls articles from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Links listed for `category` on `date` (formatted with the pipeline date format).
    async fn fetch_links(&self, date: &str, category: &Category) -> Result<Vec<ArticleLink>, SourceError>;

    /// Fetch a single article page.
    async fn fetch_article_body(&self, url: &str) -> Result<ArticleBody, SourceError>;
}
