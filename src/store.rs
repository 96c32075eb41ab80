//! Persistent state: the published-article log and the credential pool.
//!
//! A url counts as "seen" exactly when a row with that `original_link` exists in
//! the articles table; there is no separate seen-marking step. The API-key table
//! is read once per run and its row order is the fail-over order.

use crate::error::StorageError;
use crate::models::{Credential, ProviderKind, PublishedArticleRecord};
use async_trait::async_trait;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{PgPool, Row};
use tracing::{info, instrument, warn};

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

/// Set of previously processed article urls.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Return the urls from `candidates` that have never been recorded.
    ///
    /// Empty input yields an empty result without touching the store.
    async fn filter_new(&self, candidates: &[String]) -> Result<Vec<String>, StorageError>;

    /// Append one published article and return its row id.
    async fn record_published(&self, record: &PublishedArticleRecord) -> Result<i64, StorageError>;
}

/// Ordered source of generation credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All credentials in fail-over order. An empty vector is a valid answer.
    async fn load_all(&self) -> Result<Vec<Credential>, StorageError>;
}

/// Validate a table name before it is interpolated into SQL.
pub fn checked_table_name(name: &str) -> Result<&str, StorageError> {
    if IDENT_RE.is_match(name) {
        Ok(name)
    } else {
        Err(StorageError::InvalidTable(name.to_string()))
    }
}

/// The members of `fresh`, in the order they appear in `candidates`, without duplicates.
pub fn restore_order(candidates: &[String], fresh: &[String]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| fresh.contains(*c))
        .unique()
        .cloned()
        .collect()
}

/// Postgres-backed [`LinkStore`] and [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    articles_table: String,
    api_keys_table: String,
}

impl PgStore {
    pub async fn connect(
        database_url: &str,
        articles_table: &str,
        api_keys_table: &str,
    ) -> Result<Self, StorageError> {
        if database_url.trim().is_empty() {
            return Err(StorageError::Unavailable("database url is empty".into()));
        }
        let articles_table = checked_table_name(articles_table)?.to_string();
        let api_keys_table = checked_table_name(api_keys_table)?.to_string();
        let pool = PgPool::connect(database_url).await?;
        info!(%articles_table, %api_keys_table, "Connected to Postgres");
        Ok(Self {
            pool,
            articles_table,
            api_keys_table,
        })
    }

    /// Create both tables if they do not exist yet. Safe to run on every boot.
    #[instrument(level = "info", skip_all)]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                source VARCHAR(255),
                original_link TEXT,
                original_title TEXT,
                original_date VARCHAR(100),
                original_featured_image TEXT,
                original_blog_content TEXT,
                wp_content TEXT,
                new_title TEXT,
                keywords TEXT,
                wp_permalink TEXT,
                status TEXT,
                description TEXT,
                tags TEXT,
                category TEXT,
                summary TEXT,
                created_at TIMESTAMP DEFAULT NOW()
            )
            "#,
            self.articles_table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                email VARCHAR(255),
                api_key TEXT,
                api_source TEXT,
                created_at TIMESTAMP DEFAULT NOW()
            )
            "#,
            self.api_keys_table
        ))
        .execute(&self.pool)
        .await?;

        info!("Schema ready");
        Ok(())
    }
}

#[async_trait]
impl LinkStore for PgStore {
    #[instrument(level = "info", skip_all, fields(candidates = candidates.len()))]
    async fn filter_new(&self, candidates: &[String]) -> Result<Vec<String>, StorageError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT link FROM unnest($1::text[]) AS link EXCEPT SELECT original_link FROM {}",
            self.articles_table
        ))
        .bind(candidates)
        .fetch_all(&self.pool)
        .await?;

        let fresh: Vec<String> = rows.into_iter().map(|r| r.get("link")).collect();
        // EXCEPT loses ordering.
        let ordered = restore_order(candidates, &fresh);
        info!(new = ordered.len(), passed = candidates.len(), "Filtered new links");
        Ok(ordered)
    }

    #[instrument(level = "info", skip_all, fields(url = %record.original_link))]
    async fn record_published(&self, record: &PublishedArticleRecord) -> Result<i64, StorageError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                source, original_link, original_title, original_date,
                original_featured_image, original_blog_content, wp_content,
                new_title, keywords, tags, category, summary, created_at,
                wp_permalink, status, description
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), $13, $14, $15
            )
            RETURNING id
            "#,
            self.articles_table
        ))
        .bind(&record.source)
        .bind(&record.original_link)
        .bind(&record.original_title)
        .bind(&record.original_date)
        .bind(&record.original_featured_image)
        .bind(&record.original_blog_content)
        .bind(&record.wp_content)
        .bind(&record.new_title)
        .bind(&record.keywords)
        .bind(&record.tags)
        .bind(&record.category)
        .bind(&record.summary)
        .bind(&record.wp_permalink)
        .bind(&record.status)
        .bind(&record.description)
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = row.get("id");
        info!(id, "Article saved");
        Ok(i64::from(id))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    #[instrument(level = "info", skip_all)]
    async fn load_all(&self) -> Result<Vec<Credential>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT api_key, api_source FROM {} ORDER BY id ASC",
            self.api_keys_table
        ))
        .fetch_all(&self.pool)
        .await?;

        let credentials = rows
            .into_iter()
            .map(|r| {
                let secret: Option<String> = r.get("api_key");
                let source: Option<String> = r.get("api_source");
                Credential::new(
                    ProviderKind::from_label(source.as_deref().unwrap_or_default()),
                    secret.unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>();

        if credentials.is_empty() {
            warn!(table = %self.api_keys_table, "No API keys stored");
        } else {
            info!(count = credentials.len(), "Fetched API key records");
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_table_name() {
        assert!(checked_table_name("articles").is_ok());
        assert!(checked_table_name("_api_keys2").is_ok());
        assert!(checked_table_name("articles; DROP TABLE x").is_err());
        assert!(checked_table_name("").is_err());
        assert!(checked_table_name("2fast").is_err());
    }

    fn links(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_restore_order_follows_candidates() {
        let candidates = links(&["/a", "/b", "/c", "/d"]);
        let fresh = links(&["/d", "/b", "/a"]);
        assert_eq!(restore_order(&candidates, &fresh), links(&["/a", "/b", "/d"]));
    }

    #[test]
    fn test_restore_order_collapses_duplicates() {
        let candidates = links(&["/a", "/b", "/a", "/b"]);
        let fresh = links(&["/b", "/a"]);
        assert_eq!(restore_order(&candidates, &fresh), links(&["/a", "/b"]));
    }

    #[test]
    fn test_restore_order_empty_inputs() {
        assert!(restore_order(&links(&["/a"]), &[]).is_empty());
        assert!(restore_order(&[], &links(&["/a"])).is_empty());
    }
}
