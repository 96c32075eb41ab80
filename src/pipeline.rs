//! The publish orchestrator.
//!
//! One run walks the configured categories in order. For each category:
//!
//! ```text
//! fetch links -> filter new -> for each new link, one at a time:
//!     fetch body -> rewrite -> parse -> publish -> persist -> announce?
//! ```
//!
//! Failures are contained to the smallest unit that owns them. A category whose
//! links cannot be fetched or filtered is skipped; an article failing any step is
//! skipped (and stays unseen, so the next run retries it); announcement failures
//! are only logged. A run always returns a [`RunReport`].

use crate::announce::{Announcement, AnnouncementBatcher};
use crate::config::PipelineConfig;
use crate::document::parse_document;
use crate::error::PipelineError;
use crate::models::{
    ArticleLink, Category, Credential, PublishOutcome, PublishedArticleRecord, RewriteRequest,
    RewrittenDocument, RunReport,
};
use crate::publishers::{CmsPublisher, SocialPublisher};
use crate::rewrite::RewriteEngine;
use crate::scheduler::ScheduledJob;
use crate::scrapers::SourceProvider;
use crate::store::{CredentialStore, LinkStore};
use async_trait::async_trait;
use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub struct Pipeline {
    source: Arc<dyn SourceProvider>,
    links: Arc<dyn LinkStore>,
    credentials: Arc<dyn CredentialStore>,
    engine: RewriteEngine,
    cms: Arc<dyn CmsPublisher>,
    /// `None` disables announcements.
    social: Option<Arc<dyn SocialPublisher>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        links: Arc<dyn LinkStore>,
        credentials: Arc<dyn CredentialStore>,
        engine: RewriteEngine,
        cms: Arc<dyn CmsPublisher>,
        social: Option<Arc<dyn SocialPublisher>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            links,
            credentials,
            engine,
            cms,
            social,
            config,
        }
    }

    /// Today's date as the source prints it.
    pub fn today(&self) -> String {
        self.config.format_date(Local::now().date_naive())
    }

    /// Process every category for `date` (formatted with the configured date format).
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, date: &str) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport::default();
        let mut batcher = AnnouncementBatcher::new(self.config.announcement_batch_size);

        let pool = match self.credentials.load_all().await {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, "Could not load credentials; every rewrite will fail");
                Vec::new()
            }
        };
        info!(credentials = pool.len(), "Credential pool loaded");

        for category in &self.config.categories {
            if let Err(e) = self
                .run_category(category, date, &pool, &mut batcher, &mut report)
                .await
            {
                warn!(category = %category.name, error = %e, "Category skipped");
            }
        }

        debug!(pending = batcher.pending(), "Categories done");
        if let Some(rest) = batcher.finish() {
            info!(title = %rest.title, "Flushing final announcement batch");
            self.announce(rest, &mut report).await;
        }

        info!(
            links_fetched = report.links_fetched,
            new_links = report.new_links,
            published = report.published,
            failed = report.failed,
            announcements = report.announcements,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Run complete"
        );
        report
    }

    #[instrument(level = "info", skip_all, fields(category = %category.name))]
    async fn run_category(
        &self,
        category: &Category,
        date: &str,
        pool: &[Credential],
        batcher: &mut AnnouncementBatcher,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let links = self.source.fetch_links(date, category).await?;
        report.links_fetched += links.len();

        let urls: Vec<String> = links.iter().map(|l| l.url.clone()).collect();
        let fresh = self.links.filter_new(&urls).await?;
        report.new_links += fresh.len();
        info!(fetched = links.len(), new = fresh.len(), "Links filtered");

        for url in &fresh {
            let Some(link) = links.iter().find(|l| &l.url == url) else {
                continue;
            };
            match self.process_article(link, category, pool).await {
                Ok((doc, outcome)) => {
                    report.published += 1;
                    for announcement in batcher.record(&doc, &outcome.link) {
                        self.announce(announcement, report).await;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(url = %link.url, error = %e, "Article skipped");
                }
            }
        }
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(url = %link.url))]
    async fn process_article(
        &self,
        link: &ArticleLink,
        category: &Category,
        pool: &[Credential],
    ) -> Result<(RewrittenDocument, PublishOutcome), PipelineError> {
        let body = self.source.fetch_article_body(&link.url).await?;

        let request = RewriteRequest {
            raw_content: body.article_html.clone(),
            category: category.name.clone(),
        };
        let answer = self
            .engine
            .rewrite(&request, pool)
            .await
            .into_answer()
            .ok_or(PipelineError::GenerationExhausted)?;

        let doc = parse_document(&answer)?;
        debug!(title = %doc.title, tags = doc.tags.len(), "Parsed rewritten document");

        let outcome = self.cms.publish(&doc).await?;

        let record = PublishedArticleRecord::assemble(
            &self.config.source_label,
            link,
            &body,
            &doc,
            &category.name,
            &outcome,
            &Utc::now().to_rfc3339(),
        )?;
        let id = self.links.record_published(&record).await?;
        info!(id, permalink = %outcome.link, "Article saved");

        Ok((doc, outcome))
    }

    async fn announce(&self, announcement: Announcement, report: &mut RunReport) {
        let Some(social) = &self.social else {
            debug!(title = %announcement.title, "Announcements disabled; skipping");
            return;
        };
        match social
            .post_with_image(
                &announcement.title,
                &announcement.text,
                announcement.image_url.as_deref(),
            )
            .await
        {
            Ok(()) => {
                report.announcements += 1;
                info!(kind = ?announcement.kind, title = %announcement.title, "Announcement posted");
            }
            Err(e) => {
                warn!(kind = ?announcement.kind, title = %announcement.title, error = %e, "Announcement failed")
            }
        }
    }
}

#[async_trait]
impl ScheduledJob for Pipeline {
    async fn run(&self) {
        let today = self.today();
        Pipeline::run(self, &today).await;
    }
}
