//! In-memory fakes for every collaborator seam, shared by the unit tests.

use crate::api::GenerationProvider;
use crate::error::{AnnouncementError, GenerationError, PublishError, SourceError, StorageError};
use crate::models::{
    ArticleBody, ArticleLink, Category, Credential, ProviderKind, PublishOutcome,
    PublishedArticleRecord, RewrittenDocument,
};
use crate::publishers::{CmsPublisher, SocialPublisher};
use crate::scrapers::SourceProvider;
use crate::store::{CredentialStore, LinkStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// What a [`FakeProvider`] answers.
#[derive(Debug, Clone)]
pub enum Script {
    /// Every call fails with the produced error.
    Always(fn() -> GenerationError),
    /// The first `failures` calls fail transiently, then `answer` is returned.
    FailThenAnswer { failures: usize, answer: String },
    /// Every call returns an empty string.
    Empty,
    /// Every call returns a well-formed YAML document titled after the content.
    Document,
}

#[derive(Debug)]
pub struct FakeProvider {
    kind: ProviderKind,
    script: Script,
    seen: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind, script: Script) -> Self {
        Self {
            kind,
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn secrets_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

/// A fenced answer shaped like real model output.
pub fn yaml_answer(title: &str) -> String {
    format!(
        r#"```yaml
original_title: "Original {title}"
category: "soccer"
title: "{title}"
featured_image: "https://images.example.com/{title}.jpg"
focus_keyphrase: "soccer news"
meta_description: "Meta for {title}"
tags:
  - Soccer
  - Transfers
keywords:
  - soccer
summary: "Summary of {title}"
content: |
  <!-- wp:paragraph --><p>{title}</p><!-- /wp:paragraph -->
```"#
    )
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind.clone()
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        content: &str,
        secret: &str,
    ) -> Result<String, GenerationError> {
        let call_no = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(secret.to_string());
            seen.len()
        };
        match &self.script {
            Script::Always(make) => Err(make()),
            Script::FailThenAnswer { failures, answer } => {
                if call_no <= *failures {
                    Err(GenerationError::Status {
                        status: 503,
                        message: "upstream overloaded".into(),
                    })
                } else {
                    Ok(answer.clone())
                }
            }
            Script::Empty => Ok(String::new()),
            Script::Document => Ok(yaml_answer(content)),
        }
    }
}

/// Link log and credential pool kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub seen: Mutex<HashSet<String>>,
    pub records: Mutex<Vec<PublishedArticleRecord>>,
    pub credentials: Vec<Credential>,
    pub fail_filter: bool,
    pub fail_record: bool,
}

impl MemoryStore {
    pub fn mark_seen(&self, url: &str) {
        self.seen.lock().unwrap().insert(url.to_string());
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn filter_new(&self, candidates: &[String]) -> Result<Vec<String>, StorageError> {
        if self.fail_filter {
            return Err(StorageError::Unavailable("filter offline".into()));
        }
        let seen = self.seen.lock().unwrap();
        let mut out: Vec<String> = Vec::new();
        for c in candidates {
            if !seen.contains(c) && !out.contains(c) {
                out.push(c.clone());
            }
        }
        Ok(out)
    }

    async fn record_published(&self, record: &PublishedArticleRecord) -> Result<i64, StorageError> {
        if self.fail_record {
            return Err(StorageError::Unavailable("insert offline".into()));
        }
        self.seen.lock().unwrap().insert(record.original_link.clone());
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(records.len() as i64)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Credential>, StorageError> {
        Ok(self.credentials.clone())
    }
}

/// Source provider answering from canned listings and bodies.
#[derive(Debug, Default)]
pub struct FakeSource {
    pub links: HashMap<String, Vec<ArticleLink>>,
    pub failing_categories: HashSet<String>,
    pub failing_bodies: HashSet<String>,
    pub bodies_fetched: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_links(category: &str, urls: &[&str]) -> Self {
        let mut source = Self::default();
        source.add_links(category, urls);
        source
    }

    pub fn add_links(&mut self, category: &str, urls: &[&str]) {
        let links = urls
            .iter()
            .map(|u| ArticleLink {
                title: format!("Listing {u}"),
                url: u.to_string(),
                published_date: "October 17, 2026".into(),
            })
            .collect();
        self.links.insert(category.to_string(), links);
    }
}

#[async_trait]
impl SourceProvider for FakeSource {
    async fn fetch_links(&self, _date: &str, category: &Category) -> Result<Vec<ArticleLink>, SourceError> {
        if self.failing_categories.contains(&category.name) {
            return Err(SourceError::Other(format!("{} archive offline", category.name)));
        }
        Ok(self.links.get(&category.name).cloned().unwrap_or_default())
    }

    async fn fetch_article_body(&self, url: &str) -> Result<ArticleBody, SourceError> {
        self.bodies_fetched.lock().unwrap().push(url.to_string());
        if self.failing_bodies.contains(url) {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        Ok(ArticleBody {
            title: format!("Title of {url}"),
            image: Some(format!("{url}.jpg")),
            image_alt: String::new(),
            date_posted: Some("October 17, 2026".into()),
            // The fake provider echoes this into the document title.
            article_html: url.rsplit('/').next().unwrap_or(url).to_string(),
        })
    }
}

/// CMS that records published titles.
#[derive(Debug, Default)]
pub struct FakeCms {
    pub published: Mutex<Vec<String>>,
    pub reject_titles: HashSet<String>,
}

#[async_trait]
impl CmsPublisher for FakeCms {
    async fn publish(&self, doc: &RewrittenDocument) -> Result<PublishOutcome, PublishError> {
        if self.reject_titles.contains(&doc.title) {
            return Err(PublishError::Rejected {
                status: 500,
                body: "wp down".into(),
            });
        }
        self.published.lock().unwrap().push(doc.title.clone());
        Ok(PublishOutcome {
            link: format!("https://blog.example.com/{}", doc.title),
            status: "publish".into(),
        })
    }
}

/// One recorded social post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPost {
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

/// Social network that records posts, optionally failing every call.
#[derive(Debug, Default)]
pub struct FakeSocial {
    pub posts: Mutex<Vec<SentPost>>,
    pub fail: bool,
}

impl FakeSocial {
    pub fn sent(&self) -> Vec<SentPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocialPublisher for FakeSocial {
    async fn post_with_image(
        &self,
        title: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<(), AnnouncementError> {
        if self.fail {
            return Err(AnnouncementError::ImageDownload("no network".into()));
        }
        self.posts.lock().unwrap().push(SentPost {
            title: title.to_string(),
            text: text.to_string(),
            image_url: image_url.map(str::to_string),
        });
        Ok(())
    }
}
