//! WordPress REST publisher.
//!
//! Publishing one document takes several calls against `{blog}/wp-json/wp/v2`:
//!
//! 1. upload the featured image to `/media`
//! 2. upload every inline `<img src>` and rewrite the content to the new urls
//! 3. find or create the category, then each tag
//! 4. create the post with SEO meta for Rank Math and Yoast
//!
//! An image that cannot be mirrored keeps its original url. Any failure in steps
//! 3 and 4 fails the publish.

use crate::error::PublishError;
use crate::models::{PublishOutcome, RewrittenDocument};
use crate::publishers::CmsPublisher;
use async_trait::async_trait;
use futures::future::try_join_all;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

static INLINE_IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<img[^>]*src="([^"]+)""#).unwrap());

#[derive(Debug, Clone)]
pub struct WordpressPublisher {
    client: Client,
    api_base: String,
    username: String,
    app_password: String,
}

#[derive(Debug, Deserialize)]
struct Media {
    id: u64,
    source_url: String,
}

#[derive(Debug, Deserialize)]
struct Term {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Post {
    link: Option<String>,
    status: Option<String>,
}

/// A mirrored image: the media id (when the upload worked) and the url to use.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Mirrored {
    id: Option<u64>,
    url: String,
}

/// Distinct inline image urls in document order.
pub fn inline_image_urls(content: &str) -> Vec<String> {
    INLINE_IMG_RE
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .unique()
        .collect()
}

/// File name for an uploaded image: last path segment with the query dropped.
pub fn media_file_name(image_url: &str) -> String {
    image_url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("image.jpg")
        .to_string()
}

/// Body of the post creation call.
pub fn post_payload(
    doc: &RewrittenDocument,
    content: &str,
    featured_media: Option<u64>,
    category_id: Option<u64>,
    tag_ids: &[u64],
) -> Value {
    json!({
        "title": doc.title,
        "content": content,
        "status": "publish",
        "featured_media": featured_media,
        "categories": category_id.into_iter().collect::<Vec<_>>(),
        "tags": tag_ids,
        "meta": {
            "_rank_math_focus_keyword": doc.focus_keyphrase,
            "_rank_math_description": doc.meta_description,
            "_rank_math_title": doc.title,
            "_yoast_wpseo_focuskw": doc.focus_keyphrase,
            "_yoast_wpseo_metadesc": doc.meta_description,
            "_yoast_wpseo_title": doc.title,
        },
    })
}

async fn rejected(resp: reqwest::Response) -> PublishError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    PublishError::Rejected { status, body }
}

impl WordpressPublisher {
    pub fn new(
        client: Client,
        blog_url: &str,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: format!("{}/wp-json/wp/v2", blog_url.trim_end_matches('/')),
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(&self.app_password))
    }

    async fn upload_image(&self, image_url: &str, alt_text: &str) -> Result<Media, PublishError> {
        let resp = self.client.get(image_url).send().await?.error_for_status()?;
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp.bytes().await?;

        let part = Part::bytes(bytes.to_vec())
            .file_name(media_file_name(image_url))
            .mime_str(&mime)?;
        let mut form = Form::new().part("file", part);
        if !alt_text.is_empty() {
            form = form.text("alt_text", alt_text.to_string());
        }

        let resp = self
            .authed(self.client.post(format!("{}/media", self.api_base)))
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Upload an image, falling back to the original url on any failure.
    #[instrument(level = "debug", skip(self, alt_text))]
    async fn mirror_image(&self, image_url: &str, alt_text: &str) -> Mirrored {
        match self.upload_image(image_url, alt_text).await {
            Ok(media) => {
                debug!(id = media.id, url = %media.source_url, "Image uploaded");
                Mirrored {
                    id: Some(media.id),
                    url: media.source_url,
                }
            }
            Err(e) => {
                warn!(error = %e, "Image upload failed; keeping original url");
                Mirrored {
                    id: None,
                    url: image_url.to_string(),
                }
            }
        }
    }

    /// Find a category or tag by name, creating it when the search comes back empty.
    async fn find_or_create_term(&self, taxonomy: &str, name: &str) -> Result<u64, PublishError> {
        let search = format!(
            "{}/{taxonomy}?search={}",
            self.api_base,
            urlencoding::encode(name)
        );
        let resp = self.authed(self.client.get(search)).send().await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let found: Vec<Term> = resp.json().await?;
        if let Some(term) = found.first() {
            return Ok(term.id);
        }

        let resp = self
            .authed(self.client.post(format!("{}/{taxonomy}", self.api_base)))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let created: Term = resp.json().await?;
        debug!(taxonomy, name, id = created.id, "Created term");
        Ok(created.id)
    }
}

#[async_trait]
impl CmsPublisher for WordpressPublisher {
    #[instrument(level = "info", skip_all, fields(title = %doc.title))]
    async fn publish(&self, doc: &RewrittenDocument) -> Result<PublishOutcome, PublishError> {
        let featured_media = if doc.featured_image.is_empty() {
            None
        } else {
            self.mirror_image(&doc.featured_image, &doc.title).await.id
        };

        let mut content = doc.content.clone();
        let inline = inline_image_urls(&content);
        if !inline.is_empty() {
            info!(count = inline.len(), "Mirroring inline images");
        }
        for old_url in inline {
            let mirrored = self.mirror_image(&old_url, &doc.title).await;
            content = content.replace(&old_url, &mirrored.url);
        }

        let category_id = if doc.category.is_empty() {
            None
        } else {
            Some(self.find_or_create_term("categories", &doc.category).await?)
        };
        let tag_ids = try_join_all(
            doc.tags
                .iter()
                .map(|tag| self.find_or_create_term("tags", tag)),
        )
        .await?;

        let payload = post_payload(doc, &content, featured_media, category_id, &tag_ids);
        let resp = self
            .authed(self.client.post(format!("{}/posts", self.api_base)))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = rejected(resp).await;
            warn!(error = %err, "WordPress rejected the post");
            return Err(err);
        }

        let post: Post = resp.json().await?;
        let link = post.link.ok_or(PublishError::MissingField("link"))?;
        let status = post.status.unwrap_or_else(|| "publish".to_string());
        info!(%link, %status, "Published");
        Ok(PublishOutcome { link, status })
    }
}
