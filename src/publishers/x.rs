//! X (Twitter) announcements.
//!
//! An announcement with an image goes through a scratch file:
//! download into the image directory as `{safe_title}{ext}`, upload it as media,
//! post the text with the media id, then delete the file whatever happened.

use crate::error::AnnouncementError;
use crate::publishers::SocialPublisher;
use crate::utils::{safe_filename, truncate_for_log};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

const MEDIA_UPLOAD_URL: &str = "https://api.x.com/2/media/upload";
const TWEETS_URL: &str = "https://api.x.com/2/tweets";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const FALLBACK_EXTENSION: &str = ".jpg";

#[derive(Debug, Clone)]
pub struct XPublisher {
    client: Client,
    bearer_token: String,
    image_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MediaUpload {
    data: MediaData,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    id: String,
}

/// File extension (with the dot) for a downloaded image.
///
/// Taken from the url path when it names an image type, otherwise from the
/// content type. Falls back to `.jpg` so the file stays deletable.
pub fn image_extension(image_url: &str, content_type: Option<&str>) -> String {
    let from_path = url::Url::parse(image_url).ok().and_then(|u| {
        let ext = Path::new(u.path()).extension()?.to_str()?.to_string();
        IMAGE_EXTENSIONS
            .contains(&ext.to_lowercase().as_str())
            .then(|| format!(".{ext}"))
    });
    from_path
        .or_else(|| {
            let ext = match content_type?.split(';').next()?.trim() {
                "image/jpeg" => ".jpg",
                "image/png" => ".png",
                "image/gif" => ".gif",
                "image/webp" => ".webp",
                "image/bmp" => ".bmp",
                _ => return None,
            };
            Some(ext.to_string())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Delete a downloaded image. Files without an image extension are left alone.
pub async fn remove_downloaded_image(path: &Path) {
    if !is_image_file(path) {
        warn!(path = %path.display(), "Not an image file; leaving it in place");
        return;
    }
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Image deleted"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete image"),
    }
}

async fn rejected(resp: reqwest::Response) -> AnnouncementError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    AnnouncementError::Rejected { status, body }
}

impl XPublisher {
    pub fn new(client: Client, bearer_token: impl Into<String>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            bearer_token: bearer_token.into(),
            image_dir: image_dir.into(),
        }
    }

    /// Download `image_url` to `{image_dir}/{file_stem}{ext}` and return the path.
    async fn download_image(&self, image_url: &str, file_stem: &str) -> Result<PathBuf, AnnouncementError> {
        let resp = self
            .client
            .get(image_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AnnouncementError::ImageDownload(e.to_string()))?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AnnouncementError::ImageDownload(e.to_string()))?;

        fs::create_dir_all(&self.image_dir).await?;
        let ext = image_extension(image_url, content_type.as_deref());
        let path = self.image_dir.join(format!("{file_stem}{ext}"));
        fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Image saved");
        Ok(path)
    }

    async fn upload_media(&self, path: &Path) -> Result<String, AnnouncementError> {
        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let form = Form::new()
            .part("media", Part::bytes(bytes).file_name(file_name))
            .text("media_category", "tweet_image");

        let resp = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .bearer_auth(&self.bearer_token)
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let upload: MediaUpload = resp.json().await?;
        debug!(media_id = %upload.data.id, "Media uploaded");
        Ok(upload.data.id)
    }

    async fn post_tweet(&self, text: &str, media_id: Option<&str>) -> Result<(), AnnouncementError> {
        let payload = match media_id {
            Some(id) => json!({ "text": text, "media": { "media_ids": [id] } }),
            None => json!({ "text": text }),
        };
        let resp = self
            .client
            .post(TWEETS_URL)
            .bearer_auth(&self.bearer_token)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        Ok(())
    }

    async fn post_with_file(&self, text: &str, path: &Path) -> Result<(), AnnouncementError> {
        let media_id = self.upload_media(path).await?;
        self.post_tweet(text, Some(&media_id)).await
    }
}

#[async_trait]
impl SocialPublisher for XPublisher {
    #[instrument(level = "info", skip(self, text), fields(text = %truncate_for_log(text, 60)))]
    async fn post_with_image(
        &self,
        title: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<(), AnnouncementError> {
        if text.trim().is_empty() {
            return Err(AnnouncementError::EmptyText);
        }
        let file_stem = safe_filename(title);
        if file_stem.is_empty() {
            return Err(AnnouncementError::InvalidFilename(title.to_string()));
        }

        let Some(image_url) = image_url else {
            self.post_tweet(text, None).await?;
            info!("Posted text-only announcement");
            return Ok(());
        };

        let path = self.download_image(image_url, &file_stem).await?;
        let result = self.post_with_file(text, &path).await;
        remove_downloaded_image(&path).await;
        result?;
        info!("Posted announcement with image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("asd_x_{name}_{}", std::process::id()))
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(image_extension("https://img.si.com/a/derby.png?w=1", None), ".png");
        assert_eq!(
            image_extension("https://img.si.com/a/derby.webp", Some("image/jpeg")),
            ".webp"
        );
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(image_extension("https://img.si.com/a/derby", Some("image/jpeg")), ".jpg");
        assert_eq!(
            image_extension("https://img.si.com/a/derby", Some("image/gif; charset=binary")),
            ".gif"
        );
    }

    #[test]
    fn test_extension_fallback_is_jpg() {
        assert_eq!(image_extension("https://img.si.com/a/derby", Some("text/html")), ".jpg");
        assert_eq!(image_extension("not a url", None), ".jpg");
        assert_eq!(image_extension("https://img.si.com/render.php", None), ".jpg");
        assert_eq!(image_extension("https://img.si.com/render.php", Some("image/png")), ".png");
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let x = XPublisher::new(Client::new(), "tok", scratch_dir("empty"));
        let err = x.post_with_image("Title", "   ", None).await.unwrap_err();
        assert!(matches!(err, AnnouncementError::EmptyText));
    }

    #[tokio::test]
    async fn test_unusable_title_rejected() {
        let x = XPublisher::new(Client::new(), "tok", scratch_dir("title"));
        let err = x
            .post_with_image("??", "text", Some("https://img.si.com/a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnouncementError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn test_remove_downloaded_image_only_deletes_images() {
        let dir = scratch_dir("remove");
        std::fs::create_dir_all(&dir).unwrap();
        let image = dir.join("derby.JPG");
        let other = dir.join("notes.txt");
        std::fs::write(&image, b"img").unwrap();
        std::fs::write(&other, b"txt").unwrap();

        remove_downloaded_image(&image).await;
        remove_downloaded_image(&other).await;
        // Missing files are logged, not fatal.
        remove_downloaded_image(&dir.join("gone.png")).await;

        assert!(!image.exists());
        assert!(other.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_extensionless_download_name_is_deletable() {
        let dir = scratch_dir("fallback");
        std::fs::create_dir_all(&dir).unwrap();
        let ext = image_extension("https://img.si.com/a/derby", None);
        let image = dir.join(format!("derby{ext}"));
        std::fs::write(&image, b"img").unwrap();

        remove_downloaded_image(&image).await;

        assert!(!image.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
