//! Outbound publishing targets.
//!
//! | Target | Module | Trait |
//! |--------|--------|-------|
//! | WordPress REST API | [`wordpress`] | [`CmsPublisher`] |
//! | X (Twitter) API | [`x`] | [`SocialPublisher`] |

pub mod wordpress;
pub mod x;

use crate::error::{AnnouncementError, PublishError};
use crate::models::{PublishOutcome, RewrittenDocument};
use async_trait::async_trait;

/// Where rewritten articles are published.
#[async_trait]
pub trait CmsPublisher: Send + Sync {
    /// Publish `doc` and report its public link and status.
    async fn publish(&self, doc: &RewrittenDocument) -> Result<PublishOutcome, PublishError>;
}

/// Where announcements are posted.
#[async_trait]
pub trait SocialPublisher: Send + Sync {
    /// Post `text`, attaching the image at `image_url` when given.
    ///
    /// `title` names the temporary image file and must yield a non-empty safe filename
    /// whenever an image is attached.
    async fn post_with_image(
        &self,
        title: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<(), AnnouncementError>;
}
