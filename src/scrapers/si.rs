//! Sports Illustrated archive scraper.
//!
//! Category archives live at `https://www.si.com/{category}/archive?page=N`.
//! Pages are walked in order until one yields no article links or the page
//! budget runs out.
//!
//! # Link discovery
//!
//! Two passes over each page are combined and deduplicated by url:
//! - any anchor whose resolved path is `/{category}/<slug...>` (archive and query links excluded)
//! - anchors nested in card/article/story containers
//!
//! Navigation entries (team and league menus) are dropped by title.

use crate::config::is_valid_date_format;
use crate::error::SourceError;
use crate::models::{ArticleBody, ArticleLink, Category};
use crate::scrapers::SourceProvider;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static CONTAINER_ANCHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="card"] a[href], [class*="article"] a[href], [class*="story"] a[href]"#)
        .unwrap()
});
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static OG_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static IMG_ALT: Lazy<Selector> = Lazy::new(|| Selector::parse("img[alt]").unwrap());
static PUBLISHED_TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Menu entries that look like article links but are navigation.
static EXCLUDED_TITLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Home",
        "Transfers",
        "Premier League",
        "La Liga",
        "MLS",
        "Champions League",
        "Europa League",
        "Club World Cup",
        "Arsenal",
        "Chelsea",
        "Liverpool",
        "Manchester City",
        "Manchester United",
        "Barcelona",
        "Real Madrid",
        "Bayern Munich",
        "Paris Saint-Germain",
        "Inter Miami",
        "LA Galaxy",
        "More Teams",
        "Ballon d’Or",
        "Women's",
        "FPL",
        "EA FC",
        "Soccer 101",
        "Futures",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone)]
pub struct SiScraper {
    client: Client,
    base_url: Url,
    archive_pages: usize,
    date_format: String,
}

impl SiScraper {
    pub fn new(
        client: Client,
        base_url: &str,
        archive_pages: usize,
        date_format: impl Into<String>,
    ) -> Result<Self, SourceError> {
        if archive_pages == 0 {
            return Err(SourceError::Other("archive_pages must be at least 1".into()));
        }
        let date_format = date_format.into();
        if !is_valid_date_format(&date_format) {
            return Err(SourceError::Other(format!("invalid date format {date_format:?}")));
        }
        let base_url =
            Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            client,
            base_url,
            archive_pages,
            date_format,
        })
    }

    fn archive_url(&self, category: &str, page: usize) -> Result<Url, SourceError> {
        self.base_url
            .join(&format!("/{category}/archive?page={page}"))
            .map_err(|e| SourceError::InvalidUrl(e.to_string()))
    }

    fn owns(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| u.scheme() == self.base_url.scheme() && u.host_str() == self.base_url.host_str())
            .unwrap_or(false)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Resolve `href` and keep it only if it points at an article under `/{category}/`.
fn article_url(base: &Url, href: &str, category: &str) -> Option<Url> {
    let resolved = base.join(href).ok()?;
    if resolved.host_str() != base.host_str() || resolved.query().is_some() {
        return None;
    }
    let segments: Vec<&str> = resolved
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();
    match segments.as_slice() {
        [first, rest @ ..] if *first == category && !rest.is_empty() && rest[0] != "archive" => {
            Some(resolved)
        }
        _ => None,
    }
}

/// Extract the article links of one archive page.
pub fn extract_links(html: &str, base: &Url, category: &str, listing_date: &str) -> Vec<ArticleLink> {
    let document = Html::parse_document(html);

    let primary = document.select(&ANCHOR).filter_map(|el| {
        let url = article_url(base, el.value().attr("href")?, category)?;
        let title = el
            .value()
            .attr("title")
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                el.select(&HEADING)
                    .next()
                    .map(|h| element_text(&h))
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| element_text(&el));
        Some((url, title))
    });

    let containers = document.select(&CONTAINER_ANCHOR).filter_map(|el| {
        let url = article_url(base, el.value().attr("href")?, category)?;
        let text = element_text(&el);
        let title = if text.is_empty() {
            el.value().attr("title").map(collapse_whitespace).unwrap_or_default()
        } else {
            text
        };
        Some((url, title))
    });

    primary
        .chain(containers)
        .unique_by(|(url, _)| url.to_string())
        .map(|(url, title)| ArticleLink {
            title: if title.is_empty() {
                "No title found".to_string()
            } else {
                title
            },
            url: url.to_string(),
            published_date: listing_date.to_string(),
        })
        .collect()
}

/// Drop navigation entries and links listed on a different day.
pub fn filter_listing(links: Vec<ArticleLink>, date: &str) -> Vec<ArticleLink> {
    links
        .into_iter()
        .filter(|l| !EXCLUDED_TITLES.contains(l.title.as_str()) && l.published_date == date)
        .collect()
}

/// Extract metadata and body from an article page.
pub fn parse_article(html: &str, date_format: &str) -> ArticleBody {
    let document = Html::parse_document(html);
    let meta = |sel: &Selector| {
        document
            .select(sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    let title = meta(&OG_TITLE)
        .or_else(|| document.select(&TITLE).next().map(|el| element_text(&el)))
        .unwrap_or_default();
    let image = meta(&OG_IMAGE);
    let image_alt = meta(&OG_DESCRIPTION)
        .or_else(|| {
            document
                .select(&IMG_ALT)
                .next()
                .and_then(|el| el.value().attr("alt"))
                .map(str::to_string)
        })
        .unwrap_or_default();
    let date_posted = meta(&PUBLISHED_TIME).and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|d| d.with_timezone(&Local).format(date_format).to_string())
    });
    let article_html = document
        .select(&BODY)
        .next()
        .map(|b| b.inner_html())
        .unwrap_or_default();

    ArticleBody {
        title,
        image,
        image_alt,
        date_posted,
        article_html,
    }
}

#[async_trait]
impl SourceProvider for SiScraper {
    #[instrument(level = "info", skip(self, category), fields(category = %category.name))]
    async fn fetch_links(&self, date: &str, category: &Category) -> Result<Vec<ArticleLink>, SourceError> {
        // The archive shows no per-link date; links are stamped with the day they were listed.
        let listing_date = Local::now().format(&self.date_format).to_string();
        let mut all = Vec::new();

        for page in 1..=self.archive_pages {
            let url = self.archive_url(&category.name, page)?;
            debug!(%url, "Fetching archive page");
            let html = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let links = extract_links(&html, &self.base_url, &category.name, &listing_date);
            if links.is_empty() {
                debug!(page, "No articles on page; stopping pagination");
                break;
            }
            all.extend(links);
        }

        let all = all.into_iter().unique_by(|l| l.url.clone()).collect::<Vec<_>>();
        let found = all.len();
        let kept = filter_listing(all, date);
        info!(found, kept = kept.len(), layout = ?category.layout, "Indexed archive links");
        Ok(kept)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_article_body(&self, url: &str) -> Result<ArticleBody, SourceError> {
        if !self.owns(url) {
            warn!("Refusing to fetch article outside the source site");
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let body = parse_article(&html, &self.date_format);
        info!(bytes = body.article_html.len(), title = %body.title, "Parsed article");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE: &str = r#"
<html><body>
  <nav>
    <a href="/soccer/">Home</a>
    <a href="/soccer/archive?page=2">Next</a>
    <a href="/soccer/premier-league">Premier League</a>
  </nav>
  <div class="card-list">
    <div class="card">
      <a href="/soccer/arsenal-win-derby"><h3>  Arsenal   win derby </h3></a>
    </div>
    <div class="story">
      <a href="https://www.si.com/soccer/messi-record" title="Messi sets record">Read</a>
    </div>
    <a href="/nfl/chiefs-win">Chiefs win</a>
    <a href="https://other.com/soccer/elsewhere">Elsewhere</a>
    <a href="/soccer/arsenal-win-derby">Duplicate</a>
  </div>
</body></html>
"#;

    fn base() -> Url {
        Url::parse("https://www.si.com").unwrap()
    }

    #[test]
    fn test_extract_links() {
        let links = extract_links(ARCHIVE, &base(), "soccer", "October 17, 2026");
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.si.com/soccer/premier-league",
                "https://www.si.com/soccer/arsenal-win-derby",
                "https://www.si.com/soccer/messi-record",
            ]
        );
        assert_eq!(links[1].title, "Arsenal win derby");
        assert_eq!(links[2].title, "Messi sets record");
    }

    #[test]
    fn test_filter_listing_drops_navigation_and_other_days() {
        let mut links = extract_links(ARCHIVE, &base(), "soccer", "October 17, 2026");
        links.push(ArticleLink {
            title: "Old story".into(),
            url: "https://www.si.com/soccer/old".into(),
            published_date: "October 16, 2026".into(),
        });
        let kept = filter_listing(links, "October 17, 2026");
        let titles: Vec<&str> = kept.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Arsenal win derby", "Messi sets record"]);
    }

    #[test]
    fn test_empty_page_has_no_links() {
        let links = extract_links("<html><body></body></html>", &base(), "soccer", "x");
        assert!(links.is_empty());
    }

    #[test]
    fn test_parse_article() {
        let html = r#"
<html><head>
  <title>Fallback title</title>
  <meta property="og:title" content="Arsenal win the derby">
  <meta property="og:image" content="https://images.si.com/derby.jpg">
  <meta property="og:description" content="Saka scores twice">
  <meta property="article:published_time" content="2026-10-17T12:00:00+00:00">
</head><body><article><p>Match report</p></article></body></html>
"#;
        let body = parse_article(html, "%Y");
        assert_eq!(body.title, "Arsenal win the derby");
        assert_eq!(body.image.as_deref(), Some("https://images.si.com/derby.jpg"));
        assert_eq!(body.image_alt, "Saka scores twice");
        assert_eq!(body.date_posted.as_deref(), Some("2026"));
        assert!(body.article_html.contains("<p>Match report</p>"));
    }

    #[test]
    fn test_parse_article_fallbacks() {
        let html = r#"<html><head><title> Plain </title></head>
<body><img src="a.jpg" alt="Crowd"></body></html>"#;
        let body = parse_article(html, "%Y");
        assert_eq!(body.title, "Plain");
        assert_eq!(body.image, None);
        assert_eq!(body.image_alt, "Crowd");
        assert_eq!(body.date_posted, None);
    }

    #[tokio::test]
    async fn test_foreign_url_rejected() {
        let scraper = SiScraper::new(Client::new(), "https://www.si.com", 1, "%Y").unwrap();
        let err = scraper
            .fetch_article_body("https://evil.example.com/soccer/x")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }

    #[test]
    fn test_bad_date_format_rejected() {
        let err = SiScraper::new(Client::new(), "https://www.si.com", 1, "%Q").unwrap_err();
        assert!(matches!(err, SourceError::Other(_)));
    }

    #[test]
    fn test_archive_url() {
        let scraper = SiScraper::new(Client::new(), "https://www.si.com", 1, "%Y").unwrap();
        assert_eq!(
            scraper.archive_url("soccer", 3).unwrap().as_str(),
            "https://www.si.com/soccer/archive?page=3"
        );
    }
}
