//! Decides when saved articles turn into social announcements.
//!
//! Two independent policies run side by side over the same stream of saved articles:
//!
//! - **Single**: every `threshold`-th saved article is announced on its own
//!   (summary, permalink, hashtags, featured image), then the count resets.
//! - **Combined**: saved articles accumulate in a list; once it holds `threshold`
//!   entries they are announced together as a numbered list and the list clears.
//!   Whatever is left at the end of a run is flushed by [`AnnouncementBatcher::finish`].
//!
//! The batcher only decides; sending is the orchestrator's job. One batcher lives
//! for exactly one run.

use crate::models::RewrittenDocument;

const COMBINED_FOOTER: &str = "Read all posts on our site.";
const FINAL_FOOTER: &str = "Read full posts on our website.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    Single,
    Combined,
}

/// One post to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: AnnouncementKind,
    /// Names the scratch image file; never shown.
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
struct BatchEntry {
    title: String,
}

#[derive(Debug)]
pub struct AnnouncementBatcher {
    threshold: usize,
    since_last: usize,
    batch: Vec<BatchEntry>,
    batches_posted: usize,
}

/// `"{summary}...\n\n{permalink}\n\n{#tag #tag}"`
pub fn single_text(doc: &RewrittenDocument, permalink: &str) -> String {
    format!("{}...\n\n{}\n\n{}", doc.summary, permalink, doc.hashtags())
}

fn combined_text(entries: &[BatchEntry], footer: &str) -> String {
    let list = entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, e.title))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{list}\n\n{footer}")
}

impl AnnouncementBatcher {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            since_last: 0,
            batch: Vec::with_capacity(threshold),
            batches_posted: 0,
        }
    }

    /// Register one saved article and return the announcements it triggers, if any.
    pub fn record(&mut self, doc: &RewrittenDocument, permalink: &str) -> Vec<Announcement> {
        let mut due = Vec::new();

        self.since_last += 1;
        if self.since_last == self.threshold {
            due.push(Announcement {
                kind: AnnouncementKind::Single,
                title: doc.title.clone(),
                text: single_text(doc, permalink),
                image_url: Some(doc.featured_image.clone()).filter(|u| !u.is_empty()),
            });
            self.since_last = 0;
        }

        self.batch.push(BatchEntry {
            title: doc.title.clone(),
        });
        if self.batch.len() == self.threshold {
            due.push(self.combined(COMBINED_FOOTER));
        }

        due
    }

    /// End-of-run flush of a partial batch.
    pub fn finish(&mut self) -> Option<Announcement> {
        if self.batch.is_empty() {
            return None;
        }
        Some(self.combined(FINAL_FOOTER))
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    fn combined(&mut self, footer: &str) -> Announcement {
        self.batches_posted += 1;
        let entries = std::mem::take(&mut self.batch);
        Announcement {
            kind: AnnouncementKind::Combined,
            title: format!("Batch Update #{}", self.batches_posted),
            text: combined_text(&entries, footer),
            image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_document;

    fn feed(batcher: &mut AnnouncementBatcher, n: usize) -> Vec<(usize, Announcement)> {
        (1..=n)
            .flat_map(|i| {
                let doc = sample_document(&format!("Story {i}"));
                batcher
                    .record(&doc, &format!("https://blog.example.com/{i}"))
                    .into_iter()
                    .map(move |a| (i, a))
            })
            .collect()
    }

    #[test]
    fn test_twenty_five_articles() {
        let mut batcher = AnnouncementBatcher::new(10);
        let fired = feed(&mut batcher, 25);

        let singles: Vec<usize> = fired
            .iter()
            .filter(|(_, a)| a.kind == AnnouncementKind::Single)
            .map(|(i, _)| *i)
            .collect();
        assert_eq!(singles, vec![10, 20]);

        let combined: Vec<(usize, &str)> = fired
            .iter()
            .filter(|(_, a)| a.kind == AnnouncementKind::Combined)
            .map(|(i, a)| (*i, a.title.as_str()))
            .collect();
        assert_eq!(combined, vec![(10, "Batch Update #1"), (20, "Batch Update #2")]);

        let rest = batcher.finish().unwrap();
        assert_eq!(rest.title, "Batch Update #3");
        assert_eq!(rest.text.lines().filter(|l| l.contains(". Story")).count(), 5);
        assert!(rest.text.starts_with("1. Story 21\n"));
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn test_seven_articles_only_flush() {
        let mut batcher = AnnouncementBatcher::new(10);
        assert!(feed(&mut batcher, 7).is_empty());
        assert_eq!(batcher.pending(), 7);

        let rest = batcher.finish().unwrap();
        assert_eq!(rest.kind, AnnouncementKind::Combined);
        assert_eq!(rest.image_url, None);
        assert_eq!(
            rest.text,
            "1. Story 1\n2. Story 2\n3. Story 3\n4. Story 4\n5. Story 5\n6. Story 6\n7. Story 7\n\nRead full posts on our website."
        );
    }

    #[test]
    fn test_single_announcement_content() {
        let mut batcher = AnnouncementBatcher::new(1);
        let doc = sample_document("Derby");
        let fired = batcher.record(&doc, "https://blog.example.com/derby");

        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].kind, AnnouncementKind::Single);
        assert_eq!(
            fired[0].text,
            "Summary of Derby...\n\nhttps://blog.example.com/derby\n\n#Arsenal #PremierLeague"
        );
        assert_eq!(fired[0].image_url.as_deref(), Some("https://images.example.com/a.jpg"));
        assert_eq!(fired[1].text, "1. Derby\n\nRead all posts on our site.");
    }

    #[test]
    fn test_nothing_recorded_nothing_flushed() {
        let mut batcher = AnnouncementBatcher::new(10);
        assert!(batcher.finish().is_none());
    }
}
