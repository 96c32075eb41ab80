//! Pipeline configuration loaded from an optional YAML file.
//!
//! Every key has a default, so an empty file (or no file) yields a working
//! configuration for the soccer desk:
//!
//! ```yaml
//! source_label: SI
//! source_base_url: https://www.si.com
//! date_format: "%B %-d, %Y"
//! categories:
//!   - name: soccer
//!     layout: grid
//! interval_secs: 600
//! max_retries: 4
//! announcement_batch_size: 10
//! archive_pages: 10
//! openrouter_model: deepseek/deepseek-r1-0528:free
//! gemini_model: gemini-2.5-flash
//! request_timeout_secs: 60
//! ```

use crate::models::{Category, LayoutKind};
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Value stored in the `source` column of every saved article.
    pub source_label: String,
    /// Root of the news site; article urls outside it are rejected.
    pub source_base_url: String,
    /// chrono format for the "today" date matched against listings (en-US long date).
    pub date_format: String,
    /// Categories, processed sequentially in this order.
    pub categories: Vec<Category>,
    /// Delay between the end of one run and the start of the next.
    pub interval_secs: u64,
    /// Attempts per credential before failing over.
    pub max_retries: u32,
    /// Articles per announcement.
    pub announcement_batch_size: usize,
    /// Archive pages walked per category.
    pub archive_pages: usize,
    pub openrouter_model: String,
    pub gemini_model: String,
    /// Timeout applied to each outbound generation request.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_label: "SI".to_string(),
            source_base_url: "https://www.si.com".to_string(),
            date_format: "%B %-d, %Y".to_string(),
            categories: vec![Category::new("soccer", LayoutKind::Grid)],
            interval_secs: 600,
            max_retries: 4,
            announcement_batch_size: 10,
            archive_pages: 10,
            openrouter_model: "deepseek/deepseek-r1-0528:free".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Format a date the way the source site prints listing dates.
    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(&self.date_format).to_string()
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".into());
        }
        if self.announcement_batch_size == 0 {
            return Err("announcement_batch_size must be at least 1".into());
        }
        if self.categories.iter().any(|c| c.name.trim().is_empty()) {
            return Err("category names must not be empty".into());
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(format!("invalid date_format {:?}", self.date_format).into());
        }
        Ok(())
    }
}

/// Whether chrono can format with `fmt`. Formatting with a bad specifier panics.
pub fn is_valid_date_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

/// Parse a YAML document into a validated [`PipelineConfig`].
pub fn parse_config(yaml: &str) -> Result<PipelineConfig, Box<dyn Error>> {
    let config: PipelineConfig = if yaml.trim().is_empty() {
        PipelineConfig::default()
    } else {
        serde_yaml::from_str(yaml)?
    };
    config.validate()?;
    Ok(config)
}

/// Load the pipeline configuration, falling back to defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&str>) -> Result<PipelineConfig, Box<dyn Error>> {
    let config = match path {
        Some(p) => {
            let yaml = tokio::fs::read_to_string(p).await?;
            parse_config(&yaml)?
        }
        None => PipelineConfig::default(),
    };
    info!(
        categories = config.categories.len(),
        interval_secs = config.interval_secs,
        max_retries = config.max_retries,
        "Loaded pipeline configuration"
    );
    Ok(config)
}
