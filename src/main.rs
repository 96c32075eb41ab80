//! # Awful Sports Desk
//!
//! A sports-news publishing bot. It scrapes the day's article links from Sports
//! Illustrated, skips links it has already handled, rewrites each new article
//! through an LLM into a WordPress-ready document, publishes it, records it in
//! Postgres and announces the results on X.
//!
//! ## Usage
//!
//! ```sh
//! # Recurring: one run now, then every `interval_secs` after each run ends
//! awful_sports_desk -c desk.yaml
//!
//! # A single pass
//! awful_sports_desk --once
//! ```
//!
//! ## Architecture
//!
//! 1. **Scheduling**: single-flight recurring runs ([`scheduler`])
//! 2. **Indexing**: archive pages to candidate links ([`scrapers`]), minus seen links ([`store`])
//! 3. **Rewriting**: multi-key, multi-provider generation with backoff ([`rewrite`], [`api`])
//! 4. **Parsing**: fenced YAML answer to a document ([`document`])
//! 5. **Publishing**: WordPress post, article log row, X announcements ([`publishers`], [`announce`])

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod announce;
mod api;
mod cli;
mod config;
mod document;
mod error;
mod models;
mod pipeline;
mod prompts;
mod publishers;
mod rewrite;
mod scheduler;
mod scrapers;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use api::{GeminiProvider, GenerationProvider, OpenRouterProvider};
use cli::Cli;
use config::load_config;
use pipeline::Pipeline;
use publishers::SocialPublisher;
use publishers::wordpress::WordpressPublisher;
use publishers::x::XPublisher;
use rewrite::RewriteEngine;
use scheduler::Scheduler;
use scrapers::si::SiScraper;
use store::PgStore;
use utils::ensure_writable_dir;

const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("sports_desk starting up");

    let args = Cli::parse();
    debug!(
        config = ?args.config,
        blog_url = %args.blog_url,
        articles_table = %args.articles_table,
        once = args.once,
        "Parsed CLI arguments"
    );

    let config = load_config(args.config.as_deref()).await?;
    ensure_writable_dir(&args.image_download_dir).await?;

    let store = Arc::new(
        PgStore::connect(&args.database_url, &args.articles_table, &args.api_keys_table).await?,
    );
    store.ensure_schema().await?;

    let client = Client::builder().user_agent("awful_sports_desk").build()?;

    let providers: Vec<Arc<dyn GenerationProvider>> = vec![
        Arc::new(OpenRouterProvider::new(
            client.clone(),
            config.openrouter_model.clone(),
            config.request_timeout(),
        )) as Arc<dyn GenerationProvider>,
        Arc::new(GeminiProvider::new(
            client.clone(),
            config.gemini_model.clone(),
            config.request_timeout(),
        )) as Arc<dyn GenerationProvider>,
    ];
    let engine = RewriteEngine::new(providers, config.max_retries, BACKOFF_BASE);

    let source = Arc::new(SiScraper::new(
        client.clone(),
        &config.source_base_url,
        config.archive_pages,
        config.date_format.clone(),
    )?);
    let cms = Arc::new(WordpressPublisher::new(
        client.clone(),
        &args.blog_url,
        args.wp_username.clone(),
        args.wp_app_password.clone(),
    ));
    let social = match &args.x_bearer_token {
        Some(token) => Some(Arc::new(XPublisher::new(
            client.clone(),
            token.clone(),
            args.image_download_dir.clone(),
        )) as Arc<dyn SocialPublisher>),
        None => {
            info!("X_BEARER_TOKEN not set; announcements disabled");
            None
        }
    };

    let interval = config.interval();
    let pipeline = Arc::new(Pipeline::new(
        source,
        store.clone(),
        store,
        engine,
        cms,
        social,
        config,
    ));

    if args.once {
        let today = pipeline.today();
        let report = pipeline.run(&today).await;
        info!(?report, "Single pass finished");
        return Ok(());
    }

    let scheduler = Scheduler::new(pipeline, interval);
    scheduler.start();
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received; shutting down");
    scheduler.shutdown().await;

    info!(state = ?scheduler.state(), "sports_desk stopped");
    Ok(())
}
