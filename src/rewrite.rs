//! Rewrite engine: retry with exponential backoff and credential fail-over.
//!
//! # Strategy
//!
//! Credentials are tried in pool order. For each one:
//!
//! - empty secret, or no provider registered for its kind: skipped without an attempt
//! - up to `max_retries` attempts against the matching provider
//! - a rate-limit signal abandons the credential at once
//! - any other failure backs off `base_delay * 2^(attempt-1)` and retries, until the
//!   last attempt, after which the credential is abandoned
//!
//! An empty answer counts as a failure. When every credential is abandoned the
//! result is [`RewriteResult::Failure`].
//!
//! ```text
//! attempt:  1    2    3    4
//! delay:      1s   2s   4s        (after failures 1..3)
//! ```

use crate::api::GenerationProvider;
use crate::error::GenerationError;
use crate::models::{Credential, RewriteRequest, RewriteResult};
use crate::prompts::rewrite_prompt;
use crate::utils::truncate_for_log;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, instrument, warn};

pub struct RewriteEngine {
    providers: Vec<Arc<dyn GenerationProvider>>,
    max_retries: u32,
    base_delay: Duration,
}

impl RewriteEngine {
    /// Create an engine over a set of providers, one per [`crate::models::ProviderKind`].
    ///
    /// # Arguments
    ///
    /// * `providers` - The registered backends
    /// * `max_retries` - Attempts per credential (4 in production)
    /// * `base_delay` - First backoff delay, doubled on every retry (1 second in production)
    pub fn new(
        providers: Vec<Arc<dyn GenerationProvider>>,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            providers,
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// Backoff before attempt `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16))
    }

    fn provider_for(&self, credential: &Credential) -> Option<&Arc<dyn GenerationProvider>> {
        self.providers.iter().find(|p| p.kind() == credential.provider)
    }

    /// Rewrite an article, failing over across `credentials` in order.
    #[instrument(level = "info", skip_all, fields(category = %request.category, credentials = credentials.len()))]
    pub async fn rewrite(&self, request: &RewriteRequest, credentials: &[Credential]) -> RewriteResult {
        if request.raw_content.trim().is_empty() {
            warn!("No article content provided");
            return RewriteResult::Failure;
        }
        if credentials.is_empty() {
            error!("No API keys available");
            return RewriteResult::Failure;
        }

        let total_t0 = Instant::now();
        let prompt = rewrite_prompt(&request.category);

        for (index, credential) in credentials.iter().enumerate() {
            let key_no = index + 1;
            if credential.secret.is_empty() {
                warn!(key_no, "Skipping empty API key");
                continue;
            }
            let Some(provider) = self.provider_for(credential) else {
                warn!(key_no, provider = %credential.provider, "Unknown API source; skipping");
                continue;
            };
            info!(key_no, total = credentials.len(), provider = %credential.provider, "Using API key");

            for attempt in 1..=self.max_retries {
                let attempt_t0 = Instant::now();
                let err = match provider
                    .generate(&prompt, &request.raw_content, &credential.secret)
                    .await
                {
                    Ok(answer) if !answer.trim().is_empty() => {
                        info!(
                            key_no,
                            attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            preview = %truncate_for_log(&answer, 120),
                            "Rewrite succeeded"
                        );
                        return RewriteResult::Success { text: answer };
                    }
                    Ok(_) => GenerationError::EmptyResponse,
                    Err(e) => e,
                };

                if err.is_rate_limit() {
                    warn!(key_no, attempt, error = %err, "Rate limit hit; switching to next key");
                    break;
                }

                if attempt < self.max_retries {
                    let delay = self.backoff(attempt);
                    warn!(
                        key_no,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %err,
                        "Attempt failed; backing off"
                    );
                    sleep(delay).await;
                } else {
                    warn!(key_no, attempt, error = %err, "Max retries reached; moving to next key");
                }
            }
        }

        error!(
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            "All API keys exhausted"
        );
        RewriteResult::Failure
    }
}

impl fmt::Debug for RewriteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteEngine")
            .field("providers", &self.providers.len())
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}
