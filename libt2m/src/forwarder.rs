//! Forwarding engine
//!
//! Drives the send loop for one source account: collect candidates, apply
//! the limit, then upload media and publish each candidate in turn. The
//! ledger is saved after every successful send so an interrupted run loses
//! at most the post being sent.
//!
//! A failed candidate is logged and left out of the ledger; it is retried on
//! the next run. Only collection, connection and persistence errors abort
//! the account.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::collector::{collect, DEFAULT_MAX_FETCH};
use crate::content_warning::ContentWarningRules;
use crate::error::Result;
use crate::ledger::{Ledger, LedgerStore};
use crate::platforms::{Destination, DestinationProvider, MediaFetcher, SourceTimeline};
use crate::transform::Transformer;
use crate::types::{Candidate, DestinationHandle};

/// Default pause between two sends
pub const DEFAULT_DELAY: Duration = Duration::from_secs(30);

/// Per-run forwarding options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOptions {
    /// Forward only the last N candidates
    pub limit: Option<usize>,

    /// Report what would be sent without publishing or saving anything
    pub dry_run: bool,

    /// Record every candidate as forwarded without publishing
    pub mark_seen_only: bool,

    /// Pause before every send but the first
    pub delay_between_sends: Duration,

    /// Forward retweets and quotes too
    pub include_reposts: bool,

    /// Drop a trailing link to the source platform's shortener
    pub strip_trailing_self_link: bool,

    /// Number of recent posts inspected
    pub max_fetch: usize,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            limit: None,
            dry_run: false,
            mark_seen_only: false,
            delay_between_sends: DEFAULT_DELAY,
            include_reposts: false,
            strip_trailing_self_link: false,
            max_fetch: DEFAULT_MAX_FETCH,
        }
    }
}

/// Outcome of forwarding one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardResult {
    /// Sends attempted (or posts marked as seen)
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Candidates that would have been sent, for dry runs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dry_run: Vec<Candidate>,
}

/// Forwards source posts to destination accounts
#[derive(Clone)]
pub struct Forwarder {
    timeline: Arc<dyn SourceTimeline>,
    media: Arc<dyn MediaFetcher>,
    destinations: Arc<dyn DestinationProvider>,
    transformer: Transformer,
}

impl Forwarder {
    pub fn new(
        timeline: Arc<dyn SourceTimeline>,
        media: Arc<dyn MediaFetcher>,
        destinations: Arc<dyn DestinationProvider>,
    ) -> Self {
        Self {
            timeline,
            media,
            destinations,
            transformer: Transformer::new(false, false),
        }
    }

    pub fn with_content_warnings(mut self, rules: ContentWarningRules) -> Self {
        self.transformer = self.transformer.with_content_warnings(rules);
        self
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if `domain` cannot be used in a link pattern.
    pub fn with_shortener_domain(mut self, domain: &str) -> Result<Self> {
        self.transformer = self.transformer.with_shortener_domain(domain)?;
        Ok(self)
    }

    /// Forward the new posts of `source` to `destination`.
    ///
    /// `ledger` is updated in place and saved to `store` after each
    /// successful send (and once after marking posts as seen). Dry runs
    /// leave both untouched and never contact the destination.
    ///
    /// # Errors
    ///
    /// Returns an error when the timeline cannot be read, the destination
    /// cannot be connected, or the ledger cannot be saved. Failures of
    /// individual candidates are counted in [`ForwardResult::failed`].
    pub async fn forward(
        &self,
        ledger: &mut Ledger,
        store: &LedgerStore,
        source: &str,
        destination: &DestinationHandle,
        options: &ForwardOptions,
    ) -> Result<ForwardResult> {
        let transformer = self
            .transformer
            .clone()
            .with_flags(options.include_reposts, options.strip_trailing_self_link);
        let forwarded = ledger.forwarded(source);

        let mut candidates = collect(
            self.timeline.as_ref(),
            source,
            &forwarded,
            &transformer,
            options.max_fetch,
        )
        .await?;

        if options.mark_seen_only {
            let marked = candidates.len();
            for candidate in candidates {
                ledger.mark_forwarded(source, candidate.id);
            }
            store.save(ledger)?;
            info!("Marked {} post(s) of @{} as seen", marked, source);
            return Ok(ForwardResult {
                attempted: marked,
                succeeded: marked,
                ..Default::default()
            });
        }

        if let Some(limit) = options.limit {
            let excess = candidates.len().saturating_sub(limit);
            candidates.drain(..excess);
        }

        if options.dry_run {
            for candidate in &candidates {
                info!(
                    "[dry run] @{} -> {}: {} {}",
                    source,
                    destination,
                    candidate.text,
                    candidate.media.join(" ")
                );
            }
            return Ok(ForwardResult {
                dry_run: candidates,
                ..Default::default()
            });
        }

        let mut result = ForwardResult::default();
        if candidates.is_empty() {
            info!("Nothing new to forward for @{}", source);
            return Ok(result);
        }

        let client = self.destinations.connect(destination).await?;

        for (num, candidate) in candidates.into_iter().enumerate() {
            if num > 0 && !options.delay_between_sends.is_zero() {
                sleep(options.delay_between_sends).await;
            }

            result.attempted += 1;
            match self.send(client.as_ref(), &candidate).await {
                Ok(status_id) => {
                    info!(
                        "[forwarding] @{} -> {} ({}): {} {}",
                        source,
                        destination,
                        status_id,
                        candidate.text,
                        candidate.media.join(" ")
                    );
                    ledger.mark_forwarded(source, candidate.id);
                    store.save(ledger)?;
                    result.succeeded += 1;
                }
                Err(e) => {
                    error!(
                        "Could not forward post [{}] '{}' because '{}', skipping for now",
                        candidate.id, candidate.text, e
                    );
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }

    /// Upload the media of `candidate`, then publish it
    async fn send(&self, destination: &dyn Destination, candidate: &Candidate) -> Result<String> {
        let mut media_ids = Vec::with_capacity(candidate.media.len());
        for url in &candidate.media {
            let media = self.media.fetch(url).await?;
            media_ids.push(destination.upload_media(&media).await?);
        }

        destination
            .publish(
                &candidate.text,
                &media_ids,
                candidate.content_warning.as_deref(),
            )
            .await
    }
}
