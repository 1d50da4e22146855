//! Account-level operations
//!
//! Resolves destination links from the ledger and runs the forwarder for one
//! or every linked source account. Also links accounts and lists them.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Result, T2mError};
use crate::forwarder::{ForwardOptions, ForwardResult, Forwarder};
use crate::ledger::{Ledger, LedgerStore};
use crate::types::{Candidate, DestinationHandle};

/// Outcome of forwarding one source account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub source: String,
    pub destination: String,
    pub attempted: usize,
    pub forwarded: usize,
    pub failed: usize,

    /// Why the account could not be processed, if it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Candidates a dry run would have sent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dry_run: Vec<Candidate>,
}

impl AccountSummary {
    fn new(source: &str, destination: &str, result: ForwardResult) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            attempted: result.attempted,
            forwarded: result.succeeded,
            failed: result.failed,
            error: None,
            dry_run: result.dry_run,
        }
    }

    /// One-line account report
    pub fn summary_line(&self) -> String {
        if self.attempted == 0 {
            return format!("Nothing to do for @{}", self.source);
        }
        format!(
            "@{} -> {}: {} attempted, {} forwarded, {} failed",
            self.source, self.destination, self.attempted, self.forwarded, self.failed
        )
    }

    fn failed(source: &str, destination: &str, error: &T2mError) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            attempted: 0,
            forwarded: 0,
            failed: 0,
            error: Some(error.to_string()),
            dry_run: Vec::new(),
        }
    }
}

/// A source account as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub source: String,
    pub destination: Option<String>,
    /// Number of posts already forwarded or marked as seen
    pub forwarded: usize,
}

/// Runs forwarding over the accounts of a ledger
pub struct Orchestrator {
    forwarder: Forwarder,
    store: LedgerStore,
}

impl Orchestrator {
    pub fn new(forwarder: Forwarder, store: LedgerStore) -> Self {
        Self { forwarder, store }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Forward the posts of one source account.
    ///
    /// `destination` overrides (and replaces) the destination recorded in
    /// the ledger. Dry runs neither record the link nor save the ledger.
    ///
    /// # Errors
    ///
    /// - `MissingLink` when no destination is given or recorded
    /// - `MalformedDestination` when the destination has no instance part
    /// - platform and ledger errors that abort the account
    pub async fn run_one(
        &self,
        source: &str,
        destination: Option<&str>,
        options: &ForwardOptions,
    ) -> Result<AccountSummary> {
        let mut ledger = self.store.load()?;

        let destination = match destination {
            Some(destination) => destination.to_string(),
            None => ledger
                .destination(source)
                .map(str::to_string)
                .ok_or_else(|| T2mError::MissingLink(source.to_string()))?,
        };
        let handle = DestinationHandle::parse(&destination, source)?;

        if options.dry_run {
            let result = self
                .forwarder
                .forward(&mut ledger, &self.store, source, &handle, options)
                .await?;
            return Ok(AccountSummary::new(source, &handle.to_string(), result));
        }

        ledger.link(source, &handle.to_string());
        let outcome = self
            .forwarder
            .forward(&mut ledger, &self.store, source, &handle, options)
            .await;
        self.store.save(&ledger)?;

        let summary = AccountSummary::new(source, &handle.to_string(), outcome?);
        log_summary(&summary);
        Ok(summary)
    }

    /// Forward the posts of every linked source account.
    ///
    /// Accounts without a destination are skipped with a warning. Failures
    /// of one account are recorded in its summary and the run moves on;
    /// ledger failures and destinations without an instance part abort the
    /// run, keeping what earlier accounts forwarded.
    pub async fn run_all(&self, options: &ForwardOptions) -> Result<Vec<AccountSummary>> {
        let mut ledger = self.store.load()?;
        let mut summaries = Vec::new();

        for source in ledger.sources() {
            let Some(destination) = ledger.destination(&source).map(str::to_string) else {
                warn!(
                    "No mastodon handle for twitter account '{}', add one using the 't2m add' command. Skipped.",
                    source
                );
                continue;
            };

            // Accounts processed so far are already saved.
            let handle = DestinationHandle::parse(&destination, &source).inspect_err(|e| {
                error!("Stopping: {}", e);
            })?;

            let outcome = self
                .forwarder
                .forward(&mut ledger, &self.store, &source, &handle, options)
                .await;

            let summary = match outcome {
                Ok(result) => AccountSummary::new(&source, &destination, result),
                Err(e @ T2mError::Ledger(_)) => return Err(e),
                Err(e) => {
                    error!("Could not forward posts of @{}: {}", source, e);
                    AccountSummary::failed(&source, &destination, &e)
                }
            };
            log_summary(&summary);
            summaries.push(summary);

            if !options.dry_run {
                self.store.save(&ledger)?;
            }
        }

        Ok(summaries)
    }

    /// See [`link_accounts`]
    pub fn add(&self, source: &str, destination: &str) -> Result<()> {
        link_accounts(&self.store, source, destination)
    }

    /// See [`list_links`]
    pub fn list(&self) -> Result<Vec<LinkSummary>> {
        list_links(&self.store)
    }
}

/// Link `source` to `destination` and save the ledger.
///
/// Only the ledger is needed, so this works without platform credentials.
///
/// # Errors
///
/// `MalformedDestination` when the destination has no instance part.
pub fn link_accounts(store: &LedgerStore, source: &str, destination: &str) -> Result<()> {
    let handle = DestinationHandle::parse(destination, source)?;

    let mut ledger = store.load()?;
    ledger.link(source, &handle.to_string());
    store.save(&ledger)?;

    info!("Linked @{} to {}", source, handle);
    Ok(())
}

/// Source accounts known to the ledger, sorted by name
pub fn list_links(store: &LedgerStore) -> Result<Vec<LinkSummary>> {
    let ledger = store.load()?;
    Ok(summarize(&ledger))
}

fn summarize(ledger: &Ledger) -> Vec<LinkSummary> {
    ledger
        .iter()
        .map(|(source, link)| LinkSummary {
            source: source.clone(),
            destination: link.destination.clone().filter(|d| !d.is_empty()),
            forwarded: link.done.len(),
        })
        .collect()
}

fn log_summary(summary: &AccountSummary) {
    if summary.dry_run.is_empty() && summary.error.is_none() {
        info!("{}", summary.summary_line());
    }
}
