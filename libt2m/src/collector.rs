//! Candidate collection
//!
//! Reads the recent timeline of a source account and turns it into the
//! ordered list of candidates to publish, oldest first.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::platforms::SourceTimeline;
use crate::transform::Transformer;
use crate::types::{Candidate, PostId};

/// Number of recent posts inspected per account unless configured otherwise
pub const DEFAULT_MAX_FETCH: usize = 200;

/// Collect the candidates of `account` in chronological order.
///
/// Up to `max_fetch` of the most recent posts are inspected; posts the
/// transformer rejects (already forwarded, replies, unwanted reposts) are
/// dropped. `forwarded` is only read.
pub async fn collect(
    timeline: &dyn SourceTimeline,
    account: &str,
    forwarded: &BTreeSet<PostId>,
    transformer: &Transformer,
    max_fetch: usize,
) -> Result<Vec<Candidate>> {
    let mut posts = timeline.fetch_recent_posts(account, max_fetch).await?;
    posts.reverse();

    let fetched = posts.len();
    let candidates: Vec<Candidate> = posts
        .iter()
        .filter_map(|post| transformer.transform(post, forwarded))
        .collect();

    tracing::debug!(
        "Collected {} candidate(s) out of {} post(s) from @{} on {}",
        candidates.len(),
        fetched,
        account,
        timeline.name()
    );

    Ok(candidates)
}
