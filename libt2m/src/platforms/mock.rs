//! Mock platform implementations for testing
//!
//! In-memory stand-ins for the source timeline, the media fetcher and the
//! destination, with recorders so tests can check exactly what was fetched,
//! uploaded and published without credentials or network access.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{Destination, DestinationProvider, MediaFetcher, MediaFile, SourceTimeline};
use crate::types::{DestinationHandle, RawPost};

/// Mock source timeline
///
/// Posts are registered per account in chronological order (oldest first)
/// and served newest first, like a real timeline API.
#[derive(Debug, Clone, Default)]
pub struct MockTimeline {
    posts: HashMap<String, Vec<RawPost>>,
    failures: HashMap<String, String>,
    fetch_calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the timeline of `account`, oldest post first
    pub fn with_posts(mut self, account: &str, posts: Vec<RawPost>) -> Self {
        self.posts.insert(account.to_string(), posts);
        self
    }

    /// Make fetching `account` fail with a network error
    pub fn with_failure(mut self, account: &str, error: &str) -> Self {
        self.failures.insert(account.to_string(), error.to_string());
        self
    }

    /// Accounts and counts requested so far
    pub fn fetch_calls(&self) -> Vec<(String, usize)> {
        self.fetch_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceTimeline for MockTimeline {
    async fn fetch_recent_posts(&self, account: &str, count: usize) -> Result<Vec<RawPost>> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((account.to_string(), count));

        if let Some(error) = self.failures.get(account) {
            return Err(PlatformError::Network(error.clone()).into());
        }

        let posts = self.posts.get(account).cloned().unwrap_or_default();
        Ok(posts.into_iter().rev().take(count).collect())
    }

    fn name(&self) -> &str {
        "mock-timeline"
    }
}

/// Mock media fetcher; the file content is the URL itself
#[derive(Debug, Clone, Default)]
pub struct MockMediaFetcher {
    failing_urls: HashSet<String>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make downloading `url` fail
    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    /// URLs requested so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<MediaFile> {
        self.fetched.lock().unwrap().push(url.to_string());

        if self.failing_urls.contains(url) {
            return Err(PlatformError::Media(format!("Failed to download {}: HTTP 404", url)).into());
        }

        Ok(MediaFile::new(url, url.as_bytes().to_vec()))
    }
}

/// A post recorded by [`MockDestination`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub destination: String,
    pub text: String,
    pub media_ids: Vec<String>,
    pub content_warning: Option<String>,
}

/// Behavior and recorders shared by every destination a [`MockProvider`] hands out
#[derive(Debug, Clone, Default)]
pub struct MockDestinationState {
    /// Uploads of media fetched from these URLs fail
    pub failing_uploads: HashSet<String>,

    /// Publishing a text containing any of these fails
    pub failing_texts: Vec<String>,

    /// Uploaded media URLs, in order
    pub uploads: Arc<Mutex<Vec<String>>>,

    /// Published posts, in order
    pub published: Arc<Mutex<Vec<PublishedPost>>>,

    /// Publish attempts, successful or not
    pub publish_calls: Arc<Mutex<usize>>,
}

/// Mock destination account
#[derive(Debug, Clone)]
pub struct MockDestination {
    handle: String,
    state: MockDestinationState,
}

impl MockDestination {
    pub fn new(handle: &str, state: MockDestinationState) -> Self {
        Self {
            handle: handle.to_string(),
            state,
        }
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn upload_media(&self, media: &MediaFile) -> Result<String> {
        if self.state.failing_uploads.contains(&media.url) {
            return Err(PlatformError::Media(format!(
                "Failed to upload {}: HTTP 422",
                media.file_name
            ))
            .into());
        }

        self.state.uploads.lock().unwrap().push(media.url.clone());
        Ok(format!("media-{}", uuid::Uuid::new_v4()))
    }

    async fn publish(
        &self,
        text: &str,
        media_ids: &[String],
        content_warning: Option<&str>,
    ) -> Result<String> {
        *self.state.publish_calls.lock().unwrap() += 1;

        if self.state.failing_texts.iter().any(|t| text.contains(t.as_str())) {
            return Err(PlatformError::Posting("Mock posting failed".to_string()).into());
        }

        self.state.published.lock().unwrap().push(PublishedPost {
            destination: self.handle.clone(),
            text: text.to_string(),
            media_ids: media_ids.to_vec(),
            content_warning: content_warning.map(str::to_string),
        });

        Ok(format!("{}:mock-{}", self.handle, uuid::Uuid::new_v4()))
    }

    fn name(&self) -> &str {
        "mock-destination"
    }
}

/// Hands out [`MockDestination`]s that share one [`MockDestinationState`]
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: MockDestinationState,
    auth_failures: HashSet<String>,
    connections: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MockDestinationState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Make connecting to `handle` fail authentication
    pub fn with_auth_failure(mut self, handle: &str) -> Self {
        self.auth_failures.insert(handle.to_string());
        self
    }

    /// Handles connected so far, in order
    pub fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<PublishedPost> {
        self.state.published.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn publish_calls(&self) -> usize {
        *self.state.publish_calls.lock().unwrap()
    }
}

#[async_trait]
impl DestinationProvider for MockProvider {
    async fn connect(&self, handle: &DestinationHandle) -> Result<Box<dyn Destination>> {
        let handle = handle.to_string();
        self.connections.lock().unwrap().push(handle.clone());

        if self.auth_failures.contains(&handle) {
            return Err(PlatformError::Authentication(format!(
                "No credentials for {}",
                handle
            ))
            .into());
        }

        Ok(Box::new(MockDestination::new(&handle, self.state.clone())))
    }
}
