//! Platform abstraction and implementations
//!
//! Forwarding talks to three collaborators, each behind a trait so the
//! pipeline can be exercised without network access:
//!
//! - [`SourceTimeline`]: recent posts of a source account (Twitter);
//! - [`MediaFetcher`]: downloads attached media;
//! - [`Destination`]: uploads media and publishes posts (Mastodon), obtained
//!   per destination account from a [`DestinationProvider`].
//!
//! # Examples
//!
//! ```no_run
//! use libt2m::platforms::{Destination, DestinationProvider, mastodon::MastodonProvider};
//! use libt2m::types::DestinationHandle;
//!
//! # async fn example() -> libt2m::error::Result<()> {
//! let provider = MastodonProvider::new("~/.config/t2m/mastodon");
//! let handle = DestinationHandle::parse("alice@mastodon.social", "alice_tw")?;
//! let destination = provider.connect(&handle).await?;
//!
//! let status_id = destination.publish("Hello from t2m", &[], None).await?;
//! println!("Published {}", status_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DestinationHandle, RawPost};

pub mod mastodon;
pub mod media;
pub mod twitter;

// Mock platforms are available for all builds (not just tests) to support integration tests
pub mod mock;

/// Source of posts to forward
#[async_trait]
pub trait SourceTimeline: Send + Sync {
    /// Fetch up to `count` of the most recent posts of `account`.
    ///
    /// Posts are returned newest first, as source APIs do.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Network` or `PlatformError::Authentication` when
    /// the timeline cannot be read.
    async fn fetch_recent_posts(&self, account: &str, count: usize) -> Result<Vec<RawPost>>;

    /// Lowercase platform identifier (e.g. "twitter")
    fn name(&self) -> &str;
}

/// A downloaded media file, ready to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Where the media was fetched from
    pub url: String,
    /// File name used for the upload (keeps the original extension)
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(url: &str, bytes: Vec<u8>) -> Self {
        Self {
            url: url.to_string(),
            file_name: file_name_for(url),
            bytes,
        }
    }
}

/// Last path segment of `url`, without query string or fragment
fn file_name_for(url: &str) -> String {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "media".to_string(),
    }
}

/// Downloads media attached to source posts
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns `PlatformError::Media` if the media cannot be downloaded.
    async fn fetch(&self, url: &str) -> Result<MediaFile>;
}

/// Account posts are forwarded to
#[async_trait]
pub trait Destination: Send + Sync {
    /// Upload a media file and return the platform's media ID
    async fn upload_media(&self, media: &MediaFile) -> Result<String>;

    /// Publish a post and return the platform's post ID.
    ///
    /// `media_ids` are IDs returned by [`Destination::upload_media`];
    /// `content_warning` hides the text behind a click-through.
    async fn publish(
        &self,
        text: &str,
        media_ids: &[String],
        content_warning: Option<&str>,
    ) -> Result<String>;

    /// Lowercase platform identifier (e.g. "mastodon")
    fn name(&self) -> &str;
}

/// Creates authenticated [`Destination`] clients for destination accounts
#[async_trait]
pub trait DestinationProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` when no usable credentials
    /// exist for `handle`.
    async fn connect(&self, handle: &DestinationHandle) -> Result<Box<dyn Destination>>;
}
