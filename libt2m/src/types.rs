//! Core types for t2m

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, T2mError};

/// Opaque identifier of a source post.
///
/// Twitter IDs are numeric, but the ledger must round-trip whatever was
/// written to it, so string IDs are kept as strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Numeric(id) => write!(f, "{}", id),
            PostId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<u64> for PostId {
    fn from(id: u64) -> Self {
        PostId::Numeric(id)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        PostId::Text(id.to_string())
    }
}

/// A shortened URL as reported by the source API, with its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntity {
    pub short: String,
    pub expanded: String,
}

impl UrlEntity {
    pub fn new(short: impl Into<String>, expanded: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            expanded: expanded.into(),
        }
    }
}

/// A post referenced by a repost or a quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedPost {
    pub id: PostId,
    /// Screen name of the original author (without the leading `@`)
    pub author: String,
    pub text: String,
    pub urls: Vec<UrlEntity>,
    pub media: Vec<String>,
}

/// A source post, decoupled from the shape of any particular source API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    pub id: PostId,
    pub text: String,
    pub urls: Vec<UrlEntity>,
    pub media: Vec<String>,
    pub reposted: Option<ReferencedPost>,
    pub quoted: Option<ReferencedPost>,
}

impl RawPost {
    /// A plain post with no URLs, media or references
    pub fn new(id: impl Into<PostId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            urls: Vec::new(),
            media: Vec::new(),
            reposted: None,
            quoted: None,
        }
    }

    pub fn is_repost(&self) -> bool {
        self.reposted.is_some() || self.quoted.is_some()
    }
}

/// A transformed post, ready to be published on the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: PostId,
    pub text: String,
    pub content_warning: Option<String>,
    pub media: Vec<String>,
}

/// A fully qualified destination account (`user@instance`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHandle {
    user: String,
    instance: String,
}

impl DestinationHandle {
    /// Parse `user@instance`, rejecting handles without an instance part.
    ///
    /// `account` is the source account the handle is linked to; it only
    /// feeds the remediation hint of the error.
    pub fn parse(handle: &str, account: &str) -> Result<Self> {
        let malformed = || T2mError::MalformedDestination {
            account: account.to_string(),
            destination: handle.to_string(),
        };

        let handle = handle.trim().trim_start_matches('@');
        let (user, instance) = handle.split_once('@').ok_or_else(malformed)?;
        if user.is_empty() || instance.is_empty() || instance.contains('@') {
            return Err(malformed());
        }

        Ok(Self {
            user: user.to_string(),
            instance: instance.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Base URL of the instance API
    pub fn instance_url(&self) -> String {
        if self.instance.starts_with("http://") || self.instance.starts_with("https://") {
            self.instance.clone()
        } else {
            format!("https://{}", self.instance)
        }
    }
}

impl fmt::Display for DestinationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.instance)
    }
}
