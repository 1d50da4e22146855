//! Twitter source timeline
//!
//! Reads a user's timeline through the v1.1 `statuses/user_timeline`
//! endpoint with app-only (bearer token) authentication, and converts the
//! tweets into [`RawPost`]s.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::config::TwitterConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::SourceTimeline;
use crate::types::{PostId, RawPost, ReferencedPost, UrlEntity};

/// Largest page the timeline endpoint serves
const MAX_PAGE_SIZE: usize = 200;

/// Twitter API client
pub struct TwitterClient {
    client: reqwest::Client,
    api_base: String,
    bearer_token: SecretString,
}

impl TwitterClient {
    pub fn new(api_base: &str, bearer_token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("t2m/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    /// Create a client from configuration, reading the bearer token
    pub fn from_config(config: &TwitterConfig) -> Result<Self> {
        let token = config.bearer_token()?;
        Self::new(&config.api_base, token)
    }

    async fn fetch_page(
        &self,
        account: &str,
        count: usize,
        max_id: Option<u64>,
    ) -> Result<Vec<TweetJson>> {
        let url = format!("{}/1.1/statuses/user_timeline.json", self.api_base);
        let mut query = vec![
            ("screen_name", account.to_string()),
            ("count", count.to_string()),
            ("tweet_mode", "extended".to_string()),
            ("include_rts", "true".to_string()),
        ];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .bearer_auth(self.bearer_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!("Twitter timeline request for {} failed: {}", account, e))
            })?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => {
                return Err(PlatformError::Authentication(format!(
                    "Twitter rejected the bearer token (HTTP {}). \
                     Suggestion: check twitter.bearer_token_file in the configuration.",
                    status
                ))
                .into())
            }
            429 => {
                return Err(PlatformError::RateLimit(format!(
                    "Twitter rate limit exceeded while reading {}",
                    account
                ))
                .into())
            }
            _ => {
                return Err(PlatformError::Network(format!(
                    "Twitter timeline request for {} failed: HTTP {}",
                    account, status
                ))
                .into())
            }
        }

        response.json::<Vec<TweetJson>>().await.map_err(|e| {
            PlatformError::Network(format!("Failed to parse Twitter timeline for {}: {}", account, e))
                .into()
        })
    }
}

#[async_trait]
impl SourceTimeline for TwitterClient {
    async fn fetch_recent_posts(&self, account: &str, count: usize) -> Result<Vec<RawPost>> {
        let mut posts = Vec::new();
        let mut max_id = None;

        while posts.len() < count {
            let page_size = (count - posts.len()).min(MAX_PAGE_SIZE);
            let page = self.fetch_page(account, page_size, max_id).await?;
            let Some(oldest) = page.last().map(|t| t.id) else {
                break;
            };

            let exhausted = page.len() < page_size;
            posts.extend(page.into_iter().map(TweetJson::into_raw_post));
            if exhausted || oldest == 0 {
                break;
            }
            max_id = Some(oldest - 1);
        }

        posts.truncate(count);
        tracing::debug!("Fetched {} posts from @{}", posts.len(), account);
        Ok(posts)
    }

    fn name(&self) -> &str {
        "twitter"
    }
}

#[derive(Debug, Deserialize)]
struct TweetJson {
    id: u64,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    text: Option<String>,
    user: UserJson,
    #[serde(default)]
    entities: EntitiesJson,
    #[serde(default)]
    extended_entities: Option<EntitiesJson>,
    #[serde(default)]
    retweeted_status: Option<Box<TweetJson>>,
    #[serde(default)]
    quoted_status: Option<Box<TweetJson>>,
}

#[derive(Debug, Deserialize)]
struct UserJson {
    screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct EntitiesJson {
    #[serde(default)]
    urls: Vec<UrlJson>,
    #[serde(default)]
    media: Vec<MediaJson>,
}

#[derive(Debug, Deserialize)]
struct UrlJson {
    url: String,
    #[serde(default)]
    expanded_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaJson {
    #[serde(default)]
    media_url_https: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
}

impl TweetJson {
    fn text(&self) -> String {
        self.full_text
            .clone()
            .or_else(|| self.text.clone())
            .unwrap_or_default()
    }

    fn urls(&self) -> Vec<UrlEntity> {
        self.entities
            .urls
            .iter()
            .filter_map(|u| {
                u.expanded_url
                    .as_ref()
                    .map(|expanded| UrlEntity::new(u.url.clone(), expanded.clone()))
            })
            .collect()
    }

    /// Attached media; extended entities list every image, plain entities
    /// only the first one
    fn media(&self) -> Vec<String> {
        let media = match &self.extended_entities {
            Some(extended) if !extended.media.is_empty() => &extended.media,
            _ => &self.entities.media,
        };
        media
            .iter()
            .filter_map(|m| m.media_url_https.clone().or_else(|| m.media_url.clone()))
            .collect()
    }

    fn into_referenced(self) -> ReferencedPost {
        ReferencedPost {
            id: PostId::Numeric(self.id),
            text: self.text(),
            urls: self.urls(),
            media: self.media(),
            author: self.user.screen_name,
        }
    }

    fn into_raw_post(self) -> RawPost {
        let text = self.text();
        let urls = self.urls();
        let media = self.media();

        // A retweet of a quote carries both; it is a retweet.
        let (reposted, quoted) = match (self.retweeted_status, self.quoted_status) {
            (Some(original), _) => (Some(original.into_referenced()), None),
            (None, Some(quoted)) => (None, Some(quoted.into_referenced())),
            (None, None) => (None, None),
        };

        RawPost {
            id: PostId::Numeric(self.id),
            text,
            urls,
            media,
            reposted,
            quoted,
        }
    }
}
