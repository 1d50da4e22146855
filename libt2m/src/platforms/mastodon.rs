//! Mastodon destination
//!
//! Publishes forwarded posts to Mastodon (and other Fediverse servers that
//! implement the Mastodon API) using the megalodon library.

use async_trait::async_trait;
use megalodon::{Megalodon, SNS};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{PlatformError, Result};
use crate::platforms::{Destination, DestinationProvider, MediaFile};
use crate::types::DestinationHandle;

/// Mastodon platform client for one account
pub struct MastodonClient {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,

    /// Character limit for posts (instance-specific)
    character_limit: usize,
}

impl MastodonClient {
    /// Create a new Mastodon client
    ///
    /// # Arguments
    ///
    /// * `instance_url` - The base URL of the Mastodon instance (e.g., "https://mastodon.social")
    /// * `access_token` - OAuth access token for authentication
    ///
    /// The client starts with the default 500 character limit. Call
    /// `fetch_instance_info()` to get the instance's actual limit.
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            Some(format!("t2m/{}", env!("CARGO_PKG_VERSION"))),
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
            character_limit: 500,
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn character_limit(&self) -> usize {
        self.character_limit
    }

    /// Verify the access token against the instance
    pub async fn authenticate(&self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;
        Ok(())
    }

    /// Fetch the instance's character limit
    pub async fn fetch_instance_info(&mut self) -> Result<()> {
        let response = self
            .client
            .get_instance()
            .await
            .map_err(|e| map_megalodon_error(e, "fetch instance info"))?;

        let limit = response.json.configuration.statuses.max_characters;
        self.character_limit = limit as usize;

        Ok(())
    }

    /// Text may only be empty when media carry the post
    fn validate_content(&self, content: &str, has_media: bool) -> Result<()> {
        let char_count = content.chars().count();

        if char_count > self.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            ))
            .into());
        }

        if content.trim().is_empty() && !has_media {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

#[async_trait]
impl Destination for MastodonClient {
    async fn upload_media(&self, media: &MediaFile) -> Result<String> {
        // megalodon uploads from a path, so stage the bytes in a temporary
        // file that keeps the original extension.
        let mut staged = tempfile::Builder::new()
            .prefix("t2m-")
            .suffix(&format!("-{}", media.file_name))
            .tempfile()
            .map_err(|e| PlatformError::Media(format!("Failed to stage {}: {}", media.url, e)))?;
        staged
            .write_all(&media.bytes)
            .and_then(|_| staged.flush())
            .map_err(|e| PlatformError::Media(format!("Failed to stage {}: {}", media.url, e)))?;

        let path = staged.path().to_string_lossy().to_string();
        let response = self
            .client
            .upload_media(path, None)
            .await
            .map_err(|e| map_megalodon_error(e, "upload media"))?;

        let media_id = match response.json {
            megalodon::entities::UploadMedia::Attachment(attachment) => attachment.id,
            megalodon::entities::UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };

        Ok(media_id)
    }

    async fn publish(
        &self,
        text: &str,
        media_ids: &[String],
        content_warning: Option<&str>,
    ) -> Result<String> {
        self.validate_content(text, !media_ids.is_empty())?;

        let options = megalodon::megalodon::PostStatusInputOptions {
            media_ids: (!media_ids.is_empty()).then(|| media_ids.to_vec()),
            spoiler_text: content_warning.map(str::to_string),
            ..Default::default()
        };

        let response = self
            .client
            .post_status(text.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => status.id,
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }

    fn name(&self) -> &str {
        "mastodon"
    }
}

/// Builds [`MastodonClient`]s from per-account token files.
///
/// The token of `alice@mastodon.social` is read from
/// `<credentials_dir>/alice@mastodon.social.token`.
#[derive(Debug, Clone)]
pub struct MastodonProvider {
    credentials_dir: String,
}

impl MastodonProvider {
    pub fn new(credentials_dir: impl Into<String>) -> Self {
        Self {
            credentials_dir: credentials_dir.into(),
        }
    }

    /// Path of the token file for `handle`
    pub fn token_path(&self, handle: &DestinationHandle) -> Result<PathBuf> {
        let dir = shellexpand::full(&self.credentials_dir).map_err(|e| {
            PlatformError::Authentication(format!("Failed to expand credentials path: {}", e))
        })?;
        Ok(PathBuf::from(dir.as_ref()).join(format!("{}.token", handle)))
    }

    /// Read the access token for `handle`
    pub fn read_token(&self, handle: &DestinationHandle) -> Result<String> {
        let path = self.token_path(handle)?;
        let token = std::fs::read_to_string(&path)
            .map_err(|e| {
                PlatformError::Authentication(format!(
                    "Failed to read Mastodon token file {}: {}. \
                     Suggestion: create an application on {} and store its access token there.",
                    path.display(),
                    e,
                    handle.instance()
                ))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Mastodon token file {} is empty",
                path.display()
            ))
            .into());
        }

        Ok(token)
    }
}

#[async_trait]
impl DestinationProvider for MastodonProvider {
    async fn connect(&self, handle: &DestinationHandle) -> Result<Box<dyn Destination>> {
        let token = self.read_token(handle)?;
        let mut client = MastodonClient::new(handle.instance_url(), token)?;
        client.authenticate().await?;

        if let Err(e) = client.fetch_instance_info().await {
            tracing::warn!(
                "Could not fetch instance info for {}, keeping {} character limit: {}",
                handle,
                client.character_limit(),
                e
            );
        }

        Ok(Box::new(client))
    }
}

/// Map megalodon errors to PlatformError
///
/// - HTTP 401/403 → `PlatformError::Authentication` (OAuth token issues)
/// - HTTP 422 → `PlatformError::Validation` (content validation failures)
/// - HTTP 429 → `PlatformError::RateLimit` (rate limit exceeded)
/// - HTTP 5xx → `PlatformError::Network` (server errors)
/// - Parse errors → `PlatformError::Posting` (response parsing failures)
/// - Other errors → `PlatformError::Network` (network/connection issues)
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error(&error.to_string(), context)
}

fn classify_error(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                    Suggestion: Verify the access token in the credentials directory is valid.",
            context, error_str
        )),
        Some(422) => PlatformError::Validation(format!(
            "Mastodon validation failed ({}): {}",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}. \
                    Suggestion: Increase the delay between sends.",
            context, error_str
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("token")
            {
                PlatformError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("parse")
                || error_lower.contains("json")
                || error_lower.contains("deserialize")
            {
                PlatformError::Posting(format!(
                    "Mastodon response parse error ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PlatformError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else {
                PlatformError::Network(format!(
                    "Mastodon error ({}): {}. \
                        Suggestion: Check your network connection and instance availability.",
                    context, error_str
                ))
            }
        }
    }
}

/// Extract HTTP status code from error message
///
/// Looks for patterns like "HTTP 401", "status 403", "401:", etc.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code_str) = after_prefix.get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    // Standalone 3-digit codes followed by colon or space
    for (i, window) in error_str.as_bytes().windows(4).enumerate() {
        if window[0].is_ascii_digit()
            && window[1].is_ascii_digit()
            && window[2].is_ascii_digit()
            && (window[3] == b':' || window[3] == b' ')
        {
            if let Ok(code_str) = std::str::from_utf8(&window[0..3]) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code)
                        && (i == 0 || !error_str.as_bytes()[i - 1].is_ascii_digit())
                    {
                        return Some(code);
                    }
                }
            }
        }
    }

    None
}
