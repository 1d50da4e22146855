//! Source post -> candidate transformation
//!
//! Decides whether a source post is forwarded at all and, if so, produces the
//! text, content warning and media list that will be published.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::content_warning::ContentWarningRules;
use crate::error::{ConfigError, Result};
use crate::types::{Candidate, PostId, RawPost, ReferencedPost, UrlEntity};

/// Longest quote text kept before the quoted body is replaced
pub const QUOTE_LENGTH_CEILING: usize = 500;

/// Replaces the quoted body of quotes that would be too long
pub const QUOTE_PLACEHOLDER: &str = "Quoted tweet's link below";

/// Default domain of the source platform's link shortener
pub const DEFAULT_SHORTENER_DOMAIN: &str = "t.co";

static DEFAULT_TRAILING_LINK: LazyLock<Regex> = LazyLock::new(|| {
    trailing_link_pattern(DEFAULT_SHORTENER_DOMAIN).expect("invalid default trailing link pattern")
});

/// Transformation settings and rules
#[derive(Debug, Clone)]
pub struct Transformer {
    include_reposts: bool,
    strip_trailing_self_link: bool,
    trailing_link: Regex,
    content_warnings: ContentWarningRules,
}

impl Transformer {
    pub fn new(include_reposts: bool, strip_trailing_self_link: bool) -> Self {
        Self {
            include_reposts,
            strip_trailing_self_link,
            trailing_link: DEFAULT_TRAILING_LINK.clone(),
            content_warnings: ContentWarningRules::default(),
        }
    }

    /// Same rules, other repost and trailing link settings
    pub fn with_flags(mut self, include_reposts: bool, strip_trailing_self_link: bool) -> Self {
        self.include_reposts = include_reposts;
        self.strip_trailing_self_link = strip_trailing_self_link;
        self
    }

    /// Use another shortener domain for trailing self-link detection
    pub fn with_shortener_domain(mut self, domain: &str) -> Result<Self> {
        if domain.is_empty() || domain.contains('/') || domain.contains(' ') {
            return Err(ConfigError::InvalidValue {
                field: "defaults.shortener_domain".to_string(),
                reason: format!("'{}' is not a domain name", domain),
            }
            .into());
        }
        self.trailing_link = trailing_link_pattern(domain).map_err(|e| ConfigError::InvalidValue {
            field: "defaults.shortener_domain".to_string(),
            reason: e.to_string(),
        })?;
        Ok(self)
    }

    pub fn with_content_warnings(mut self, rules: ContentWarningRules) -> Self {
        self.content_warnings = rules;
        self
    }

    /// Transform `post`, or return `None` when it must not be forwarded
    pub fn transform(&self, post: &RawPost, forwarded: &BTreeSet<PostId>) -> Option<Candidate> {
        if post.is_repost() {
            if !self.include_reposts {
                tracing::debug!("Skipping repost {}", post.id);
                return None;
            }
        } else if post.text.starts_with('@') {
            // Replies are not public enough to be forwarded.
            tracing::debug!("Skipping reply {}", post.id);
            return None;
        }

        let (mut text, urls, media) = match (&post.reposted, &post.quoted) {
            (None, None) => (post.text.clone(), post.urls.clone(), post.media.clone()),
            (Some(original), _) => (
                repost_block(original, &original.text),
                original.urls.clone(),
                original.media.clone(),
            ),
            (None, Some(quoted)) => {
                let mut urls = post.urls.clone();
                urls.extend(quoted.urls.iter().cloned());
                (quote_text(&post.text, quoted), urls, quoted.media.clone())
            }
        };

        if forwarded.contains(&post.id) {
            return None;
        }

        text = expand_urls(&text, &urls);

        if self.strip_trailing_self_link {
            text = strip_trailing_link(&self.trailing_link, &text);
        }

        let text = unescape_html(&text);
        let detection = self.content_warnings.detect(&text);

        Some(Candidate {
            id: post.id.clone(),
            text: detection.text,
            content_warning: detection.label,
            media,
        })
    }
}

/// Canonical link to a post on the source platform
pub fn post_link(author: &str, id: &PostId) -> String {
    format!("https://twitter.com/{}/status/{}", author, id)
}

fn repost_block(original: &ReferencedPost, body: &str) -> String {
    format!(
        "« {} »\n\n— Retweet {}",
        body,
        post_link(&original.author, &original.id)
    )
}

fn quote_text(own: &str, quoted: &ReferencedPost) -> String {
    let text = format!("{}\n\n{}", own, repost_block(quoted, &quoted.text));
    if text.chars().count() <= QUOTE_LENGTH_CEILING {
        return text;
    }
    format!("{}\n\n{}", own, repost_block(quoted, QUOTE_PLACEHOLDER))
}

/// Replace every shortened URL by its expanded target
pub fn expand_urls(text: &str, urls: &[UrlEntity]) -> String {
    urls.iter()
        .filter(|url| !url.short.is_empty())
        .fold(text.to_string(), |text, url| {
            text.replace(&url.short, &url.expanded)
        })
}

/// ` https://<domain>/<10 chars>` anchored at the end of the text
fn trailing_link_pattern(domain: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(r" https://{}/[^/ ]{{10}}$", regex::escape(domain)))
}

/// Remove a shortened self-link at the very end of `text`.
///
/// Links elsewhere in the text are kept.
pub fn strip_trailing_link(pattern: &Regex, text: &str) -> String {
    match pattern.find(text) {
        Some(m) if m.end() == text.len() => text[..m.start()].to_string(),
        _ => text.to_string(),
    }
}

/// Longest entity reference considered, `&` and `;` excluded
const MAX_ENTITY_LEN: usize = 32;

/// Decode the HTML entities the source API leaves in post text.
///
/// Named entities follow the HTML5 table. Numeric references to NUL,
/// surrogates or values past U+10FFFF become U+FFFD, and the C1 range maps
/// to windows-1252 as browsers do. Unknown references are kept as written.
pub fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let decoded = rest
            .find(';')
            .filter(|&end| end > 1 && end <= MAX_ENTITY_LEN + 1)
            .and_then(|end| decode_entity(&rest[1..end]).map(|s| (s, end)));

        match decoded {
            Some((s, end)) => {
                out.push_str(&s);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                u32::from_str_radix(hex, 16).unwrap_or(u32::MAX)
            }
            None if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => {
                number.parse().unwrap_or(u32::MAX)
            }
            _ => return None,
        };
        return Some(decode_code_point(code).to_string());
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let reference = format!("&{};", name);
    let decoded = html_escape::decode_html_entities(&reference);
    (decoded != reference).then(|| decoded.into_owned())
}

fn decode_code_point(code: u32) -> char {
    match code {
        0x80..=0x9f => WINDOWS_1252_C1[(code - 0x80) as usize],
        0 => '\u{fffd}',
        _ => char::from_u32(code).unwrap_or('\u{fffd}'),
    }
}

/// Characters browsers substitute for C1 control references
const WINDOWS_1252_C1: [char; 32] = [
    '\u{20ac}', '\u{81}', '\u{201a}', '\u{192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2c6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8d}', '\u{17d}', '\u{8f}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2dc}', '\u{2122}', '\u{161}', '\u{203a}', '\u{153}', '\u{9d}', '\u{17e}', '\u{178}',
];
