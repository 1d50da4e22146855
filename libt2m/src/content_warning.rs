//! Automatic content warnings
//!
//! Rules come from a JSON document mapping a label to one or more regular
//! expressions. Rules are tried in document order and the first matching
//! pattern wins:
//!
//! - if the pattern has a capture group, the text of the first group is the
//!   label and every match of the pattern is removed from the post body;
//! - otherwise the rule's key is the label and the body is left alone.
//!
//! ```json
//! {
//!     "politics": ["election", "parliament"],
//!     "spoiler": ["\\[(spoiler[^\\]]*)\\] ?"]
//! }
//! ```

use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone)]
struct Rule {
    label: String,
    patterns: Vec<Regex>,
}

/// Outcome of running the rules against a post body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub label: Option<String>,
    pub text: String,
}

/// Ordered content-warning rule set
#[derive(Debug, Clone, Default)]
pub struct ContentWarningRules {
    rules: Vec<Rule>,
}

impl ContentWarningRules {
    /// Compile rules from `(label, patterns)` pairs, keeping their order
    pub fn new<L, P>(rules: impl IntoIterator<Item = (L, Vec<P>)>) -> Result<Self>
    where
        L: Into<String>,
        P: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for (label, patterns) in rules {
            let label = label.into();
            let patterns = patterns
                .iter()
                .map(|p| {
                    Regex::new(p.as_ref()).map_err(|e| ConfigError::InvalidRule {
                        label: label.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            compiled.push(Rule { label, patterns });
        }
        Ok(Self { rules: compiled })
    }

    /// Parse the JSON rule document
    pub fn from_json(json: &str) -> Result<Self> {
        let ordered: OrderedRules =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidRule {
                label: "<document>".to_string(),
                reason: e.to_string(),
            })?;
        Self::new(ordered.0)
    }

    /// Load rules from `path`. A missing file means no rules.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No content warning rules at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_json(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Find the content warning for `text`, possibly rewriting it
    pub fn detect(&self, text: &str) -> Detection {
        for rule in &self.rules {
            for pattern in &rule.patterns {
                let Some(captures) = pattern.captures(text) else {
                    continue;
                };

                if pattern.captures_len() > 1 {
                    // A group that did not take part in the match falls
                    // back to the rule key.
                    let label = captures
                        .get(1)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_else(|| rule.label.clone());
                    return Detection {
                        label: Some(label),
                        text: pattern.replace_all(text, "").into_owned(),
                    };
                }

                return Detection {
                    label: Some(rule.label.clone()),
                    text: text.to_string(),
                };
            }
        }

        Detection {
            label: None,
            text: text.to_string(),
        }
    }
}

/// JSON object deserialized as an ordered list of entries
struct OrderedRules(Vec<(String, Vec<String>)>);

#[derive(Deserialize)]
#[serde(untagged)]
enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for OrderedRules {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = OrderedRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of content warning labels to pattern lists")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some((label, patterns)) = map.next_entry::<String, Patterns>()? {
                    let patterns = match patterns {
                        Patterns::One(p) => vec![p],
                        Patterns::Many(ps) => ps,
                    };
                    rules.push((label, patterns));
                }
                Ok(OrderedRules(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}
