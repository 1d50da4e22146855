//! t2m - forward Twitter timelines to Mastodon
//!
//! This library holds everything but the command line: the forwarding
//! ledger, the post transformation rules, the forwarding engine and the
//! platform adapters it drives.

pub mod collector;
pub mod config;
pub mod content_warning;
pub mod error;
pub mod forwarder;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use content_warning::ContentWarningRules;
pub use error::{Result, T2mError};
pub use forwarder::{ForwardOptions, ForwardResult, Forwarder};
pub use ledger::{AccountLink, Ledger, LedgerStore};
pub use orchestrator::{AccountSummary, LinkSummary, Orchestrator};
pub use transform::Transformer;
pub use types::{Candidate, DestinationHandle, PostId, RawPost, ReferencedPost, UrlEntity};
