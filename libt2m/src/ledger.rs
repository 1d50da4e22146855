//! Forwarding ledger
//!
//! The ledger maps each source account to its linked destination account and
//! to the set of source post IDs already forwarded. It is stored as a JSON
//! document compatible with the historical `db.json` layout:
//!
//! ```json
//! {
//!     "tw1": {
//!         "mastodon": "a1@mamot.fr",
//!         "done": [1, 4]
//!     }
//! }
//! ```
//!
//! The in-memory [`Ledger`] is a plain value; [`LedgerStore`] knows where it
//! lives on disk. Callers load once, mutate, and save as often as they need.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};
use crate::types::PostId;

/// Link between one source account and its destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    /// Destination handle (`user@instance`); absent for accounts that were
    /// only marked as seen
    #[serde(
        rename = "mastodon",
        alias = "destination",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub destination: Option<String>,

    /// Source post IDs already forwarded (or marked as seen)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub done: BTreeSet<PostId>,
}

/// In-memory ledger, keyed by source account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    accounts: BTreeMap<String, AccountLink>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `source` to `destination`, replacing any previous destination.
    ///
    /// The forwarded set is left untouched.
    pub fn link(&mut self, source: &str, destination: &str) {
        self.entry(source).destination = Some(destination.to_string());
    }

    /// Destination linked to `source`, if any
    pub fn destination(&self, source: &str) -> Option<&str> {
        self.accounts
            .get(source)
            .and_then(|link| link.destination.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Link for `source`, created empty if absent
    pub fn entry(&mut self, source: &str) -> &mut AccountLink {
        self.accounts.entry(source.to_string()).or_default()
    }

    /// IDs already forwarded for `source` (empty if the account is unknown)
    pub fn forwarded(&self, source: &str) -> BTreeSet<PostId> {
        self.accounts
            .get(source)
            .map(|link| link.done.clone())
            .unwrap_or_default()
    }

    /// Record `id` as forwarded. Returns false if it was already recorded.
    pub fn mark_forwarded(&mut self, source: &str, id: PostId) -> bool {
        self.entry(source).done.insert(id)
    }

    /// Source accounts, in key order
    pub fn sources(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AccountLink)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// On-disk location of a ledger
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. A missing file is an empty ledger; an unreadable or
    /// corrupted one is an error.
    pub fn load(&self) -> Result<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| LedgerError::Read {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Ledger::default());
        }

        let ledger = serde_json::from_str(&content).map_err(|e| LedgerError::Parse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        Ok(ledger)
    }

    /// Save the ledger.
    ///
    /// The document is written to a temporary file next to the ledger and
    /// renamed over it, so readers never observe a partial write.
    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        let write_error = |reason: String| LedgerError::Write {
            path: self.path.display().to_string(),
            reason,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| write_error(format!("Failed to create directory: {}", e)))?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        ledger
            .serialize(&mut serializer)
            .map_err(|e| write_error(format!("Failed to serialize ledger: {}", e)))?;
        buf.push(b'\n');

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| write_error(format!("Failed to create temporary file: {}", e)))?;
        tmp.write_all(&buf)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| write_error(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| write_error(e.error.to_string()))?;

        tracing::debug!("Saved ledger to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_ledger() -> Ledger {
        serde_json::from_str(
            r#"{
                "tw1": {"mastodon": "a1@mamot.fr", "done": [1, 4]},
                "tw2": {"mastodon": "a2@mamot.fr"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::new(temp_dir.path().join("db.json"));

        let ledger = store.load().unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::new(temp_dir.path().join("db.json"));

        let mut ledger = sample_ledger();
        ledger.mark_forwarded("tw2", PostId::from("retweeted"));
        store.save(&ledger).unwrap();

        assert_eq!(store.load().unwrap(), ledger);
    }

    #[test]
    fn test_saved_layout_is_historical_format() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::new(temp_dir.path().join("db.json"));
        store.save(&sample_ledger()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["tw1"]["mastodon"], "a1@mamot.fr");
        assert_eq!(raw["tw1"]["done"], serde_json::json!([1, 4]));
        assert!(raw["tw2"].get("done").is_none());

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n    \"tw1\""));
    }

    #[test]
    fn test_destination_alias_accepted() {
        let ledger: Ledger =
            serde_json::from_str(r#"{"tw1": {"destination": "a1@mamot.fr"}}"#).unwrap();
        assert_eq!(ledger.destination("tw1"), Some("a1@mamot.fr"));
    }

    #[test]
    fn test_relink_keeps_history() {
        let mut ledger = sample_ledger();
        ledger.link("tw1", "other@example.org");

        assert_eq!(ledger.destination("tw1"), Some("other@example.org"));
        let done = ledger.forwarded("tw1");
        assert!(done.contains(&PostId::from(1u64)));
        assert!(done.contains(&PostId::from(4u64)));
    }

    #[test]
    fn test_mark_forwarded_creates_account() {
        let mut ledger = Ledger::new();
        assert!(ledger.mark_forwarded("tw3", PostId::from(7u64)));
        assert!(!ledger.mark_forwarded("tw3", PostId::from(7u64)));

        assert_eq!(ledger.destination("tw3"), None);
        assert_eq!(ledger.forwarded("tw3").len(), 1);
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = LedgerStore::new(path).load();
        assert!(matches!(
            result,
            Err(crate::error::T2mError::Ledger(LedgerError::Parse { .. }))
        ));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::new(temp_dir.path().join("nested").join("dir").join("db.json"));

        store.save(&sample_ledger()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_sources_are_sorted() {
        let mut ledger = Ledger::new();
        ledger.link("zeta", "z@example.org");
        ledger.link("alpha", "a@example.org");

        assert_eq!(ledger.sources(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
