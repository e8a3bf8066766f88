//! Hint whitelist gate
//!
//! Hints run host-side and feed the program values the proof never re-derives, so only
//! hints from a fixed, versioned allow-list may appear in a deployable contract.

use super::normalize::{normalize_hint, NormalizedHint};
use crate::error::{Error, Result};
use crate::parser::Location;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Embedded whitelist resources, in load order
const WHITELIST_RESOURCES: [(&str, &str); 2] = [
    ("latest", include_str!("whitelists/latest.json")),
    ("cairo_secp", include_str!("whitelists/cairo_secp.json")),
];

lazy_static::lazy_static! {
    static ref DEFAULT_WHITELIST: Result<Arc<HintWhitelist>> = HintWhitelist::build().map(Arc::new);
}

#[derive(Debug, Deserialize)]
struct WhitelistFile {
    version: String,
    allowed_hints: Vec<AllowedHint>,
}

#[derive(Debug, Deserialize)]
struct AllowedHint {
    hint_lines: Vec<String>,
}

/// One permitted hint body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintWhitelistEntry {
    /// Canonical form the matcher compares against
    pub normalized: NormalizedHint,
    /// `resource@version` the entry was loaded from
    pub source: String,
}

/// Set of permitted hints, fixed once built
#[derive(Debug, Clone, Default)]
pub struct HintWhitelist {
    entries: HashMap<NormalizedHint, HintWhitelistEntry>,
    versions: Vec<String>,
}

impl HintWhitelist {
    /// Load the embedded, versioned allow-lists
    pub fn build() -> Result<Self> {
        let mut whitelist = HintWhitelist::default();
        for (name, json) in WHITELIST_RESOURCES {
            whitelist.extend_from_json(name, json)?;
        }
        tracing::debug!(
            entries = whitelist.len(),
            versions = ?whitelist.versions,
            "loaded hint whitelist"
        );
        Ok(whitelist)
    }

    /// Shared instance of the embedded allow-list, built on first use
    pub fn global() -> Result<Arc<HintWhitelist>> {
        DEFAULT_WHITELIST.clone()
    }

    /// Build a whitelist from a single JSON resource
    pub fn from_json_str(name: &str, json: &str) -> Result<Self> {
        let mut whitelist = HintWhitelist::default();
        whitelist.extend_from_json(name, json)?;
        Ok(whitelist)
    }

    /// Build a whitelist from raw hint sources
    pub fn from_hints<I, S>(hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = HintWhitelist::default();
        for hint in hints {
            whitelist.insert(hint.as_ref(), "inline");
        }
        whitelist
    }

    fn extend_from_json(&mut self, name: &str, json: &str) -> Result<()> {
        let file: WhitelistFile = serde_json::from_str(json).map_err(|e| {
            Error::Configuration(format!("Invalid hint whitelist '{}': {}", name, e))
        })?;
        let source = format!("{}@{}", name, file.version);
        for hint in &file.allowed_hints {
            self.insert(&hint.hint_lines.join("\n"), &source);
        }
        self.versions.push(source);
        Ok(())
    }

    fn insert(&mut self, code: &str, source: &str) {
        let normalized = normalize_hint(code);
        self.entries
            .entry(normalized.clone())
            .or_insert_with(|| HintWhitelistEntry {
                normalized,
                source: source.to_string(),
            });
    }

    /// Returns true when `hint_source` matches a whitelisted hint up to formatting
    pub fn is_allowed(&self, hint_source: &str) -> bool {
        self.entry_for(hint_source).is_some()
    }

    /// The entry `hint_source` matches, if any
    pub fn entry_for(&self, hint_source: &str) -> Option<&HintWhitelistEntry> {
        self.entries.get(&normalize_hint(hint_source))
    }

    /// Fails with [`Error::SecurityValidation`] when the hint is not whitelisted
    pub fn verify_hint_secure(&self, hint_source: &str, location: &Location) -> Result<()> {
        if self.is_allowed(hint_source) {
            Ok(())
        } else {
            Err(Error::SecurityValidation {
                snippet: hint_source.to_string(),
                location: location.clone(),
            })
        }
    }

    /// Number of distinct permitted hints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is permitted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `resource@version` of every loaded resource
    pub fn versions(&self) -> &[String] {
        &self.versions
    }
}
