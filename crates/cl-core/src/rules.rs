//! Rule table schema, merging, and self-study mutation.
//!
//! The rule document maps host patterns to removal rules plus a default
//! parameter list used when no pattern matches. Ordered collections keep
//! iteration and serialization stable. Rules only grow: merging and
//! learning union parameters in, nothing removes them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Error type for the rule document schema.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule document: {0}")]
    Syntax(#[from] serde_json::Error),
}

/// Error type for rule persistence backends.
#[derive(Debug, thiserror::Error)]
#[error("rule store: {0}")]
pub struct StoreError(pub String);

/// Persistence backend for the rule document.
///
/// `load` returns `Ok(None)` when no document exists yet; that is the
/// normal first-run case, not an error.
pub trait RuleStore: Send {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError>;
    fn save(&self, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Removal rules for one host pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRule {
    /// Parameter names stripped from matching URLs.
    #[serde(default)]
    pub query: BTreeSet<String>,
    /// Whether the fragment survives filtering (true = keep).
    #[serde(default = "keep_fragment_default")]
    pub fragment: bool,
}

impl Default for HostRule {
    fn default() -> Self {
        Self {
            query: BTreeSet::new(),
            fragment: true,
        }
    }
}

fn keep_fragment_default() -> bool {
    true
}

/// A named parameter list carried alongside the rule table; provenance
/// bookkeeping written by blocklist ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSet {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub list: BTreeSet<String>,
}

/// The full rule document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Host-pattern keyed rules; keys may contain `*` and `?` wildcards.
    #[serde(default)]
    pub hosts: BTreeMap<String, HostRule>,
    /// Parameters removed when no host pattern matches.
    #[serde(default)]
    pub default: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sets: BTreeMap<String, ParamSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl RuleSet {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RuleError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, RuleError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Load from a store, falling back to an empty table when the document
    /// is missing or unreadable. Rule absence is never fatal.
    pub fn load_or_default(store: &dyn RuleStore) -> Self {
        match store.load() {
            Ok(Some(bytes)) => match Self::from_slice(&bytes) {
                Ok(rules) => rules,
                Err(e) => {
                    log::warn!("rule document unreadable, starting empty: {}", e);
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("rule store unavailable, starting empty: {}", e);
                Self::default()
            }
        }
    }

    /// Union `external` into this table.
    ///
    /// Defaults are unioned; per-host query sets are unioned into the local
    /// entry, creating it when absent. The fragment policy of an existing
    /// entry is never overridden. Idempotent.
    pub fn merge(&mut self, external: &RuleSet) {
        self.default.extend(external.default.iter().cloned());

        for (pattern, rule) in &external.hosts {
            let entry = self.hosts.entry(pattern.clone()).or_default();
            entry.query.extend(rule.query.iter().cloned());
        }

        for (name, set) in &external.sets {
            self.sets
                .entry(name.clone())
                .or_insert_with(|| set.clone());
        }
    }

    /// Record parameters confirmed inert for `host`. The only mutation
    /// triggered by auto-detection.
    pub fn learn(&mut self, host: &str, params: &BTreeSet<String>) {
        if host.is_empty() || params.is_empty() {
            return;
        }
        let entry = self.hosts.entry(host.to_string()).or_default();
        entry.query.extend(params.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.default.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_schema_round_trip() {
        let mut rules = RuleSet::default();
        rules.hosts.insert(
            "*.example.com".to_string(),
            HostRule {
                query: params(&["test_param"]),
                fragment: false,
            },
        );
        rules.default = params(&["utm_source"]);

        let bytes = rules.to_vec().unwrap();
        let reloaded = RuleSet::from_slice(&bytes).unwrap();
        assert_eq!(reloaded, rules);
    }

    #[test]
    fn test_missing_fragment_defaults_to_keep() {
        let doc = br#"{"hosts": {"example.com": {"query": ["id"]}}, "default": []}"#;
        let rules = RuleSet::from_slice(doc).unwrap();
        assert!(rules.hosts["example.com"].fragment);
    }

    #[test]
    fn test_invalid_document_is_an_error() {
        assert!(RuleSet::from_slice(b"{not json").is_err());
    }

    #[test]
    fn test_merge_unions_defaults_and_hosts() {
        let mut local = RuleSet::default();
        local.default = params(&["utm_source"]);
        local.hosts.insert(
            "a.com".to_string(),
            HostRule {
                query: params(&["x"]),
                fragment: false,
            },
        );

        let mut external = RuleSet::default();
        external.default = params(&["fbclid"]);
        external.hosts.insert(
            "a.com".to_string(),
            HostRule {
                query: params(&["y"]),
                fragment: true,
            },
        );
        external.hosts.insert(
            "b.com".to_string(),
            HostRule {
                query: params(&["z"]),
                fragment: true,
            },
        );

        local.merge(&external);

        assert_eq!(local.default, params(&["utm_source", "fbclid"]));
        assert_eq!(local.hosts["a.com"].query, params(&["x", "y"]));
        // Existing fragment policy survives the merge.
        assert!(!local.hosts["a.com"].fragment);
        assert_eq!(local.hosts["b.com"].query, params(&["z"]));
        assert!(local.hosts["b.com"].fragment);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut external = RuleSet::default();
        external.default = params(&["gclid"]);
        external.hosts.insert(
            "shop.example".to_string(),
            HostRule {
                query: params(&["ref"]),
                fragment: true,
            },
        );

        let mut once = RuleSet::default();
        once.merge(&external);
        let mut twice = once.clone();
        twice.merge(&external);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_learn_creates_and_unions() {
        let mut rules = RuleSet::default();
        rules.learn("example.com", &params(&["sid"]));
        assert_eq!(rules.hosts["example.com"].query, params(&["sid"]));
        assert!(rules.hosts["example.com"].fragment);

        rules.learn("example.com", &params(&["tid"]));
        assert_eq!(rules.hosts["example.com"].query, params(&["sid", "tid"]));
    }

    #[test]
    fn test_learn_ignores_empty_input() {
        let mut rules = RuleSet::default();
        rules.learn("", &params(&["sid"]));
        rules.learn("example.com", &BTreeSet::new());
        assert!(rules.is_empty());
    }

    struct FailingStore;

    impl RuleStore for FailingStore {
        fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError("backend down".to_string()))
        }
        fn save(&self, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(StoreError("backend down".to_string()))
        }
    }

    struct StaticStore(Vec<u8>);

    impl RuleStore for StaticStore {
        fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(Some(self.0.clone()))
        }
        fn save(&self, _bytes: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_load_or_default_recovers_from_store_failure() {
        assert!(RuleSet::load_or_default(&FailingStore).is_empty());
    }

    #[test]
    fn test_load_or_default_recovers_from_garbage() {
        let store = StaticStore(b"not a document".to_vec());
        assert!(RuleSet::load_or_default(&store).is_empty());
    }

    #[test]
    fn test_load_or_default_reads_document() {
        let mut rules = RuleSet::default();
        rules.default = params(&["utm_medium"]);
        let store = StaticStore(rules.to_vec().unwrap());
        assert_eq!(RuleSet::load_or_default(&store), rules);
    }
}
