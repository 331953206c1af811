//! Filter orchestration across the rule and auto modes.
//!
//! The engine owns the rule table; every mutation (self-study, external
//! merges) flows through it, and `filter` takes `&mut self`, so a single
//! engine instance serializes the learn/persist/reload sequence by
//! construction. Concurrent filtering wants an external lock around the
//! engine.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::detector::{AutoDetector, Fetch};
use crate::matcher;
use crate::rules::{RuleSet, RuleStore};
use crate::url_model::{UrlError, UrlModel};

/// Filtering strategy for a single `filter` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Deterministic rule table only.
    Rule,
    /// Heuristic probing only.
    Auto,
    /// Rule table first, then probing on the already-filtered URL.
    Full,
}

/// Result of one filter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub original: String,
    pub cleaned: String,
    pub changed: bool,
}

impl FilterOutcome {
    fn unchanged(url: &str) -> Self {
        Self {
            original: url.to_string(),
            cleaned: url.to_string(),
            changed: false,
        }
    }
}

/// URL filter over a rule table, a persistence backend, and a content
/// fetcher.
pub struct FilterEngine {
    rules: RuleSet,
    store: Box<dyn RuleStore>,
    fetcher: Box<dyn Fetch>,
    detector: AutoDetector,
    self_study: bool,
}

impl FilterEngine {
    /// Build an engine over `store` and `fetcher`. A missing or unreadable
    /// rule document starts the engine with an empty table.
    pub fn new(store: Box<dyn RuleStore>, fetcher: Box<dyn Fetch>) -> Self {
        let rules = RuleSet::load_or_default(store.as_ref());
        Self {
            rules,
            store,
            fetcher,
            detector: AutoDetector::new(),
            self_study: true,
        }
    }

    /// Enable or disable learning from auto-detection.
    pub fn set_self_study(&mut self, enabled: bool) {
        self.self_study = enabled;
    }

    /// Union an externally supplied rule table (blocklist ingestion) into
    /// the engine's table.
    pub fn merge_external(&mut self, external: &RuleSet) {
        self.rules.merge(external);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Filter one URL.
    ///
    /// `mode = None` runs the rule table and falls back to probing only
    /// when no rule changed anything; a rule hit suppresses the expensive
    /// network probing. A URL with no discernible host is returned
    /// unmodified. `changed` reports whether a parameter or fragment was
    /// actually removed; normalization alone does not count.
    pub fn filter(&mut self, url: &str, mode: Option<FilterMode>) -> Result<FilterOutcome, UrlError> {
        let mut model = UrlModel::parse(url)?;
        let host = match model.host() {
            Some(host) => host.to_string(),
            None => return Ok(FilterOutcome::unchanged(url)),
        };

        let changed = match mode {
            Some(FilterMode::Rule) => self.apply_rules(&mut model, &host),
            Some(FilterMode::Auto) => self.apply_auto(&mut model, &host),
            Some(FilterMode::Full) => {
                let by_rule = self.apply_rules(&mut model, &host);
                let by_auto = self.apply_auto(&mut model, &host);
                by_rule || by_auto
            }
            None => self.apply_rules(&mut model, &host) || self.apply_auto(&mut model, &host),
        };

        Ok(FilterOutcome {
            original: url.to_string(),
            cleaned: model.to_string(),
            changed,
        })
    }

    fn apply_rules(&self, model: &mut UrlModel, host: &str) -> bool {
        let resolution = matcher::resolve(host, &self.rules);
        let mut changed = false;

        for key in resolution.remove {
            if model.remove_param(key) {
                log::debug!("removed '{}' from {}", key, host);
                changed = true;
            }
        }
        if !resolution.keep_fragment && model.remove_fragment() {
            changed = true;
        }
        changed
    }

    fn apply_auto(&mut self, model: &mut UrlModel, host: &str) -> bool {
        let detected = self.detector.detect(model, self.fetcher.as_ref());
        if detected.is_empty() {
            return false;
        }
        if self.self_study {
            self.study(host, &detected);
        }
        true
    }

    /// Record learned parameters, persist them, and reload so later calls
    /// observe the stored document. Persistence failures are logged; the
    /// in-memory table stays authoritative.
    fn study(&mut self, host: &str, params: &BTreeSet<String>) {
        self.rules.learn(host, params);

        let bytes = match self.rules.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("failed to serialize learned rules: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(&bytes) {
            log::warn!("failed to persist learned rules: {}", e);
            return;
        }

        match self.store.load() {
            Ok(Some(bytes)) => match RuleSet::from_slice(&bytes) {
                Ok(rules) => self.rules = rules,
                Err(e) => log::warn!("reload after self-study failed, keeping in-memory rules: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("reload after self-study failed, keeping in-memory rules: {}", e),
        }
    }
}
