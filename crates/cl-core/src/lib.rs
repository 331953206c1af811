//! ClearLink Core Library
//!
//! This crate provides the filtering engine for the ClearLink URL cleaner.
//! It performs no network or filesystem I/O itself: content fetching and
//! rule persistence are injected behind the `Fetch` and `RuleStore` traits
//! so the engine stays testable and embeddable.
//!
//! # Architecture
//!
//! A URL is decomposed into a mutable model, matched against a rule table
//! (host glob patterns plus a default parameter list), and optionally
//! probed: each query parameter is removed in isolation and the fetched
//! content compared against a baseline. Parameters that do not change the
//! content are stripped and written back into the rule table (self-study).
//!
//! # Modules
//!
//! - `url_model`: URL decomposition, mutation, and reconstruction
//! - `rules`: rule table schema, merge and self-study operations
//! - `matcher`: host glob matching and rule resolution
//! - `similarity`: diff-style content similarity ratio
//! - `detector`: probe-based inert-parameter detection
//! - `engine`: mode orchestration over all of the above

pub mod detector;
pub mod engine;
pub mod matcher;
pub mod rules;
pub mod similarity;
pub mod url_model;

// Re-export commonly used types
pub use detector::{AutoDetector, Fetch, FetchError, SIMILARITY_THRESHOLD};
pub use engine::{FilterEngine, FilterMode, FilterOutcome};
pub use matcher::{glob_match, Resolution};
pub use rules::{HostRule, ParamSet, RuleError, RuleSet, RuleStore, StoreError};
pub use similarity::content_ratio;
pub use url_model::{UrlError, UrlModel};
