//! Refresh policy for the cached blocklist document.
//!
//! The cached document carries a `last_updated` stamp; a copy older than
//! the refresh window (or with no readable stamp) is stale and should be
//! re-downloaded from the upstream sections.

use chrono::{Duration, NaiveDateTime};

use cl_core::rules::RuleSet;

use crate::parser::parse_track_param_lists;

/// Host-scoped rule section of the AdGuard TrackParamFilter.
pub const SPECIFIC_LIST_URL: &str =
    "https://raw.githubusercontent.com/AdguardTeam/AdguardFilters/master/TrackParamFilter/sections/specific.txt";

/// Generic rule section of the AdGuard TrackParamFilter.
pub const GENERAL_LIST_URL: &str =
    "https://raw.githubusercontent.com/AdguardTeam/AdguardFilters/master/TrackParamFilter/sections/general_url.txt";

/// Timestamp format stored in the rule document.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default refresh window for the cached document.
pub fn default_max_age() -> Duration {
    Duration::hours(24)
}

/// Whether the cached document is due for a refresh.
///
/// A document with a missing or unreadable timestamp is always stale.
pub fn is_stale(rules: &RuleSet, now: NaiveDateTime, max_age: Duration) -> bool {
    let Some(stamp) = rules.last_updated.as_deref() else {
        return true;
    };

    match NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) {
        Ok(updated) => now.signed_duration_since(updated) > max_age,
        Err(e) => {
            log::warn!("unreadable last_updated '{}': {}", stamp, e);
            true
        }
    }
}

/// Build the cache document from freshly downloaded section text, stamped
/// with `now`.
pub fn build_document(specific: &str, general: &str, now: NaiveDateTime) -> RuleSet {
    parse_track_param_lists(
        specific,
        general,
        Some(now.format(TIMESTAMP_FORMAT).to_string()),
    )
}
