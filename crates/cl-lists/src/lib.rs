//! AdGuard TrackParamFilter ingestion.
//!
//! Converts the upstream tracking-parameter filter sections into the
//! ClearLink rule schema and decides when the cached copy needs a refresh.
//! Downloading is left to the caller; this crate is parse and policy only.

pub mod parser;
pub mod updater;

pub use parser::{parse_track_param_lists, ADGUARD_SET_NAME};
pub use updater::{
    build_document, default_max_age, is_stale, GENERAL_LIST_URL, SPECIFIC_LIST_URL,
    TIMESTAMP_FORMAT,
};
