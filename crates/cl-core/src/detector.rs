//! Heuristic tracking-parameter detection.
//!
//! For every query parameter of a URL the detector fetches the page once
//! with only that parameter removed and compares the result against a
//! baseline fetch of the unmodified URL. A parameter whose removal leaves
//! the content (nearly) unchanged carries no meaning for the page and is
//! safe to strip.
//!
//! Each candidate differs from the original by exactly one parameter,
//! never by the accumulated removals of earlier probes: the probe count
//! stays linear, interaction effects between parameters go undetected.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::similarity::content_ratio;
use crate::url_model::UrlModel;

/// Error type for content fetching.
#[derive(Debug, Clone, thiserror::Error)]
#[error("fetch failed: {0}")]
pub struct FetchError(pub String);

/// Content-fetch capability injected into the detector.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Minimum similarity between baseline and probe content for a parameter
/// to count as inert.
pub const SIMILARITY_THRESHOLD: f64 = 0.95;

/// Concurrent probe fetches.
const PROBE_WORKERS: usize = 4;

/// Outcome of a single probe. A failed fetch never marks a parameter
/// removable.
#[derive(Debug, Clone)]
enum ProbeResult {
    Ratio(f64),
    FetchFailed(FetchError),
}

/// Detects inert query parameters by content comparison.
#[derive(Debug, Clone)]
pub struct AutoDetector {
    threshold: f64,
}

impl Default for AutoDetector {
    fn default() -> Self {
        Self {
            threshold: SIMILARITY_THRESHOLD,
        }
    }
}

impl AutoDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the similarity threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Determine which of `url`'s query parameters are inert, remove them
    /// from the model, and return their names.
    ///
    /// A fetch error on the baseline aborts detection with an empty set; a
    /// fetch error on a probe leaves that one parameter in place. Marked
    /// parameters are removed only after every probe has finished, so the
    /// outcome never depends on fetch completion order.
    pub fn detect(&self, url: &mut UrlModel, fetcher: &dyn Fetch) -> BTreeSet<String> {
        let keys = url.query_keys();
        if keys.is_empty() {
            return BTreeSet::new();
        }

        let baseline = match fetcher.fetch(&url.to_string()) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("baseline fetch failed, skipping auto-detection: {}", e);
                return BTreeSet::new();
            }
        };

        let results = probe_all(url, &keys, &baseline, fetcher);

        let mut removable = BTreeSet::new();
        for (key, result) in keys.iter().zip(&results) {
            match result {
                ProbeResult::Ratio(ratio) if *ratio > self.threshold => {
                    log::debug!("param '{}' is inert (ratio {:.3})", key, ratio);
                    removable.insert(key.clone());
                }
                ProbeResult::Ratio(ratio) => {
                    log::debug!("param '{}' changes content (ratio {:.3})", key, ratio);
                }
                ProbeResult::FetchFailed(e) => {
                    log::warn!("probe for '{}' failed, keeping it: {}", key, e);
                }
            }
        }

        for key in &removable {
            url.remove_param(key);
        }
        removable
    }
}

/// Run one probe per key on a bounded worker pool. Result order follows
/// key order, not completion order.
fn probe_all(
    url: &UrlModel,
    keys: &[String],
    baseline: &[u8],
    fetcher: &dyn Fetch,
) -> Vec<ProbeResult> {
    let workers = PROBE_WORKERS.min(keys.len());
    if workers <= 1 {
        return keys
            .iter()
            .map(|key| probe_one(url, key, baseline, fetcher))
            .collect();
    }

    let cursor = AtomicUsize::new(0);
    let indexed: Vec<(usize, ProbeResult)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        if index >= keys.len() {
                            break;
                        }
                        local.push((index, probe_one(url, &keys[index], baseline, fetcher)));
                    }
                    local
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    // A probe a worker never delivered counts as failed, i.e. not removable.
    let mut results: Vec<ProbeResult> = keys
        .iter()
        .map(|_| ProbeResult::FetchFailed(FetchError("probe not completed".to_string())))
        .collect();
    for (index, result) in indexed {
        results[index] = result;
    }
    results
}

fn probe_one(url: &UrlModel, key: &str, baseline: &[u8], fetcher: &dyn Fetch) -> ProbeResult {
    let mut candidate = url.clone();
    candidate.remove_param(key);
    match fetcher.fetch(&candidate.to_string()) {
        Ok(bytes) => ProbeResult::Ratio(content_ratio(baseline, &bytes)),
        Err(e) => ProbeResult::FetchFailed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bytes per URL; anything not mapped is a fetch error.
    struct CannedFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn new(responses: &[(&str, &[u8])]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(url, bytes)| (url.to_string(), bytes.to_vec()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Fetch for CannedFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError(format!("no response for '{}'", url)))
        }
    }

    /// Serves the same bytes for every URL.
    struct UniformFetcher(Vec<u8>);

    impl Fetch for UniformFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.clone())
        }
    }

    const PAGE: &[u8] = b"<html>\n<body>\nstable content\n</body>\n</html>\n";

    #[test]
    fn test_uniform_content_marks_everything() {
        let mut url = UrlModel::parse("https://example.com/p?a=1&b=2&c=3").unwrap();
        let fetcher = UniformFetcher(PAGE.to_vec());

        let detected = AutoDetector::new().detect(&mut url, &fetcher);

        let expected: BTreeSet<String> =
            ["a", "b", "c"].iter().map(|k| k.to_string()).collect();
        assert_eq!(detected, expected);
        assert_eq!(url.to_string(), "https://example.com/p");
    }

    #[test]
    fn test_selective_detection() {
        let changed: &[u8] =
            b"<html>\n<body>\nENTIRELY DIFFERENT PAGE\nnothing shared here\n</body>\n</html>\n";
        // Removing `tracker` leaves the page untouched; removing `id`
        // changes it.
        let fetcher = CannedFetcher::new(&[
            ("https://example.com/p?tracker=1&id=2", PAGE),
            ("https://example.com/p?id=2", PAGE),
            ("https://example.com/p?tracker=1", changed),
        ]);

        let mut url = UrlModel::parse("https://example.com/p?tracker=1&id=2").unwrap();
        let detected = AutoDetector::new().detect(&mut url, &fetcher);

        let expected: BTreeSet<String> = ["tracker".to_string()].into_iter().collect();
        assert_eq!(detected, expected);
        assert_eq!(url.to_string(), "https://example.com/p?id=2");
    }

    #[test]
    fn test_baseline_failure_aborts() {
        let fetcher = CannedFetcher::new(&[]);
        let mut url = UrlModel::parse("https://example.com/p?a=1&b=2").unwrap();

        let detected = AutoDetector::new().detect(&mut url, &fetcher);

        assert!(detected.is_empty());
        assert_eq!(url.to_string(), "https://example.com/p?a=1&b=2");
        // Only the baseline was attempted.
        assert_eq!(fetcher.call_count(), 1);
    }

    #[test]
    fn test_probe_failure_keeps_parameter() {
        // Probe for `b` has no canned response and errors out.
        let fetcher = CannedFetcher::new(&[
            ("https://example.com/p?a=1&b=2", PAGE),
            ("https://example.com/p?b=2", PAGE),
        ]);

        let mut url = UrlModel::parse("https://example.com/p?a=1&b=2").unwrap();
        let detected = AutoDetector::new().detect(&mut url, &fetcher);

        let expected: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(detected, expected);
        assert_eq!(url.to_string(), "https://example.com/p?b=2");
    }

    #[test]
    fn test_no_query_fetches_nothing() {
        let fetcher = CannedFetcher::new(&[]);
        let mut url = UrlModel::parse("https://example.com/p").unwrap();

        let detected = AutoDetector::new().detect(&mut url, &fetcher);

        assert!(detected.is_empty());
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let half: &[u8] = b"same\nsame\nAAAA\nBBBB\n";
        let other_half: &[u8] = b"same\nsame\nCCCC\nDDDD\n";
        let fetcher = CannedFetcher::new(&[
            ("https://example.com/p?a=1", half),
            ("https://example.com/p", other_half),
        ]);

        let mut url = UrlModel::parse("https://example.com/p?a=1").unwrap();
        // Ratio 0.5 with a threshold of 0.5: strictly-greater comparison
        // keeps the parameter.
        let detected = AutoDetector::with_threshold(0.5).detect(&mut url, &fetcher);
        assert!(detected.is_empty());
    }
}
