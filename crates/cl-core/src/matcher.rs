//! Host-pattern resolution.
//!
//! Matches a hostname against the rule table's glob patterns and selects
//! the removal list and fragment policy to apply.

use std::collections::BTreeSet;

use crate::rules::RuleSet;

/// Outcome of resolving a host against the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Parameter names to remove.
    pub remove: &'a BTreeSet<String>,
    /// Whether the fragment is kept.
    pub keep_fragment: bool,
}

/// Resolve the removal list and fragment policy for `host`.
///
/// All matching host patterns are considered and the most specific one
/// wins: longest pattern first, lexicographic order breaking ties. With no
/// match the table's default list applies and the fragment is kept.
pub fn resolve<'a>(host: &str, rules: &'a RuleSet) -> Resolution<'a> {
    let mut best: Option<&str> = None;

    for pattern in rules.hosts.keys() {
        if !glob_match(pattern, host) {
            continue;
        }
        let better = match best {
            Some(current) => pattern.len() > current.len(),
            None => true,
        };
        if better {
            best = Some(pattern);
        }
    }

    match best {
        Some(pattern) => {
            log::debug!("host '{}' matched pattern '{}'", host, pattern);
            let rule = &rules.hosts[pattern];
            Resolution {
                remove: &rule.query,
                keep_fragment: rule.fragment,
            }
        }
        None => Resolution {
            remove: &rules.default,
            keep_fragment: true,
        },
    }
}

/// Shell-style glob match: `*` matches any run of bytes, `?` exactly one.
/// Case-sensitive; the subject is a bare hostname, never host:port.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let mut pi = 0usize;
    let mut ti = 0usize;
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = backtrack {
            // Let the last `*` swallow one more byte and retry.
            pi = star_pi + 1;
            ti = star_ti + 1;
            backtrack = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
