//! TrackParamFilter text parsing.
//!
//! Two upstream sections feed the rule table: `specific.txt` carries
//! host-scoped rules (`||host^$removeparam=a`), `general_url.txt` carries
//! parameters removed everywhere (`$removeparam=b`). Lines that are
//! comments or other rule kinds are skipped; parsing never fails.

use std::collections::BTreeSet;

use cl_core::rules::{ParamSet, RuleSet};

/// Name under which the ingested general list is recorded in the rule
/// document's `sets` bookkeeping.
pub const ADGUARD_SET_NAME: &str = "adguard-trackparams";

/// Parse the two TrackParamFilter sections into a rule document.
pub fn parse_track_param_lists(
    specific: &str,
    general: &str,
    updated_at: Option<String>,
) -> RuleSet {
    let mut rules = RuleSet::default();
    let mut specific_rules = 0usize;

    for line in specific.lines() {
        let Some((host, params)) = parse_specific_line(line) else {
            continue;
        };
        specific_rules += 1;
        let entry = rules.hosts.entry(host).or_default();
        entry.query.extend(params);
    }

    for line in general.lines() {
        let Some(params) = parse_general_line(line) else {
            continue;
        };
        rules.default.extend(params);
    }

    log::debug!(
        "parsed {} host rules ({} hosts) and {} default params",
        specific_rules,
        rules.hosts.len(),
        rules.default.len()
    );

    if !rules.default.is_empty() {
        rules.sets.insert(
            ADGUARD_SET_NAME.to_string(),
            ParamSet {
                reference: ADGUARD_SET_NAME.to_string(),
                list: rules.default.clone(),
            },
        );
    }
    rules.last_updated = updated_at;
    rules
}

/// `||host^...$removeparam=a,...` -> (host, params).
fn parse_specific_line(line: &str) -> Option<(String, BTreeSet<String>)> {
    let line = line.trim();
    if line.is_empty() || is_comment_line(line) {
        return None;
    }

    let rest = line.strip_prefix("||")?;
    let caret = rest.find('^')?;
    let host = normalize_domain(&rest[..caret])?;

    let (_, options_text) = split_rule_options(&rest[caret + 1..])?;
    let params = param_options(options_text);
    if params.is_empty() {
        return None;
    }
    Some((host, params))
}

/// `$removeparam=p` / `@@$...removeparam=p` -> params.
fn parse_general_line(line: &str) -> Option<BTreeSet<String>> {
    let line = line.trim();
    if line.is_empty() || is_comment_line(line) {
        return None;
    }

    let line = line.strip_prefix("@@").unwrap_or(line);
    let options_text = line.strip_prefix('$')?;

    let params = param_options(options_text);
    if params.is_empty() {
        return None;
    }
    Some(params)
}

/// Collect `removeparam=` and `tracking-*=` option values from a
/// comma-separated option list.
fn param_options(options_text: &str) -> BTreeSet<String> {
    let mut params = BTreeSet::new();

    for raw in options_text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some(value) = raw.strip_prefix("removeparam=") {
            if !value.is_empty() {
                params.insert(value.to_string());
            }
        } else if raw.starts_with("tracking-") {
            if let Some((_, value)) = raw.split_once('=') {
                if !value.is_empty() {
                    params.insert(value.to_string());
                }
            }
        }
    }

    params
}

fn split_rule_options(line: &str) -> Option<(&str, &str)> {
    let pos = line.find('$')?;
    Some((&line[..pos], &line[pos + 1..]))
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
