//! Content similarity for auto-detection probes.
//!
//! Classic diff ratio: recursively find the longest common block between
//! two buffers and sum the matched weight, `ratio = 2*M / (len_a+len_b)`.
//! Matching works on whole lines, with the matched weight counted in
//! bytes, so the score tracks byte-level similarity without a quadratic
//! table over raw bytes.

use std::collections::HashMap;

/// Similarity of two byte buffers in [0, 1].
///
/// 1.0 for identical buffers, 0.0 when either side is empty and the other
/// is not or when no line is shared.
pub fn content_ratio(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let lines_a = split_lines(a);
    let lines_b = split_lines(b);
    let matched = matched_weight(&lines_a, &lines_b);
    (2.0 * matched as f64) / (a.len() + b.len()) as f64
}

/// Split at newlines, keeping the terminator so line weights sum to the
/// buffer length.
fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Total byte weight of all matching blocks between `a` and `b`.
fn matched_weight(a: &[&[u8]], b: &[&[u8]]) -> usize {
    let mut total = 0usize;
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += a[i..i + size].iter().map(|line| line.len()).sum::<usize>();
        pending.push((alo, i, blo, j));
        pending.push((i + size, ahi, j + size, bhi));
    }

    total
}

/// Longest block of lines common to `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Runs in O(n * occurrences) by extending match runs row by row instead
/// of filling an n*m table.
fn longest_match(
    a: &[&[u8]],
    b: &[&[u8]],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut b_positions: HashMap<&[u8], Vec<usize>> = HashMap::new();
    for j in blo..bhi {
        b_positions.entry(b[j]).or_default().push(j);
    }

    let mut best = (alo, blo, 0usize);
    let mut runs: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut next_runs: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b_positions.get(a[i]) {
            for &j in positions {
                let run = match j.checked_sub(1) {
                    Some(prev) => runs.get(&prev).copied().unwrap_or(0) + 1,
                    None => 1,
                };
                next_runs.insert(j, run);
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        runs = next_runs;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_buffers() {
        let content = b"<html>\n<body>hello</body>\n</html>\n";
        assert_eq!(content_ratio(content, content), 1.0);
    }

    #[test]
    fn test_both_empty() {
        assert_eq!(content_ratio(b"", b""), 1.0);
    }

    #[test]
    fn test_one_empty() {
        assert_eq!(content_ratio(b"something", b""), 0.0);
        assert_eq!(content_ratio(b"", b"something"), 0.0);
    }

    #[test]
    fn test_disjoint_content() {
        let a = b"aaa\nbbb\nccc\n";
        let b = b"xxx\nyyy\nzzz\n";
        assert_eq!(content_ratio(a, b), 0.0);
    }

    #[test]
    fn test_mostly_shared_lines_score_high() {
        let a = b"line one\nline two\nline three\nline four\nline five\n";
        let b = b"line one\nline two\nline three\nline four\nCHANGED!!\n";
        let ratio = content_ratio(a, b);
        assert!(ratio > 0.7, "ratio was {}", ratio);
        assert!(ratio < 1.0, "ratio was {}", ratio);
    }

    #[test]
    fn test_half_shared_lines_score_mid() {
        let a = b"same\nsame\nAAAA\nBBBB\n";
        let b = b"same\nsame\nCCCC\nDDDD\n";
        let ratio = content_ratio(a, b);
        assert!(ratio > 0.4 && ratio < 0.6, "ratio was {}", ratio);
    }

    #[test]
    fn test_reordered_blocks_still_match_partially() {
        let a = b"alpha\nbeta\ngamma\n";
        let b = b"gamma\nalpha\nbeta\n";
        let ratio = content_ratio(a, b);
        // The longest block (alpha/beta) matches, gamma falls outside it.
        assert!(ratio > 0.5 && ratio < 1.0, "ratio was {}", ratio);
    }

    #[test]
    fn test_no_trailing_newline() {
        let a = b"head\nbody";
        let b = b"head\nbody";
        assert_eq!(content_ratio(a, b), 1.0);
    }
}
