#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Output normalization and ordered comparison.
//!
//! Program output order is semantically significant, so normalized output is
//! an ordered sequence of lines, not a multiset.

use similar::{ChangeTag, TextDiff};

/// Canonicalizes raw program output for comparison.
///
/// The whole text is trimmed, each line is trimmed, runs of internal
/// whitespace collapse to a single space, and lines left empty are dropped.
pub fn normalize(raw: &str) -> Vec<String> {
    raw.trim()
        .lines()
        .filter_map(|line| {
            let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                None
            } else {
                Some(collapsed)
            }
        })
        .collect()
}

/// Returns true iff both outputs are present, non-empty, and normalize to
/// the same ordered line sequence.
///
/// An absent or empty output never matches anything, including another
/// absent output.
pub fn outputs_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => normalize(a) == normalize(b),
        _ => false,
    }
}

/// Renders a line-oriented unified diff between normalized outputs.
///
/// Reporting only: the pass/fail verdict is decided by [`outputs_match`],
/// never by this text.
pub fn unified_diff(expected: &[String], actual: &[String]) -> String {
    let expected = expected.join("\n");
    let actual = actual.join("\n");
    let diff = TextDiff::from_lines(&expected, &actual);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let marker = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        output.push(marker);
        output.push(' ');
        output.push_str(change.value().trim_end_matches('\n'));
        output.push('\n');
    }

    output
}
