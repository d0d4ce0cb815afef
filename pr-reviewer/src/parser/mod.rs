//! Minimal unified-diff hunk parser for comment placement.
//!
//! This is deliberately not a general diff library: the only thing the
//! pipeline needs is, per hunk, the starting line of the `+` side and the
//! new-file line numbers of added lines, so a generated comment can be
//! anchored on an exact line of the post-change file.
//!
//! Robustness notes:
//! - Works on the `patch` field of GitHub's list-files response (hunks only,
//!   no `---`/`+++` file headers required).
//! - Ignores `\ No newline at end of file` marker lines.
//! - Tolerates CRLF input and a missing trailing newline on the last line.
//! - Headers that don't match the `@@ -a[,b] +c[,d] @@` pattern are skipped
//!   entirely together with their body lines.

use regex::Regex;
use std::sync::LazyLock;

/// Matches a hunk header and captures the new-file start line. Counts may be
/// omitted (`+5 @@` means a one-line hunk); a trailing annotation after the
/// closing `@@` (typically a function signature) is allowed and ignored.
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@").expect("hunk header regex")
});

/// Maximum hunk body lines sent to generation before head/tail truncation.
pub const MAX_HUNK_LINES: usize = 200;

/// Marker inserted between head and tail of a truncated hunk.
pub const TRUNCATION_NOTICE: &str = "\n... (truncated) ...\n";

/// A contiguous region of a unified diff.
///
/// `text` is the verbatim hunk body including its header line; `new_start`
/// is the first line number the hunk covers in the post-change file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub new_start: u32,
    pub text: String,
}

/// Splits a unified diff patch into discrete hunks, in order of appearance.
///
/// Every syntactically valid header produces exactly one hunk; lines up to
/// the next header (or end of input) belong to the hunk, line terminators
/// preserved. Malformed headers and their body lines are dropped silently.
/// An empty or header-less patch yields an empty vector.
pub fn split_into_hunks(patch: &str) -> Vec<Hunk> {
    let lines: Vec<&str> = patch.split_inclusive('\n').collect();
    let mut hunks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let header = lines[i];
        if header.starts_with("@@") {
            if let Some(cap) = HUNK_HEADER.captures(header) {
                if let Ok(new_start) = cap[1].parse::<u32>() {
                    let mut text = String::from(header);
                    i += 1;
                    while i < lines.len() && !lines[i].starts_with("@@") {
                        text.push_str(lines[i]);
                        i += 1;
                    }
                    hunks.push(Hunk { new_start, text });
                    continue;
                }
            }
        }
        i += 1;
    }
    hunks
}

/// Walks a hunk body and returns the new-file line numbers of all `+` lines,
/// in order of appearance.
///
/// Line accounting follows unified-diff semantics exactly: context lines
/// advance the counter, removals do not, additions emit the current counter
/// then advance it. Marker lines (`\ No newline ...`) and anything else
/// neither emit nor advance. An off-by-one here would silently anchor
/// comments on the wrong source line, so keep this in sync with the tests.
pub fn extract_added_line_numbers(hunk_text: &str, new_start: u32) -> Vec<u32> {
    let mut current_new = new_start;
    let mut added = Vec::new();

    // First line is the header, skip it. `lines()` strips a trailing `\r`,
    // which is what makes CRLF patches behave like LF ones.
    for line in hunk_text.lines().skip(1) {
        if line.starts_with(' ') {
            current_new += 1;
        } else if line.starts_with('-') {
            // Removal: advances the old side only.
        } else if line.starts_with('+') {
            added.push(current_new);
            current_new += 1;
        }
    }
    added
}

/// Returns a shortened copy of `text` for generation input when the hunk
/// exceeds `max_lines`, or `None` when the hunk fits the budget.
///
/// The result is head (`max_lines / 2` lines, header included) + notice +
/// tail (`max_lines / 2` lines). Truncation is lossy on generation input
/// only; position mapping always runs against the original hunk text.
pub fn truncate_for_generation(text: &str, max_lines: usize) -> Option<String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() <= max_lines {
        return None;
    }
    let keep = max_lines / 2;
    let mut out = String::with_capacity(text.len() / 2);
    for l in &lines[..keep] {
        out.push_str(l);
    }
    out.push_str(TRUNCATION_NOTICE);
    for l in &lines[lines.len() - keep..] {
        out.push_str(l);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "@@ -10,3 +10,4 @@ def f():\n a\n-b\n+b2\n+c\n d\n";

    #[test]
    fn single_hunk_with_annotation() {
        let hunks = split_into_hunks(PATCH);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].new_start, 10);
        assert_eq!(hunks[0].text, PATCH);
    }

    #[test]
    fn multi_hunk_split_round_trip() {
        let patch = concat!(
            "@@ -1,2 +1,3 @@\n a\n+b\n c\n",
            "@@ -10,2 +11,2 @@ fn main()\n-x\n+y\n z\n",
        );
        let hunks = split_into_hunks(patch);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].new_start, 1);
        assert_eq!(hunks[1].new_start, 11);
        // Concatenating hunk texts in order reconstructs the patch exactly.
        let rejoined: String = hunks.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(rejoined, patch);
    }

    #[test]
    fn malformed_header_dropped_with_its_lines() {
        // Second header lacks the `+` side, so neither it nor its body lines
        // may show up anywhere in the output.
        let patch = "@@ -1 +1 @@\n+a\n@@ bogus @@\n+orphan\n@@ -5,1 +6,1 @@\n+b\n";
        let hunks = split_into_hunks(patch);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].new_start, 1);
        assert_eq!(hunks[1].new_start, 6);
        assert!(!hunks.iter().any(|h| h.text.contains("orphan")));
    }

    #[test]
    fn empty_and_headerless_patches_yield_nothing() {
        assert!(split_into_hunks("").is_empty());
        assert!(split_into_hunks("just some text\nwithout headers\n").is_empty());
    }

    #[test]
    fn omitted_counts_are_valid() {
        let hunks = split_into_hunks("@@ -3 +5 @@\n+only\n");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].new_start, 5);
        assert_eq!(extract_added_line_numbers(&hunks[0].text, 5), vec![5]);
    }

    #[test]
    fn no_trailing_newline_on_final_line() {
        let hunks = split_into_hunks("@@ -1,1 +1,1 @@\n+tail");
        assert_eq!(hunks.len(), 1);
        assert_eq!(extract_added_line_numbers(&hunks[0].text, 1), vec![1]);
    }

    #[test]
    fn crlf_patch_does_not_break_accounting() {
        let patch = "@@ -10,3 +10,4 @@\r\n a\r\n-b\r\n+b2\r\n+c\r\n d\r\n";
        let hunks = split_into_hunks(patch);
        assert_eq!(hunks.len(), 1);
        assert_eq!(extract_added_line_numbers(&hunks[0].text, 10), vec![11, 12]);
    }

    #[test]
    fn worked_example_from_real_diff() {
        // start new=10; ` a` → new=11; `-b` → unchanged; `+b2` → emit 11,
        // new=12; `+c` → emit 12, new=13; ` d` → new=14.
        assert_eq!(extract_added_line_numbers(PATCH, 10), vec![11, 12]);
    }

    #[test]
    fn added_lines_strictly_increasing() {
        let hunk = "@@ -1,5 +1,8 @@\n a\n+1\n b\n-c\n+2\n+3\n d\n+4\n";
        let positions = extract_added_line_numbers(hunk, 1);
        assert_eq!(positions.len(), 4);
        assert!(positions[0] >= 1);
        assert!(positions.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn no_addition_hunk_yields_empty() {
        let hunk = "@@ -4,3 +4,2 @@\n a\n-b\n c\n";
        assert!(extract_added_line_numbers(hunk, 4).is_empty());
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let hunk = "@@ -1,2 +1,2 @@\n a\n+b\n\\ No newline at end of file\n";
        assert_eq!(extract_added_line_numbers(hunk, 1), vec![2]);
    }

    #[test]
    fn truncation_preserves_header_and_budget() {
        let mut text = String::from("@@ -1,299 +1,299 @@\n");
        for i in 0..299 {
            text.push_str(&format!(" line {i}\n"));
        }
        // 300 lines total against a budget of 200.
        let truncated = truncate_for_generation(&text, 200).expect("should truncate");
        let lines: Vec<&str> = truncated.split_inclusive('\n').collect();
        // First line is still the unchanged header.
        assert_eq!(lines[0], "@@ -1,299 +1,299 @@\n");
        assert!(truncated.contains("... (truncated) ..."));
        // head(100) + 2 marker-introduced lines + tail(100)
        assert_eq!(lines.len(), 202);
        assert_eq!(lines[99], " line 98\n");
        assert_eq!(lines[102], " line 199\n");
        assert_eq!(lines[201], " line 298\n");
    }

    #[test]
    fn small_hunk_not_truncated() {
        let text = "@@ -1,2 +1,2 @@\n a\n+b\n";
        assert!(truncate_for_generation(text, 200).is_none());
    }
}
