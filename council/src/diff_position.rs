//! Diff Position Mapper: new-file line numbers to diff positions
//!
//! Position-addressed review comment APIs do not take a line number; they
//! take the 1-based offset of the target line inside the file's unified
//! diff. This module builds that mapping for one file's diff text.
//!
//! # Rules
//!
//! ```text
//! @@ -a,b +c,d @@   cursor = c, no mapping
//! " context"        cursor → position, cursor += 1
//! "+added"          cursor → position, cursor += 1
//! "-removed"        ignored, cursor unchanged
//! "\ No newline"    ignored
//! ""                ignored (still counts as a position)
//! before first @@   ignored
//! ```

use std::collections::BTreeMap;

/// New-file line number → 1-based position within the diff text.
pub type PositionMap = BTreeMap<u32, u32>;

/// Parsed `@@ -old_start[,old_count] +new_start[,new_count] @@ section` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Trailing section text after the closing `@@` (often a function name).
    pub section: String,
}

/// Parse a hunk header line. Counts default to 1 when omitted.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ ")?;
    let (ranges, section) = match rest.find(" @@") {
        Some(idx) => (&rest[..idx], rest[idx + 3..].trim()),
        None => return None,
    };

    let mut parts = ranges.split_whitespace();
    let (old_start, old_count) = parse_range(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(parts.next()?.strip_prefix('+')?)?;

    Some(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
        section: section.to_string(),
    })
}

fn parse_range(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.splitn(2, ',');
    let start = parts.next()?.parse::<u32>().ok()?;
    let count = match parts.next() {
        Some(c) => c.parse::<u32>().ok()?,
        None => 1,
    };
    Some((start, count))
}

/// Map every new-file line present in `diff` to its diff position.
///
/// Positions count every line of the text, hunk headers included. Empty
/// input yields an empty map. A header that fails to parse suspends
/// mapping until the next valid header, and a `diff --git` line (when a
/// multi-file diff is passed by mistake) resets the cursor the same way.
/// A cursor that would pass `u32::MAX` stops mapping for that hunk, and
/// mapping ends once positions no longer fit in a `u32`.
pub fn map_positions(diff: &str) -> PositionMap {
    let mut positions = PositionMap::new();
    let mut cursor: Option<u32> = None;

    for (idx, line) in diff.lines().enumerate() {
        let Some(position) = idx.checked_add(1).and_then(|p| u32::try_from(p).ok()) else {
            break;
        };

        if line.starts_with("@@") {
            cursor = parse_hunk_header(line).map(|h| h.new_start);
            continue;
        }
        if line.starts_with("diff --git ") {
            cursor = None;
            continue;
        }

        let Some(current) = cursor else {
            continue;
        };

        match line.as_bytes().first() {
            Some(b' ') | Some(b'+') => {
                positions.insert(current, position);
                cursor = current.checked_add(1);
            }
            // '-' deletions, '\' no-newline markers, empty lines and
            // anything unrecognised neither map nor advance.
            _ => {}
        }
    }

    positions
}

/// Diff position for a single line, if the line appears in the diff.
pub fn position_for_line(diff: &str, line: u32) -> Option<u32> {
    map_positions(diff).get(&line).copied()
}
