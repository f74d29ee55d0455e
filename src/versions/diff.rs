//! Line-level change statistics between two versions of a file.
//!
//! This is not a positional diff: lines are compared as multisets, which is
//! enough for the added/deleted/modified counters the version history keeps.
//! A line that disappears while another appears counts as one modification,
//! not one deletion plus one addition.

use std::collections::HashMap;

use crate::store::VersionStats;

/// Computes change statistics for `new` relative to `old`.
///
/// `old` is `None` for the first version of a path, in which case every line
/// counts as added.
pub fn line_stats(old: Option<&str>, new: &str) -> VersionStats {
    let new_lines: Vec<&str> = new.lines().collect();
    let line_count = new_lines.len() as u64;
    let byte_count = new.len() as u64;

    let Some(old) = old else {
        return VersionStats {
            line_count,
            byte_count,
            lines_added: line_count,
            lines_deleted: 0,
            lines_modified: 0,
        };
    };

    let mut old_counts: HashMap<&str, u64> = HashMap::new();
    for line in old.lines() {
        *old_counts.entry(line).or_default() += 1;
    }

    // Lines in `new` with no remaining match in `old`.
    let mut raw_added = 0u64;
    for line in &new_lines {
        match old_counts.get_mut(line) {
            Some(count) if *count > 0 => *count -= 1,
            _ => raw_added += 1,
        }
    }
    // Whatever is left unmatched in `old` was removed.
    let raw_deleted: u64 = old_counts.values().sum();

    let modified = raw_added.min(raw_deleted);
    VersionStats {
        line_count,
        byte_count,
        lines_added: raw_added - modified,
        lines_deleted: raw_deleted - modified,
        lines_modified: modified,
    }
}
