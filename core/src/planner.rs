//! Batch planning: split a script into ordered groups of lines.
//!
//! Blank lines are dropped, the remaining lines are chunked into groups of at
//! most `lines_per_batch` lines and joined with `\n`. Each group is one
//! request to the speech provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("Script is empty")]
    EmptyScript,

    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Segment has nothing to speak once quotes are trimmed")]
    EmptySegment,
}

/// One planned request unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGroup {
    /// 1-based, dense
    pub sequence: usize,
    pub text: String,
    pub char_count: usize,
}

/// Non-blank lines of the script, in order, without trailing `\r`.
pub fn script_lines(script: &str) -> Vec<&str> {
    script
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// `script` with `\r\n` line endings folded to `\n`, matching the text of
/// planned groups.
pub fn normalize_line_endings(script: &str) -> String {
    script.replace("\r\n", "\n")
}

/// Partition `script` into groups of at most `lines_per_batch` lines.
pub fn plan_batches(script: &str, lines_per_batch: usize) -> Result<Vec<BatchGroup>, PlanningError> {
    if lines_per_batch == 0 {
        return Err(PlanningError::InvalidBatchSize(lines_per_batch));
    }
    let lines = script_lines(script);
    if lines.is_empty() {
        return Err(PlanningError::EmptyScript);
    }

    let groups: Vec<BatchGroup> = lines
        .chunks(lines_per_batch)
        .enumerate()
        .map(|(idx, chunk)| {
            let text = chunk.join("\n");
            BatchGroup {
                sequence: idx + 1,
                char_count: text.chars().count(),
                text,
            }
        })
        .collect();

    debug!(
        target = "planner",
        lines = lines.len(),
        lines_per_batch,
        groups = groups.len(),
        "Planned batches"
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_lines_in_pairs() {
        let groups = plan_batches("Line one.\nLine two.\nLine three.", 2).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].text, "Line one.\nLine two.");
        assert_eq!(groups[0].char_count, "Line one.\nLine two.".len());
        assert_eq!(groups[0].char_count, 19);
        assert_eq!(groups[1].text, "Line three.");
        assert_eq!(groups[1].char_count, 11);
        assert_eq!(groups[1].sequence, 2);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let groups = plan_batches("\n  \nA\n\n\t\nB\n", 1).unwrap();
        let texts: Vec<_> = groups.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert_eq!(groups[0].sequence, 1);
        assert_eq!(groups[1].sequence, 2);
    }

    #[test]
    fn test_crlf_lines() {
        let groups = plan_batches("One\r\nTwo\r\n", 5).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "One\nTwo");
    }

    #[test]
    fn test_partition_reassembles_and_counts() {
        let script = "a\nb\n\nc\nd\ne\n   \nf\ng";
        let non_blank = script_lines(script);
        for k in 1..=9 {
            let groups = plan_batches(script, k).unwrap();
            assert_eq!(groups.len(), non_blank.len().div_ceil(k), "k={k}");
            let rejoined: Vec<String> = groups
                .iter()
                .flat_map(|g| g.text.split('\n').map(str::to_string))
                .collect();
            assert_eq!(rejoined, non_blank, "k={k}");
            assert!(groups.iter().all(|g| !g.text.is_empty()));
        }
    }

    #[test]
    fn test_char_count_is_unicode_aware() {
        let groups = plan_batches("Aku café", 1).unwrap();
        assert_eq!(groups[0].char_count, 8);
    }

    #[test]
    fn test_crlf_groups_found_in_normalized_script() {
        let script = "W.\r\nX.\r\nY.\r\nZ.";
        let normalized = normalize_line_endings(script);
        for group in plan_batches(script, 2).unwrap() {
            assert!(normalized.contains(&group.text), "{:?}", group.text);
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(plan_batches("", 1), Err(PlanningError::EmptyScript));
        assert_eq!(plan_batches(" \n \n", 3), Err(PlanningError::EmptyScript));
        assert_eq!(plan_batches("x", 0), Err(PlanningError::InvalidBatchSize(0)));
    }
}
