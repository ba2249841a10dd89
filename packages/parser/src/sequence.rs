//! Article-number sequences: expected ranges, completion and integrity.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::boundary::{detect, HeaderLocation};
use crate::config::{MAX_CONSECUTIVE_REPEATS, TITLE_RANGE};
use crate::gap_fill::{fill, Mention};

/// Article numbers declared by a `(N–M)` range in a title.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::sequence::title_range;
///
/// assert_eq!(title_range("Μέρος Β (5 – 8)"), vec![5, 6, 7, 8]);
/// assert!(title_range("Μέρος Β").is_empty());
/// ```
pub fn title_range(title: &str) -> Vec<u32> {
    let Some(caps) = TITLE_RANGE.captures(title) else {
        return Vec::new();
    };
    match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
        (Ok(start), Ok(end)) if start <= end => (start..=end).collect(),
        _ => Vec::new(),
    }
}

/// Numbers strictly between the last article of one block and the first
/// article of the next.
pub fn bridge_numbers(left: &[u32], right: &[u32]) -> Vec<u32> {
    match (left.iter().max(), right.iter().min()) {
        (Some(&last), Some(&first)) if first > last + 1 => (last + 1..first).collect(),
        _ => Vec::new(),
    }
}

/// Result of completing a document's article sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequenceCompletion {
    /// All article numbers found, ascending.
    pub numbers: Vec<u32>,
    pub headers: Vec<HeaderLocation>,
    /// Mentions standing in for missing headers.
    pub mentions: Vec<Mention>,
    /// Expected numbers for which nothing was found.
    pub unresolved: Vec<u32>,
}

impl SequenceCompletion {
    /// Whether mentions had to be used.
    pub fn used_mentions(&self) -> bool {
        !self.mentions.is_empty()
    }
}

/// Detect headers, then fill numbers missing relative to the title range
/// and internal gaps between the smallest and largest header.
pub fn complete_sequence(text: &str, title: &str) -> SequenceCompletion {
    let headers = detect(text);
    let mut numbers: BTreeSet<u32> = headers.iter().map(|h| h.article_number).collect();

    let mut needed: BTreeSet<u32> = title_range(title)
        .into_iter()
        .filter(|n| !numbers.contains(n))
        .collect();
    if let (Some(&min), Some(&max)) = (numbers.first(), numbers.last()) {
        needed.extend((min..=max).filter(|n| !numbers.contains(n)));
    }

    if needed.is_empty() {
        return SequenceCompletion {
            numbers: numbers.into_iter().collect(),
            headers,
            ..Default::default()
        };
    }

    let needed: Vec<u32> = needed.into_iter().collect();
    debug!(missing = ?needed, "filling article gaps from mentions");
    let mentions = fill(text, &needed);
    numbers.extend(mentions.iter().map(|m| m.article_number));
    let unresolved: Vec<u32> = needed
        .into_iter()
        .filter(|n| !numbers.contains(n))
        .collect();
    if !unresolved.is_empty() {
        warn!(unresolved = ?unresolved, "article numbers not found in text");
    }

    SequenceCompletion {
        numbers: numbers.into_iter().collect(),
        headers,
        mentions,
        unresolved,
    }
}

/// A discontinuity in an article-number sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceBreak {
    /// Index of the offending number in the checked sequence.
    pub position: usize,
    pub previous: u32,
    pub next: u32,
}

/// Check that each step is `+1` or a repeat, with at most
/// `max_consecutive_repeats` repeats in a row.
pub fn check_sequence_integrity(
    numbers: &[u32],
    max_consecutive_repeats: usize,
) -> Vec<SequenceBreak> {
    let mut breaks = Vec::new();
    let mut repeats = 0;
    for (position, pair) in numbers.windows(2).enumerate() {
        let (previous, next) = (pair[0], pair[1]);
        let ok = if next == previous {
            repeats += 1;
            repeats <= max_consecutive_repeats
        } else {
            repeats = 0;
            next == previous + 1
        };
        if !ok {
            breaks.push(SequenceBreak {
                position: position + 1,
                previous,
                next,
            });
        }
    }
    breaks
}

/// [`check_sequence_integrity`] with the default repeat allowance.
pub fn is_continuous(numbers: &[u32]) -> bool {
    check_sequence_integrity(numbers, MAX_CONSECUTIVE_REPEATS).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_range_variants() {
        assert_eq!(title_range("ΜΕΡΟΣ Α (1-3)"), vec![1, 2, 3]);
        assert_eq!(title_range("ΜΕΡΟΣ Α ( 10 – 11 )"), vec![10, 11]);
        assert!(title_range("ΜΕΡΟΣ Α (9-3)").is_empty());
    }

    #[test]
    fn test_bridge_numbers() {
        assert_eq!(bridge_numbers(&[1, 2, 3], &[6, 7]), vec![4, 5]);
        assert!(bridge_numbers(&[1, 2], &[3]).is_empty());
        assert!(bridge_numbers(&[], &[3]).is_empty());
    }

    #[test]
    fn test_complete_sequence_fills_internal_gap() {
        let text = "Άρθρο 1\nκείμενο\n«Άρθρο 2\nνέο»\nΆρθρο 3\nτέλος";
        let completion = complete_sequence(text, "");
        assert_eq!(completion.numbers, vec![1, 2, 3]);
        assert_eq!(completion.mentions.len(), 1);
        assert_eq!(completion.mentions[0].line_index, 2);
        assert!(completion.unresolved.is_empty());
    }

    #[test]
    fn test_complete_sequence_uses_title_range() {
        let text = "Άρθρο 1\nκείμενο για το Άρθρο 2 και τέλος";
        let completion = complete_sequence(text, "Διατάξεις (1-3)");
        assert_eq!(completion.numbers, vec![1, 2]);
        assert_eq!(completion.unresolved, vec![3]);
        assert!(completion.used_mentions());
    }

    #[test]
    fn test_complete_sequence_without_gaps() {
        let completion = complete_sequence("Άρθρο 1\nΆρθρο 2", "");
        assert_eq!(completion.numbers, vec![1, 2]);
        assert!(!completion.used_mentions());
    }

    #[test]
    fn test_sequence_integrity() {
        assert!(is_continuous(&[1, 2, 3, 3, 4]));
        assert_eq!(
            check_sequence_integrity(&[1, 2, 4], 5),
            vec![SequenceBreak {
                position: 2,
                previous: 2,
                next: 4
            }]
        );
        assert!(!is_continuous(&[1, 1, 1, 1, 1, 1, 1]));
        assert!(is_continuous(&[1, 1, 1, 1, 1, 1]));
        assert!(!is_continuous(&[3, 2]));
    }
}
