//! True-header detection.
//!
//! Every line is tried against the header grammar. Candidates are discarded
//! when they sit inside Guillemet-quoted amendment text (which may span many
//! lines) or carry a paragraph marker.

use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::config::{QUOTE_CLOSE, QUOTE_OPEN};
use crate::grammar::{match_line, HeaderMatch};

/// Running Guillemet balance, threaded through a document line by line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuoteDepth {
    pub opens: usize,
    pub closes: usize,
}

impl QuoteDepth {
    /// Account for all quote characters in `segment`.
    #[must_use]
    pub fn advance(self, segment: &str) -> Self {
        segment.chars().fold(self, |depth, c| match c {
            QUOTE_OPEN => Self {
                opens: depth.opens + 1,
                ..depth
            },
            QUOTE_CLOSE => Self {
                closes: depth.closes + 1,
                ..depth
            },
            _ => depth,
        })
    }

    /// Inside a quotation when more quotes were opened than closed.
    pub fn is_open(&self) -> bool {
        self.opens > self.closes
    }
}

/// One physical line of a document.
#[derive(Debug, Clone, Copy)]
pub struct LineSpan<'a> {
    pub index: usize,
    /// Byte offset of the first character of the line.
    pub start: usize,
    /// Line text without its terminator.
    pub text: &'a str,
}

/// Split `text` into lines, keeping track of byte offsets.
pub fn line_spans(text: &str) -> impl Iterator<Item = LineSpan<'_>> {
    text.split_inclusive('\n')
        .scan(0usize, |offset, raw| {
            let start = *offset;
            *offset += raw.len();
            let trimmed = raw.trim_end_matches(['\n', '\r']);
            Some((start, trimmed))
        })
        .enumerate()
        .map(|(index, (start, text))| LineSpan { index, start, text })
}

/// Pair each line with the quote depth accumulated over all previous lines.
pub fn lines_with_depth(text: &str) -> impl Iterator<Item = (LineSpan<'_>, QuoteDepth)> {
    line_spans(text).scan(QuoteDepth::default(), |depth, line| {
        let before = *depth;
        *depth = depth.advance(line.text);
        Some((line, before))
    })
}

/// A line that matched the header grammar, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCandidate {
    pub line_index: usize,
    pub line_start: usize,
    pub line_text: String,
    #[serde(flatten)]
    pub header: HeaderMatch,
    pub is_quoted: bool,
}

impl HeaderCandidate {
    /// Candidates that survive quote and paragraph filtering.
    pub fn is_true_header(&self) -> bool {
        !self.is_quoted && !self.header.is_paragraph_reference()
    }
}

/// A recognised structural article boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderLocation {
    pub line_index: usize,
    /// Byte offset of the header line within the document.
    pub line_start: usize,
    pub original_line_text: String,
    /// Byte range of the match within the line.
    pub matched_span: Range<usize>,
    pub article_number: u32,
    pub suffix: Option<String>,
    pub is_range_expansion: bool,
    pub is_quoted: bool,
}

/// All lines matching the header grammar, with their quote status.
pub fn detect_candidates(text: &str) -> Vec<HeaderCandidate> {
    lines_with_depth(text)
        .filter_map(|(line, depth)| {
            let header = match_line(line.text)?;
            let is_quoted = depth.advance(&line.text[..header.start]).is_open();
            Some(HeaderCandidate {
                line_index: line.index,
                line_start: line.start,
                line_text: line.text.to_string(),
                header,
                is_quoted,
            })
        })
        .collect()
}

/// Detect true article headers, expanding numeral ranges.
///
/// The result is ordered by `(line_index, article_number)`.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::boundary::detect;
///
/// let text = "Άρθρο 1\nΚείμενο «Άρθρο 9 νέο»\nΆρθρα 2-3";
/// let numbers: Vec<u32> = detect(text).iter().map(|h| h.article_number).collect();
/// assert_eq!(numbers, vec![1, 2, 3]);
/// ```
pub fn detect(text: &str) -> Vec<HeaderLocation> {
    let mut headers: Vec<HeaderLocation> = detect_candidates(text)
        .into_iter()
        .filter(|candidate| {
            let keep = candidate.is_true_header();
            if !keep {
                debug!(
                    line = candidate.line_index,
                    number = candidate.header.number,
                    quoted = candidate.is_quoted,
                    "skipping header candidate"
                );
            }
            keep
        })
        .flat_map(expand)
        .collect();
    headers.sort_by_key(|h| (h.line_index, h.article_number));
    headers
}

fn expand(candidate: HeaderCandidate) -> Vec<HeaderLocation> {
    let is_range_expansion = candidate.header.is_valid_range();
    let span = candidate.header.start..candidate.header.end;
    candidate
        .header
        .numbers()
        .into_iter()
        .map(|article_number| HeaderLocation {
            line_index: candidate.line_index,
            line_start: candidate.line_start,
            original_line_text: candidate.line_text.clone(),
            matched_span: span.clone(),
            article_number,
            suffix: candidate.header.suffix.clone(),
            is_range_expansion,
            is_quoted: candidate.is_quoted,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(text: &str) -> Vec<u32> {
        detect(text).iter().map(|h| h.article_number).collect()
    }

    #[test]
    fn test_quote_depth_advance() {
        let depth = QuoteDepth::default().advance("«α» «β");
        assert_eq!(depth, QuoteDepth { opens: 2, closes: 1 });
        assert!(depth.is_open());
        assert!(!depth.advance("»").is_open());
    }

    #[test]
    fn test_line_spans_offsets() {
        let text = "α\r\nββ\nγ";
        let spans: Vec<(usize, usize, &str)> =
            line_spans(text).map(|l| (l.index, l.start, l.text)).collect();
        assert_eq!(spans, vec![(0, 0, "α"), (1, 4, "ββ"), (2, 9, "γ")]);
    }

    #[test]
    fn test_detect_skips_multiline_quote() {
        let text = "Άρθρο 1\nΠεριεχόμενο Α.\n«Άρθρο Χ αναφέρεται εδώ.\nΆρθρο 7\nΔεύτερη γραμμή.»\nΆρθρο 2\nΠεριεχόμενο Β.";
        assert_eq!(numbers(text), vec![1, 2]);
    }

    #[test]
    fn test_detect_quoted_on_same_line() {
        let text = "« Άρθρο 1 »\nΆρθρο 2";
        assert_eq!(numbers(text), vec![2]);
        let candidates = detect_candidates(text);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].is_quoted);
    }

    #[test]
    fn test_detect_range_expansion() {
        let headers = detect("Άρθρα 5–8 (καταργούνται)");
        assert_eq!(headers.len(), 4);
        assert!(headers.iter().all(|h| h.line_index == 0 && h.is_range_expansion));
        assert_eq!(
            headers.iter().map(|h| h.article_number).collect::<Vec<_>>(),
            vec![5, 6, 7, 8]
        );
    }

    #[test]
    fn test_detect_excludes_paragraph_reference() {
        let text = "Άρθρο 4\nΆρθρο 4 παρ. 2\nκείμενο";
        assert_eq!(numbers(text), vec![4]);
        assert_eq!(detect_candidates(text).len(), 2);
    }

    #[test]
    fn test_detect_sorted_by_line_then_number() {
        let text = "Άρθρο 3\nΆρθρα 1-2";
        let pairs: Vec<(usize, u32)> = detect(text)
            .iter()
            .map(|h| (h.line_index, h.article_number))
            .collect();
        assert_eq!(pairs, vec![(0, 3), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_detect_no_headers() {
        assert!(detect("Απλό κείμενο χωρίς άρθρα.").is_empty());
    }
}
