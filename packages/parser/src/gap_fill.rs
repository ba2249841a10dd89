//! Gap filling from non-structural mentions.
//!
//! When an article number is expected but no true header carries it, the
//! best remaining occurrence of the number anywhere in the text stands in as
//! a delimiter. Quoted and mid-line occurrences are accepted, but rank lower.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::boundary::lines_with_depth;
use crate::grammar::{find_all, is_line_start};

/// An occurrence of an article-number pattern anywhere in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub line_index: usize,
    /// Absolute byte offset where a chunk would start: the line start for
    /// start-of-line mentions, the keyword otherwise.
    pub byte_offset: usize,
    pub match_text: String,
    pub article_number: u32,
    pub is_start_of_line: bool,
    pub is_quoted: bool,
    /// 1 (start of line, unquoted) to 4 (mid-line, quoted).
    pub priority: u8,
}

/// Rank an occurrence; lower is better.
pub fn priority(is_start_of_line: bool, is_quoted: bool) -> u8 {
    match (is_start_of_line, is_quoted) {
        (true, false) => 1,
        (true, true) => 2,
        (false, false) => 3,
        (false, true) => 4,
    }
}

/// Every mention in `text`, regardless of number, in document order.
pub fn scan_mentions(text: &str) -> Vec<Mention> {
    let mut mentions = Vec::new();
    for (line, depth) in lines_with_depth(text) {
        for found in find_all(line.text) {
            let is_start_of_line = is_line_start(line.text, found.keyword_start);
            let is_quoted = depth.advance(&line.text[..found.keyword_start]).is_open();
            let byte_offset = if is_start_of_line {
                line.start
            } else {
                line.start + found.keyword_start
            };
            let match_text = line.text[found.keyword_start..found.end].to_string();
            for article_number in found.numbers() {
                mentions.push(Mention {
                    line_index: line.index,
                    byte_offset,
                    match_text: match_text.clone(),
                    article_number,
                    is_start_of_line,
                    is_quoted,
                    priority: priority(is_start_of_line, is_quoted),
                });
            }
        }
    }
    mentions
}

/// Find the best mention for each needed article number.
///
/// Among equally ranked mentions the first in document order wins. The
/// result is ordered by position.
pub fn fill(text: &str, needed_numbers: &[u32]) -> Vec<Mention> {
    if needed_numbers.is_empty() {
        return Vec::new();
    }
    let needed: HashSet<u32> = needed_numbers.iter().copied().collect();
    let mut best: BTreeMap<u32, Mention> = BTreeMap::new();

    for mention in scan_mentions(text) {
        if !needed.contains(&mention.article_number) {
            continue;
        }
        let replace = best
            .get(&mention.article_number)
            .is_none_or(|current| mention.priority < current.priority);
        if replace {
            best.insert(mention.article_number, mention);
        }
    }

    for number in needed.iter().filter(|n| !best.contains_key(n)) {
        debug!(number, "no mention found for missing article");
    }

    let mut mentions: Vec<Mention> = best.into_values().collect();
    mentions.sort_by_key(|m| (m.byte_offset, m.article_number));
    mentions
}
