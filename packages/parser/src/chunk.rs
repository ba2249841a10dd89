//! Lossless decomposition of a document into preamble and article chunks.

use serde::Serialize;

use crate::boundary::{detect, HeaderLocation};
use crate::gap_fill::Mention;
use crate::sequence::complete_sequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Preamble,
    Article,
}

/// A contiguous slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleChunk {
    pub index: usize,
    pub kind: ChunkKind,
    pub article_number: Option<u32>,
    pub title_line: Option<String>,
    pub content_text: String,
    pub start_line: usize,
    /// Exclusive.
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl ArticleChunk {
    pub fn is_empty(&self) -> bool {
        self.content_text.trim().is_empty()
    }

    /// Chunk text without its header line.
    pub fn body(&self) -> &str {
        match self.kind {
            ChunkKind::Preamble => &self.content_text,
            ChunkKind::Article => self
                .content_text
                .split_once('\n')
                .map(|(_, rest)| rest)
                .unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone)]
struct Delimiter {
    offset: usize,
    article_number: u32,
    title_line: String,
}

fn line_text_at(text: &str, offset: usize) -> String {
    text[offset..]
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn delimiters(text: &str, headers: &[HeaderLocation], mentions: &[Mention]) -> Vec<Delimiter> {
    let mut all: Vec<Delimiter> = headers
        .iter()
        .map(|header| Delimiter {
            offset: header.line_start,
            article_number: header.article_number,
            title_line: header.original_line_text.trim().to_string(),
        })
        .chain(mentions.iter().map(|mention| Delimiter {
            offset: mention.byte_offset,
            article_number: mention.article_number,
            title_line: line_text_at(text, mention.byte_offset),
        }))
        .collect();
    // Stable sort keeps headers ahead of mentions at the same offset, and
    // range expansions share one line where the first (lowest) number labels it.
    all.sort_by_key(|d| d.offset);
    all.dedup_by_key(|d| d.offset);
    all
}

fn make_chunk(
    text: &str,
    index: usize,
    range: (usize, usize),
    delimiter: Option<&Delimiter>,
) -> ArticleChunk {
    let (start, end) = range;
    let content_text = text[start..end].to_string();
    let start_line = text[..start].matches('\n').count();
    let end_line = start_line + content_text.split_inclusive('\n').count();
    ArticleChunk {
        index,
        kind: if delimiter.is_some() {
            ChunkKind::Article
        } else {
            ChunkKind::Preamble
        },
        article_number: delimiter.map(|d| d.article_number),
        title_line: delimiter.map(|d| d.title_line.clone()),
        content_text,
        start_line,
        end_line,
        start_byte: start,
        end_byte: end,
    }
}

/// Split `text` at every header line and mention.
///
/// Concatenating the `content_text` of the returned chunks reproduces
/// `text` exactly. Text with no delimiters becomes a single preamble.
pub fn reconstruct(text: &str, headers: &[HeaderLocation], mentions: &[Mention]) -> Vec<ArticleChunk> {
    if text.is_empty() {
        return Vec::new();
    }
    let delimiters = delimiters(text, headers, mentions);
    let mut chunks = Vec::with_capacity(delimiters.len() + 1);

    let first_offset = delimiters.first().map_or(text.len(), |d| d.offset);
    if first_offset > 0 {
        chunks.push(make_chunk(text, 0, (0, first_offset), None));
    }

    for (i, delimiter) in delimiters.iter().enumerate() {
        let end = delimiters.get(i + 1).map_or(text.len(), |next| next.offset);
        chunks.push(make_chunk(
            text,
            chunks.len(),
            (delimiter.offset, end),
            Some(delimiter),
        ));
    }
    chunks
}

/// Chunk a document using true headers only.
pub fn chunk_document(text: &str) -> Vec<ArticleChunk> {
    reconstruct(text, &detect(text), &[])
}

/// Chunk a document after completing its article sequence from the title
/// range and internal gaps.
pub fn chunk_document_with_title(text: &str, title: &str) -> Vec<ArticleChunk> {
    let completion = complete_sequence(text, title);
    reconstruct(text, &completion.headers, &completion.mentions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap_fill::fill;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const QUOTED_SCENARIO: &str = "Άρθρο 1\nΠεριεχόμενο Α.\n«Άρθρο Χ αναφέρεται εδώ.\nΔεύτερη γραμμή.»\nΆρθρο 2\nΠεριεχόμενο Β.";

    fn concat(chunks: &[ArticleChunk]) -> String {
        chunks.iter().map(|c| c.content_text.as_str()).collect()
    }

    #[test]
    fn test_quoted_block_stays_in_article() {
        let chunks = chunk_document(QUOTED_SCENARIO);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Article);
        assert_eq!(chunks[0].article_number, Some(1));
        assert_eq!(chunks[0].start_line, 0);
        assert_eq!(chunks[0].end_line, 4);
        assert!(chunks[0].content_text.ends_with("Δεύτερη γραμμή.»\n"));
        assert_eq!(chunks[1].article_number, Some(2));
        assert_eq!(chunks[1].title_line.as_deref(), Some("Άρθρο 2"));
        assert_eq!(chunks[1].body(), "Περιεχόμενο Β.");
        assert_eq!(concat(&chunks), QUOTED_SCENARIO);
    }

    #[test]
    fn test_preamble_chunk() {
        let text = "Εισηγητική έκθεση\n\nΆρθρο 1\nΚείμενο";
        let chunks = chunk_document(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Preamble);
        assert_eq!(chunks[0].content_text, "Εισηγητική έκθεση\n\n");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].start_line, 2);
    }

    #[test]
    fn test_no_headers_single_preamble() {
        let chunks = chunk_document("Μόνο κείμενο.\nΚαι άλλο.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Preamble);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_document("").is_empty());
    }

    #[test]
    fn test_range_header_is_one_chunk() {
        let text = "Άρθρα 5-8 (καταργούνται)\nΆρθρο 9\nΝέο";
        let chunks = chunk_document(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].article_number, Some(5));
    }

    #[test]
    fn test_header_wins_over_mention_at_same_offset() {
        let text = "Άρθρα 5-7 (καταργούνται)\nΆρθρο 8\nΝέο";
        let mention = Mention {
            line_index: 0,
            byte_offset: 0,
            match_text: "Άρθρα 5".to_string(),
            article_number: 6,
            is_start_of_line: true,
            is_quoted: false,
            priority: 1,
        };
        let found = delimiters(text, &detect(text), &[mention]);
        let numbers: Vec<u32> = found.iter().map(|d| d.article_number).collect();
        assert_eq!(numbers, vec![5, 8]);
        assert_eq!(found[0].title_line, "Άρθρα 5-7 (καταργούνται)");
    }

    #[test]
    fn test_mid_line_mention_delimiter() {
        let text = "Άρθρο 1\nκείμενο Άρθρο 2 συνέχεια\nΆρθρο 3\nτέλος";
        let chunks = reconstruct(text, &detect(text), &fill(text, &[2]));
        let numbers: Vec<Option<u32>> = chunks.iter().map(|c| c.article_number).collect();
        assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(chunks[1].title_line.as_deref(), Some("Άρθρο 2 συνέχεια"));
        assert_eq!(concat(&chunks), text);
    }

    #[test]
    fn test_chunk_document_with_title() {
        let text = "Άρθρο 1\nα\n«Άρθρο 2\nβ»\nΆρθρο 3\nγ";
        let chunks = chunk_document_with_title(text, "");
        assert_eq!(chunks.len(), 3);
        assert_eq!(concat(&chunks), text);
    }

    proptest! {
        #[test]
        fn proptest_reconstruct_round_trip(
            text in "(Άρθρο [0-9]{1,2}|Άρθρα [0-9]-[0-9]|«|»|\n|\r\n|# |παρ\\. 2| |[α-ω]{1,6}){0,40}"
        ) {
            let chunks = chunk_document(&text);
            prop_assert_eq!(concat(&chunks), text.clone());

            let needed: Vec<u32> = (0..20).collect();
            let chunks = reconstruct(&text, &detect(&text), &fill(&text, &needed));
            prop_assert_eq!(concat(&chunks), text);
        }

        #[test]
        fn proptest_chunks_are_contiguous(text in "(Άρθρο [0-9]|«|»|\n|[α-ω ]{1,8}){1,30}") {
            let chunks = chunk_document_with_title(&text, "(1-9)");
            let mut expected_start = 0;
            for chunk in &chunks {
                prop_assert_eq!(chunk.start_byte, expected_start);
                prop_assert!(chunk.end_byte > chunk.start_byte);
                expected_start = chunk.end_byte;
            }
            prop_assert_eq!(expected_start, text.len());
        }
    }
}
