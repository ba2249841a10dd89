//! Chunk classification by citation and quote structure.
//!
//! A chunk amends an existing law when it cites one and then quotes the new
//! wording. The quote has to come after the citation: a quote before any
//! citation is usually the chunk's own title or a defined term.

use std::sync::LazyLock;

use nomothesia_parser::numeral::strip_accents_upper;
use nomothesia_parser::ArticleChunk;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Words of an unverified citation chunk kept as its presumed change.
pub const UNVERIFIED_WINDOW_WORDS: usize = 900;
/// Shortest quote that counts as new wording.
pub const MIN_QUOTED_WORDS: usize = 10;

const SCOPE_MARKER: &str = "ΣΚΟΠΟΣ";
const SUBJECT_MARKER: &str = "ΑΝΤΙΚΕΙΜΕΝΟ";

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LAW_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[?\b(?P<kind>α\.\s?ν\.|κ\.\s?ν\.|ν\.\s?δ\.|ν\.|νόμου|v\.)\s*(?P<number>\d+)\s*/\s*(?P<year>\d{4})(?:[\s,]*\(?(?P<gazette>[ΑA]['΄’`]?\s*\d+)\)?)?\]?",
    )
    .expect("valid law citation regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DECREE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<kind>π\.\s?δ\.|προεδρικ[οό]\s+διάταγμα(?:τος)?)\s*(?P<number>\d+)\s*/\s*(?P<year>\d{4})",
    )
    .expect("valid decree citation regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Label {
    ModifiesLaw,
    NewProvision,
    IntroScope,
    IntroSubject,
}

impl Label {
    pub fn is_intro(self) -> bool {
        matches!(self, Label::IntroScope | Label::IntroSubject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Law,
    PresidentialDecree,
}

/// A law or decree reference such as `ν. 4887/2022 (Α' 16)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub kind: CitationKind,
    pub text: String,
    pub number: u32,
    pub year: u32,
    pub gazette: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl Citation {
    /// Canonical form used to group modifications, e.g. `ν. 4887/2022`.
    pub fn reference(&self) -> String {
        match self.kind {
            CitationKind::Law => format!("ν. {}/{}", self.number, self.year),
            CitationKind::PresidentialDecree => format!("π.δ. {}/{}", self.number, self.year),
        }
    }
}

/// A top-level `«…»` span. Nested quotes stay inside their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedSpan {
    pub start: usize,
    /// Exclusive; the text length for an unclosed quote.
    pub end: usize,
    pub words: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotedChange {
    pub text: String,
    /// The text is an actual quote following the citation.
    pub verified: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub label: Label,
    pub citation: Option<Citation>,
    pub quoted_change: Option<QuotedChange>,
}

fn capture_u32(caps: &regex::Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Law and decree citations in document order.
pub fn find_citations(text: &str) -> Vec<Citation> {
    let patterns = [
        (&*LAW_CITATION, CitationKind::Law),
        (&*DECREE_CITATION, CitationKind::PresidentialDecree),
    ];
    let mut citations: Vec<Citation> = patterns
        .iter()
        .flat_map(|(regex, kind)| {
            regex.captures_iter(text).filter_map(move |caps| {
                let whole = caps.get(0)?;
                Some(Citation {
                    kind: *kind,
                    text: whole.as_str().trim().to_string(),
                    number: capture_u32(&caps, "number")?,
                    year: capture_u32(&caps, "year")?,
                    gazette: caps.name("gazette").map(|m| m.as_str().to_string()),
                    start: whole.start(),
                    end: whole.end(),
                })
            })
        })
        .collect();
    citations.sort_by_key(|c| c.start);
    citations
}

/// Top-level Guillemet spans with their word counts.
pub fn quoted_spans(text: &str) -> Vec<QuotedSpan> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut open_at = 0usize;

    for (i, c) in text.char_indices() {
        match c {
            '«' => {
                if depth == 0 {
                    open_at = i;
                }
                depth += 1;
            }
            '»' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let end = i + c.len_utf8();
                    spans.push(span(text, open_at, end));
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        spans.push(span(text, open_at, text.len()));
    }
    spans
}

fn span(text: &str, start: usize, end: usize) -> QuotedSpan {
    let inner = text[start..end].trim_matches(|c| c == '«' || c == '»');
    QuotedSpan {
        start,
        end,
        words: inner.split_whitespace().count(),
    }
}

fn contains_word(text: &str, marker: &str) -> bool {
    strip_accents_upper(text)
        .split(|c: char| !c.is_alphabetic())
        .any(|word| word == marker)
}

fn leading_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    pub unverified_window_words: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            unverified_window_words: UNVERIFIED_WINDOW_WORDS,
        }
    }
}

impl Classifier {
    pub fn new(unverified_window_words: usize) -> Self {
        Self {
            unverified_window_words,
        }
    }

    pub fn classify(&self, chunk: &ArticleChunk) -> Classification {
        self.classify_text(&chunk.content_text, chunk.article_number)
    }

    pub fn classify_text(&self, text: &str, article_number: Option<u32>) -> Classification {
        let intro = match article_number {
            Some(1) if contains_word(text, SCOPE_MARKER) => Some(Label::IntroScope),
            Some(2) if contains_word(text, SUBJECT_MARKER) => Some(Label::IntroSubject),
            _ => None,
        };
        if let Some(label) = intro {
            return Classification {
                label,
                citation: None,
                quoted_change: None,
            };
        }

        let Some(citation) = find_citations(text).into_iter().next() else {
            return Classification {
                label: Label::NewProvision,
                citation: None,
                quoted_change: None,
            };
        };

        let quote = quoted_spans(text)
            .into_iter()
            .find(|q| q.start >= citation.end && q.words >= MIN_QUOTED_WORDS);

        match quote {
            Some(q) => Classification {
                label: Label::ModifiesLaw,
                quoted_change: Some(QuotedChange {
                    text: text[q.start..q.end].to_string(),
                    verified: true,
                    truncated: false,
                }),
                citation: Some(citation),
            },
            None => Classification {
                label: Label::NewProvision,
                quoted_change: Some(QuotedChange {
                    text: leading_words(text, self.unverified_window_words),
                    verified: false,
                    truncated: true,
                }),
                citation: Some(citation),
            },
        }
    }
}
