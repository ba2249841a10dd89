//! Article header grammar.
//!
//! A header such as `## **Άρθρο 12Α** – Τροποποίηση` is recognised by a
//! sequence of small stages, each consuming from a shared [`Cursor`]:
//!
//! 1. [`list_prefix`]: optional `#`-run, `*` or `-` followed by whitespace
//! 2. [`decoration`]: emphasis characters around whole tokens
//! 3. [`keyword`]: `Άρθρο` / `Αρθρο` / `Άρθρα` / `άρθρα`
//! 4. [`number`]: digits (rejoined across `****`) or an ordinal word
//! 5. [`suffix`]: one or two Greek letters (`12Α`)
//! 6. [`range_end`]: `–8` in `Άρθρα 5–8`
//! 7. [`paragraph`]: `παρ. 2`, which demotes the header to a sub-reference
//!
//! Stages that fail leave the cursor where it was.

use serde::Serialize;

use crate::config::{DECORATION_CHARS, PARAGRAPH_MARKER, QUOTE_OPEN, SPLIT_DIGITS_MARKER};
use crate::numeral::match_ordinal_prefix;

/// Position within the text being matched.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, bytes: usize) {
        self.pos += bytes;
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let len: usize = self
            .rest()
            .chars()
            .take_while(|c| pred(*c))
            .map(char::len_utf8)
            .sum();
        self.pos += len;
        &self.text[start..self.pos]
    }

    fn eat_str(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn eat_whitespace(&mut self) -> usize {
        self.eat_while(char::is_whitespace).len()
    }
}

/// Singular or plural article keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Singular,
    Plural,
}

/// How the article number was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberForm {
    Digits,
    Ordinal,
}

/// A successful match of the header grammar.
///
/// Offsets are byte offsets into the text handed to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMatch {
    /// Start of the match, including any list prefix.
    pub start: usize,
    /// Start of the article keyword.
    pub keyword_start: usize,
    /// End of the structured part; trailing free text follows.
    pub end: usize,
    pub keyword: Keyword,
    pub number: u32,
    pub number_form: NumberForm,
    pub suffix: Option<String>,
    pub range_end: Option<u32>,
    pub paragraph: Option<u32>,
}

impl HeaderMatch {
    /// Whether a paragraph marker demotes this match to a sub-reference.
    pub fn is_paragraph_reference(&self) -> bool {
        self.paragraph.is_some()
    }

    /// Article numbers covered by this match.
    ///
    /// A range whose end precedes its start yields only the start.
    pub fn numbers(&self) -> Vec<u32> {
        match self.range_end {
            Some(end) if end >= self.number => (self.number..=end).collect(),
            _ => vec![self.number],
        }
    }

    /// Whether this match expands to more than one article number.
    pub fn is_valid_range(&self) -> bool {
        self.range_end.is_some_and(|end| end >= self.number)
    }
}

fn is_decoration(c: char) -> bool {
    DECORATION_CHARS.contains(&c)
}

/// Optional Markdown list or heading marker followed by whitespace.
pub fn list_prefix(cursor: &mut Cursor<'_>) -> bool {
    let saved = *cursor;
    let consumed = match cursor.peek() {
        Some('#') => !cursor.eat_while(|c| c == '#').is_empty(),
        Some('*') | Some('-') => {
            cursor.bump(1);
            true
        }
        _ => false,
    };
    if consumed && cursor.eat_whitespace() > 0 {
        return true;
    }
    *cursor = saved;
    false
}

/// Run of emphasis characters.
pub fn decoration(cursor: &mut Cursor<'_>) {
    cursor.eat_while(is_decoration);
}

/// Article keyword with an optional trailing full stop.
///
/// Decoration is tolerated only between the stem and the final vowel
/// (`Άρθρ**ο**`), never elsewhere inside the word.
pub fn keyword(cursor: &mut Cursor<'_>) -> Option<Keyword> {
    let saved = *cursor;
    let found = if cursor.eat_str("Άρθρ") || cursor.eat_str("Αρθρ") {
        decoration(cursor);
        match cursor.peek() {
            Some(c @ ('ο' | 'o')) => {
                cursor.bump(c.len_utf8());
                Some(Keyword::Singular)
            }
            Some('α') => {
                cursor.bump('α'.len_utf8());
                Some(Keyword::Plural)
            }
            _ => None,
        }
    } else if cursor.eat_str("άρθρα") || cursor.eat_str("αρθρα") {
        Some(Keyword::Plural)
    } else {
        None
    };

    match found {
        Some(kind) => {
            cursor.eat_str(".");
            Some(kind)
        }
        None => {
            *cursor = saved;
            None
        }
    }
}

/// Article number: digits or a lowercase ordinal word.
pub fn number(cursor: &mut Cursor<'_>) -> Option<(u32, NumberForm)> {
    let saved = *cursor;
    let digits = cursor.eat_while(|c| c.is_ascii_digit());
    if !digits.is_empty() {
        let mut joined = digits.to_string();
        let before_split = *cursor;
        if cursor.eat_str(SPLIT_DIGITS_MARKER) {
            let tail = cursor.eat_while(|c| c.is_ascii_digit());
            if tail.is_empty() {
                *cursor = before_split;
            } else {
                joined.push_str(tail);
            }
        }
        return match joined.parse() {
            Ok(n) => Some((n, NumberForm::Digits)),
            Err(_) => {
                *cursor = saved;
                None
            }
        };
    }
    let (value, len) = match_ordinal_prefix(cursor.rest())?;
    cursor.bump(len);
    Some((value, NumberForm::Ordinal))
}

fn is_basic_greek_letter(c: char) -> bool {
    matches!(c, 'Α'..='Ω' | 'α'..='ω')
}

/// One or two Greek letters directly attached to (or spaced from) the number.
pub fn suffix(cursor: &mut Cursor<'_>) -> Option<String> {
    let saved = *cursor;
    decoration(cursor);
    cursor.eat_whitespace();
    if cursor.rest().starts_with(PARAGRAPH_MARKER) {
        *cursor = saved;
        return None;
    }
    let letters: String = cursor
        .rest()
        .chars()
        .take_while(|c| is_basic_greek_letter(*c))
        .collect();
    let count = letters.chars().count();
    let bounded = !cursor.rest()[letters.len()..]
        .chars()
        .next()
        .is_some_and(char::is_alphanumeric);
    if (1..=2).contains(&count) && bounded {
        cursor.bump(letters.len());
        Some(letters)
    } else {
        *cursor = saved;
        None
    }
}

/// Range end such as `–8` or ` - 12`.
pub fn range_end(cursor: &mut Cursor<'_>) -> Option<u32> {
    let saved = *cursor;
    decoration(cursor);
    cursor.eat_whitespace();
    if !(cursor.eat_str("-") || cursor.eat_str("–")) {
        *cursor = saved;
        return None;
    }
    cursor.eat_whitespace();
    let digits = cursor.eat_while(|c| c.is_ascii_digit());
    match digits.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            *cursor = saved;
            None
        }
    }
}

/// Paragraph marker `παρ. N`, optionally introduced by `.` or `:`.
pub fn paragraph(cursor: &mut Cursor<'_>) -> Option<u32> {
    let saved = *cursor;
    cursor.eat_whitespace();
    if !cursor.eat_str(".") {
        cursor.eat_str(":");
    }
    cursor.eat_whitespace();
    if !cursor.eat_str(PARAGRAPH_MARKER) {
        *cursor = saved;
        return None;
    }
    cursor.eat_whitespace();
    let digits = cursor.eat_while(|c| c.is_ascii_digit());
    match digits.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            *cursor = saved;
            None
        }
    }
}

/// Run every stage after the list prefix, starting at the cursor.
fn header_body(cursor: &mut Cursor<'_>, start: usize) -> Option<HeaderMatch> {
    decoration(cursor);
    let keyword_start = cursor.pos();
    let keyword = keyword(cursor)?;
    decoration(cursor);
    cursor.eat_whitespace();
    decoration(cursor);
    let (number, number_form) = number(cursor)?;
    let suffix = suffix(cursor);
    decoration(cursor);
    let range_end = range_end(cursor);
    let paragraph = paragraph(cursor);
    Some(HeaderMatch {
        start,
        keyword_start,
        end: cursor.pos(),
        keyword,
        number,
        number_form,
        suffix,
        range_end,
        paragraph,
    })
}

/// Match a header at the start of `line`.
///
/// Leading whitespace and opening Guillemets are skipped so that quoted
/// headers still surface as candidates.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::grammar::match_line;
///
/// let m = match_line("**Άρθρο 12Α** – Τροποποίηση").unwrap();
/// assert_eq!(m.number, 12);
/// assert_eq!(m.suffix.as_deref(), Some("Α"));
/// ```
pub fn match_line(line: &str) -> Option<HeaderMatch> {
    let mut cursor = Cursor::new(line, 0);
    cursor.eat_while(|c| c.is_whitespace() || c == QUOTE_OPEN);
    let start = cursor.pos();
    list_prefix(&mut cursor);
    header_body(&mut cursor, start)
}

/// Find every keyword occurrence in `line`, anywhere, that parses as a header.
///
/// Occurrences glued to a preceding letter or digit are skipped.
pub fn find_all(line: &str) -> Vec<HeaderMatch> {
    let mut matches = Vec::new();
    let mut previous: Option<char> = None;
    let mut skip_until = 0;
    for (idx, c) in line.char_indices() {
        let at_boundary = !previous.is_some_and(char::is_alphanumeric);
        previous = Some(c);
        if idx < skip_until || !at_boundary || !matches!(c, 'Ά' | 'Α' | 'ά' | 'α') {
            continue;
        }
        let mut cursor = Cursor::new(line, idx);
        if let Some(found) = header_body(&mut cursor, idx) {
            skip_until = found.end;
            matches.push(found);
        }
    }
    matches
}

/// Whether only whitespace, list markers, decoration or opening quotes
/// precede `offset`.
pub fn is_line_start(line: &str, offset: usize) -> bool {
    line[..offset].chars().all(|c| {
        c.is_whitespace() || is_decoration(c) || matches!(c, '#' | '-' | QUOTE_OPEN)
    })
}
