//! Part and Chapter hierarchy.
//!
//! Article titles in the corpus sometimes carry the enclosing structure
//! (`ΜΕΡΟΣ Α' – Γενικές διατάξεις`, `Άρθρο 5 ΚΕΦΑΛΑΙΟ Β΄`). The mapper walks
//! titles in document order, carries the current Part and Chapter forward,
//! and reports numbering jumps instead of rejecting them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{ARTICLE_KEYWORD, CHAPTER_KEYWORD, KEYWORD_MAX_EDIT_DISTANCE, PART_KEYWORD};
use crate::numeral::{greek_to_int, int_to_greek, normalized_ordinal_to_int, strip_accents_upper};

/// Longest ordinal phrase tried after a keyword (`ΔΕΚΑΤΟ ΤΡΙΤΟ` is two).
const MAX_ORDINAL_TOKENS: usize = 3;

/// One title line with a caller-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleLine {
    pub id: String,
    pub title: String,
}

impl TitleLine {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A numeral as declared in a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumeralLabel {
    pub index: u32,
    pub letters: String,
}

impl NumeralLabel {
    pub fn from_index(index: u32) -> Option<Self> {
        int_to_greek(index).map(|letters| Self { index, letters })
    }
}

impl fmt::Display for NumeralLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'", self.letters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Part,
    Chapter,
}

impl Level {
    fn keyword(self) -> &'static str {
        match self {
            Level::Part => PART_KEYWORD,
            Level::Chapter => CHAPTER_KEYWORD,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Part => write!(f, "Μέρος"),
            Level::Chapter => write!(f, "Κεφάλαιο"),
        }
    }
}

/// Part and Chapter in effect for one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyAssignment {
    pub id: String,
    pub title: String,
    pub part: Option<NumeralLabel>,
    pub chapter: Option<NumeralLabel>,
}

/// A declared index that is neither a repeat nor an advance by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuityAnomaly {
    pub id: String,
    pub level: Level,
    pub previous: u32,
    pub declared: u32,
}

/// A keyword whose numeral could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownNumeral {
    pub id: String,
    pub level: Level,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyMapping {
    pub assignments: Vec<HierarchyAssignment>,
    pub anomalies: Vec<ContinuityAnomaly>,
    pub unknown_numerals: Vec<UnknownNumeral>,
}

/// Normalize a title for marker matching.
///
/// Apostrophe and tonos variants become `'`, whitespace is collapsed,
/// accents are stripped, text is upper-cased and Latin capitals that look
/// like Greek ones are replaced by their Greek counterparts.
pub fn normalize_title(title: &str) -> String {
    let unified: String = title.chars().map(unify_apostrophe).collect();
    let collapsed = unified.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_accents_upper(&collapsed)
        .chars()
        .map(latin_to_greek)
        .collect()
}

fn unify_apostrophe(c: char) -> char {
    match c {
        '’' | '‘' | '΄' | '΅' => '\'',
        other => other,
    }
}

fn latin_to_greek(c: char) -> char {
    match c {
        'A' => 'Α',
        'B' => 'Β',
        'E' => 'Ε',
        'Z' => 'Ζ',
        'H' => 'Η',
        'I' => 'Ι',
        'K' => 'Κ',
        'M' => 'Μ',
        'N' => 'Ν',
        'O' => 'Ο',
        'P' => 'Ρ',
        'T' => 'Τ',
        'Y' => 'Υ',
        'X' => 'Χ',
        other => other,
    }
}

/// Edit distance between two strings, by character.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

struct Token {
    raw: String,
    normalized: String,
}

fn tokenize(title: &str) -> Vec<Token> {
    let unified: String = title.chars().map(unify_apostrophe).collect();
    unified
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|raw| Token {
            raw: raw.to_string(),
            normalized: normalize_title(raw),
        })
        .collect()
}

fn keyword_matches(token: &Token, keyword: &str) -> bool {
    if token.normalized == keyword {
        return true;
    }
    let is_upper = !token.raw.chars().any(char::is_lowercase);
    is_upper && levenshtein(&token.normalized, keyword) <= KEYWORD_MAX_EDIT_DISTANCE
}

/// Token positions at which a Part/Chapter keyword is accepted.
fn allowed_positions(tokens: &[Token]) -> Vec<usize> {
    let mut positions = vec![0];
    if tokens.first().is_some_and(|t| t.normalized == ARTICLE_KEYWORD) {
        positions.push(1);
        if tokens
            .get(1)
            .is_some_and(|t| t.normalized.chars().all(|c| c.is_ascii_digit()))
        {
            positions.push(2);
        }
    }
    positions
}

enum Marker {
    Found { label: NumeralLabel, next: usize },
    Unknown { token: Option<String> },
}

/// Read the numeral following a keyword at `keyword_at`.
fn read_numeral(tokens: &[Token], keyword_at: usize) -> Marker {
    let start = keyword_at + 1;
    let Some(first) = tokens.get(start) else {
        return Marker::Unknown { token: None };
    };

    let letters = &first.normalized;
    if (1..=3).contains(&letters.chars().count()) {
        if let Some(index) = greek_to_int(letters) {
            return Marker::Found {
                label: NumeralLabel {
                    index,
                    letters: letters.clone(),
                },
                next: start + 1,
            };
        }
    }

    for len in (1..=MAX_ORDINAL_TOKENS).rev() {
        let Some(words) = tokens.get(start..start + len) else {
            continue;
        };
        let phrase = words
            .iter()
            .map(|t| t.normalized.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(label) = normalized_ordinal_to_int(&phrase).and_then(NumeralLabel::from_index) {
            return Marker::Found {
                label,
                next: start + len,
            };
        }
    }

    Marker::Unknown {
        token: Some(first.raw.clone()),
    }
}

/// Markers found in one title.
#[derive(Default)]
struct TitleMarkers {
    part: Option<NumeralLabel>,
    chapter: Option<NumeralLabel>,
    unknown: Vec<(Level, Option<String>)>,
}

fn find_marker(tokens: &[Token], positions: &[usize], level: Level, markers: &mut TitleMarkers) -> Option<usize> {
    let at = positions
        .iter()
        .copied()
        .find(|&p| tokens.get(p).is_some_and(|t| keyword_matches(t, level.keyword())))?;
    match read_numeral(tokens, at) {
        Marker::Found { label, next } => {
            match level {
                Level::Part => markers.part = Some(label),
                Level::Chapter => markers.chapter = Some(label),
            }
            Some(next)
        }
        Marker::Unknown { token } => {
            markers.unknown.push((level, token));
            None
        }
    }
}

fn parse_markers(title: &str) -> TitleMarkers {
    let tokens = tokenize(title);
    let mut markers = TitleMarkers::default();
    let positions = allowed_positions(&tokens);
    let after_part = find_marker(&tokens, &positions, Level::Part, &mut markers);
    // A Chapter may also directly follow a Part marker on the same title.
    let mut chapter_positions = positions;
    if let Some(next) = after_part {
        chapter_positions.push(next);
    }
    find_marker(&tokens, &chapter_positions, Level::Chapter, &mut markers);
    markers
}

/// Running state carried from one title to the next.
#[derive(Debug, Default)]
struct MapperState {
    part: Option<NumeralLabel>,
    chapter: Option<NumeralLabel>,
}

fn check_step(previous: Option<&NumeralLabel>, declared: &NumeralLabel, id: &str, level: Level) -> Option<ContinuityAnomaly> {
    let previous = previous?.index;
    if declared.index == previous || declared.index == previous + 1 {
        return None;
    }
    warn!(
        id,
        level = %level,
        previous,
        declared = declared.index,
        "numbering jump in hierarchy"
    );
    Some(ContinuityAnomaly {
        id: id.to_string(),
        level,
        previous,
        declared: declared.index,
    })
}

/// Assign a Part and Chapter to every title, in order.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::hierarchy::{map, TitleLine};
///
/// let mapping = map(&[
///     TitleLine::new("1", "ΜΕΡΟΣ Α' ΚΕΦΑΛΑΙΟ Α' Σκοπός"),
///     TitleLine::new("2", "Αντικείμενο"),
///     TitleLine::new("3", "ΚΕΦΑΛΑΙΟ Β' Ορισμοί"),
/// ]);
/// let chapters: Vec<u32> = mapping
///     .assignments
///     .iter()
///     .filter_map(|a| a.chapter.as_ref().map(|c| c.index))
///     .collect();
/// assert_eq!(chapters, vec![1, 1, 2]);
/// assert!(mapping.anomalies.is_empty());
/// ```
pub fn map(titles: &[TitleLine]) -> HierarchyMapping {
    let mut state = MapperState::default();
    let mut mapping = HierarchyMapping::default();

    for line in titles {
        let markers = parse_markers(&line.title);
        for (level, token) in markers.unknown {
            warn!(id = %line.id, level = %level, token = ?token, "unknown numeral in title");
            mapping.unknown_numerals.push(UnknownNumeral {
                id: line.id.clone(),
                level,
                token,
            });
        }

        if let Some(part) = markers.part {
            mapping
                .anomalies
                .extend(check_step(state.part.as_ref(), &part, &line.id, Level::Part));
            let is_new_part = state.part.as_ref().is_none_or(|p| p.index != part.index);
            if is_new_part {
                state.chapter = None;
            }
            state.part = Some(part);
        }

        if let Some(chapter) = markers.chapter {
            mapping.anomalies.extend(check_step(
                state.chapter.as_ref(),
                &chapter,
                &line.id,
                Level::Chapter,
            ));
            state.chapter = Some(chapter);
        }

        mapping.assignments.push(HierarchyAssignment {
            id: line.id.clone(),
            title: line.title.clone(),
            part: state.part.clone(),
            chapter: state.chapter.clone(),
        });
    }
    mapping
}

/// A structural numbering problem found after mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContinuityIssue {
    FirstPartNotAlpha { id: String, found: String },
    PartJump { id: String, previous: u32, found: u32 },
    FirstChapterNotAlpha { id: String, part: Option<String>, found: String },
    ChapterJump { id: String, previous: u32, found: u32 },
}

impl fmt::Display for ContinuityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstPartNotAlpha { id, found } => {
                write!(f, "{id}: first Part is {found}', expected Α'")
            }
            Self::PartJump { id, previous, found } => {
                write!(f, "{id}: Part jumps from {previous} to {found}")
            }
            Self::FirstChapterNotAlpha { id, part, found } => write!(
                f,
                "{id}: first Chapter of Part {} is {found}', expected Α'",
                part.as_deref().unwrap_or("-")
            ),
            Self::ChapterJump { id, previous, found } => {
                write!(f, "{id}: Chapter jumps from {previous} to {found}")
            }
        }
    }
}

/// Stricter check over mapped titles.
///
/// Parts must start at Α and advance by one; within each Part, Chapters
/// must start at Α and then repeat or advance by one.
pub fn verify_continuity(assignments: &[HierarchyAssignment]) -> Vec<ContinuityIssue> {
    let mut issues = Vec::new();
    let mut last_part: Option<u32> = None;
    let mut last_chapter: Option<u32> = None;

    for assignment in assignments {
        let part_index = assignment.part.as_ref().map(|p| p.index);
        if let Some(part) = &assignment.part {
            if part_index != last_part {
                match last_part {
                    None if part.index != 1 => issues.push(ContinuityIssue::FirstPartNotAlpha {
                        id: assignment.id.clone(),
                        found: part.letters.clone(),
                    }),
                    Some(previous) if part.index != previous + 1 => {
                        issues.push(ContinuityIssue::PartJump {
                            id: assignment.id.clone(),
                            previous,
                            found: part.index,
                        })
                    }
                    _ => {}
                }
                last_part = part_index;
                last_chapter = None;
            }
        }

        if let Some(chapter) = &assignment.chapter {
            if Some(chapter.index) != last_chapter {
                match last_chapter {
                    None if chapter.index != 1 => {
                        issues.push(ContinuityIssue::FirstChapterNotAlpha {
                            id: assignment.id.clone(),
                            part: assignment.part.as_ref().map(|p| p.letters.clone()),
                            found: chapter.letters.clone(),
                        })
                    }
                    Some(previous) if chapter.index != previous + 1 => {
                        issues.push(ContinuityIssue::ChapterJump {
                            id: assignment.id.clone(),
                            previous,
                            found: chapter.index,
                        })
                    }
                    _ => {}
                }
                last_chapter = Some(chapter.index);
            }
        }
    }
    issues
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterNode {
    pub numeral: NumeralLabel,
    pub articles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartNode {
    /// `None` for material that precedes the first Part marker.
    pub numeral: Option<NumeralLabel>,
    pub chapters: Vec<ChapterNode>,
    /// Articles outside any Chapter.
    pub articles: Vec<String>,
}

impl PartNode {
    fn new(numeral: Option<NumeralLabel>) -> Self {
        Self {
            numeral,
            chapters: Vec::new(),
            articles: Vec::new(),
        }
    }

    /// Every article in the Part, in document order of its containers.
    pub fn all_articles(&self) -> impl Iterator<Item = &str> {
        self.articles
            .iter()
            .chain(self.chapters.iter().flat_map(|c| c.articles.iter()))
            .map(String::as_str)
    }
}

/// Tree of Parts, Chapters and article ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillHierarchy {
    pub parts: Vec<PartNode>,
}

impl BillHierarchy {
    /// Build the tree from assignments in document order.
    ///
    /// A Part or Chapter that reappears after a different one starts a new
    /// node, so the tree mirrors document order even for jumps.
    pub fn build(assignments: &[HierarchyAssignment]) -> Self {
        let mut parts: Vec<PartNode> = Vec::new();
        for assignment in assignments {
            let part_index = assignment.part.as_ref().map(|p| p.index);
            let needs_part = parts
                .last()
                .is_none_or(|p| p.numeral.as_ref().map(|n| n.index) != part_index);
            if needs_part {
                parts.push(PartNode::new(assignment.part.clone()));
            }
            let Some(part) = parts.last_mut() else {
                continue;
            };
            match &assignment.chapter {
                Some(chapter) => {
                    let needs_chapter = part
                        .chapters
                        .last()
                        .is_none_or(|c| c.numeral.index != chapter.index);
                    if needs_chapter {
                        part.chapters.push(ChapterNode {
                            numeral: chapter.clone(),
                            articles: Vec::new(),
                        });
                    }
                    if let Some(node) = part.chapters.last_mut() {
                        node.articles.push(assignment.id.clone());
                    }
                }
                None => part.articles.push(assignment.id.clone()),
            }
        }
        Self { parts }
    }

    pub fn article_count(&self) -> usize {
        self.parts.iter().map(|p| p.all_articles().count()).sum()
    }

    pub fn chapter_count(&self) -> usize {
        self.parts.iter().map(|p| p.chapters.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn titles(items: &[&str]) -> Vec<TitleLine> {
        items
            .iter()
            .enumerate()
            .map(|(i, t)| TitleLine::new((i + 1).to_string(), *t))
            .collect()
    }

    fn indices(mapping: &HierarchyMapping) -> Vec<(Option<u32>, Option<u32>)> {
        mapping
            .assignments
            .iter()
            .map(|a| (a.part.as_ref().map(|p| p.index), a.chapter.as_ref().map(|c| c.index)))
            .collect()
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Μέρος  Α΄"), "ΜΕΡΟΣ Α'");
        assert_eq!(normalize_title("KEΦAΛAIO B’"), "ΚΕΦΑΛΑΙΟ Β'");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("ΜΕΡΟΣ", "ΜΕΡΟΣ"), 0);
        assert_eq!(levenshtein("ΜΕΡΟ", "ΜΕΡΟΣ"), 1);
        assert_eq!(levenshtein("ΚΕΦΑΛΙΟ", "ΚΕΦΑΛΑΙΟ"), 1);
        assert_eq!(levenshtein("", "ΑΒ"), 2);
    }

    #[test]
    fn test_map_carries_state() {
        let mapping = map(&titles(&[
            "ΜΕΡΟΣ Α' Γενικές διατάξεις",
            "Σκοπός",
            "ΚΕΦΑΛΑΙΟ Α' Ορισμοί",
            "Ορισμοί",
            "ΚΕΦΑΛΑΙΟ Β'",
            "ΜΕΡΟΣ Β'",
            "Έναρξη ισχύος",
        ]));
        assert_eq!(
            indices(&mapping),
            vec![
                (Some(1), None),
                (Some(1), None),
                (Some(1), Some(1)),
                (Some(1), Some(1)),
                (Some(1), Some(2)),
                (Some(2), None),
                (Some(2), None),
            ]
        );
        assert!(mapping.anomalies.is_empty());
    }

    #[test]
    fn test_map_allowed_positions() {
        let mapping = map(&titles(&[
            "Άρθρο ΜΕΡΟΣ Β'",
            "Άρθρο 4 ΚΕΦΑΛΑΙΟ Γ'",
            "Ρυθμίσεις του ΚΕΦΑΛΑΙΟ Δ'",
        ]));
        assert_eq!(
            indices(&mapping),
            vec![(Some(2), None), (Some(2), Some(3)), (Some(2), Some(3))]
        );
    }

    #[test]
    fn test_map_fuzzy_keyword_requires_uppercase() {
        let mapping = map(&titles(&["ΚΕΦΑΛΙΟ Α'", "Κεφαλιο Β'"]));
        assert_eq!(indices(&mapping), vec![(None, Some(1)), (None, Some(1))]);
    }

    #[test]
    fn test_map_word_ordinals() {
        let mapping = map(&titles(&["ΜΕΡΟΣ ΠΡΩΤΟ", "ΚΕΦΑΛΑΙΟ ΔΕΚΑΤΟ ΤΡΙΤΟ"]));
        let chapter = mapping.assignments[1].chapter.clone().expect("chapter");
        assert_eq!(chapter.index, 13);
        assert_eq!(chapter.letters, "ΙΓ");
        assert_eq!(mapping.assignments[0].part.as_ref().map(|p| p.index), Some(1));
    }

    #[test]
    fn test_map_reports_jump_and_keeps_declared() {
        let mapping = map(&titles(&["ΜΕΡΟΣ Α'", "ΜΕΡΟΣ Γ'", "ΜΕΡΟΣ Β'"]));
        assert_eq!(
            indices(&mapping),
            vec![(Some(1), None), (Some(3), None), (Some(2), None)]
        );
        let jumps: Vec<(u32, u32)> = mapping
            .anomalies
            .iter()
            .map(|a| (a.previous, a.declared))
            .collect();
        assert_eq!(jumps, vec![(1, 3), (3, 2)]);
    }

    #[test]
    fn test_map_new_part_resets_chapter() {
        let mapping = map(&titles(&["ΜΕΡΟΣ Α' ΚΕΦΑΛΑΙΟ Γ'", "ΜΕΡΟΣ Β'", "ΚΕΦΑΛΑΙΟ Α'"]));
        assert_eq!(
            indices(&mapping),
            vec![(Some(1), Some(3)), (Some(2), None), (Some(2), Some(1))]
        );
        assert!(mapping.anomalies.is_empty());
    }

    #[test]
    fn test_map_unknown_numeral() {
        let mapping = map(&titles(&["ΜΕΡΟΣ ΧΥΖΩ"]));
        assert_eq!(mapping.unknown_numerals.len(), 1);
        assert_eq!(mapping.unknown_numerals[0].token.as_deref(), Some("ΧΥΖΩ"));
        assert_eq!(mapping.assignments[0].part, None);
    }

    #[test]
    fn test_verify_continuity() {
        let mapping = map(&titles(&["ΜΕΡΟΣ Β'", "ΚΕΦΑΛΑΙΟ Β'", "ΚΕΦΑΛΑΙΟ Δ'", "ΜΕΡΟΣ Γ' ΚΕΦΑΛΑΙΟ Α'"]));
        let issues = verify_continuity(&mapping.assignments);
        assert_eq!(
            issues,
            vec![
                ContinuityIssue::FirstPartNotAlpha {
                    id: "1".to_string(),
                    found: "Β".to_string()
                },
                ContinuityIssue::FirstChapterNotAlpha {
                    id: "2".to_string(),
                    part: Some("Β".to_string()),
                    found: "Β".to_string()
                },
                ContinuityIssue::ChapterJump {
                    id: "3".to_string(),
                    previous: 2,
                    found: 4
                },
            ]
        );
    }

    #[test]
    fn test_bill_hierarchy_build() {
        let mapping = map(&titles(&[
            "Προοίμιο",
            "ΜΕΡΟΣ Α'",
            "ΚΕΦΑΛΑΙΟ Α'",
            "Ορισμοί",
            "ΚΕΦΑΛΑΙΟ Β'",
            "ΜΕΡΟΣ Β'",
        ]));
        let tree = BillHierarchy::build(&mapping.assignments);
        assert_eq!(tree.parts.len(), 3);
        assert_eq!(tree.parts[0].numeral, None);
        assert_eq!(tree.parts[0].articles, vec!["1".to_string()]);
        assert_eq!(tree.parts[1].articles, vec!["2".to_string()]);
        assert_eq!(tree.parts[1].chapters.len(), 2);
        assert_eq!(
            tree.parts[1].chapters[0].articles,
            vec!["3".to_string(), "4".to_string()]
        );
        assert_eq!(tree.article_count(), 6);
        assert_eq!(tree.chapter_count(), 2);
    }

    #[test]
    fn test_numeral_label_display() {
        let label = NumeralLabel::from_index(12).expect("label");
        assert_eq!(label.to_string(), "ΙΒ'");
    }
}
