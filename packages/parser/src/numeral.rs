//! Greek numerals.
//!
//! Two notations appear in the corpus: the alphabetic system used for Part
//! and Chapter labels (`Α'`, `ΙΒ'`, `ΡΚΓ'`) and spelled-out neuter ordinal
//! words used in article headers (`Άρθρο δέκατο τρίτο`). All lookup tables
//! are built once and shared read-only.

use std::collections::HashMap;
use std::sync::LazyLock;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Largest value expressible with the alphabetic tables.
pub const MAX_ALPHABETIC: u32 = 999;

const UNITS: [&str; 9] = ["Α", "Β", "Γ", "Δ", "Ε", "ΣΤ", "Ζ", "Η", "Θ"];
const TENS: [&str; 9] = ["Ι", "Κ", "Λ", "Μ", "Ν", "Ξ", "Ο", "Π", "Ϟ"];
const HUNDREDS: [&str; 9] = ["Ρ", "Σ", "Τ", "Υ", "Φ", "Χ", "Ψ", "Ω", "Ϡ"];

/// Trailing marks that may follow an alphabetic numeral (`Α'`, `Β΄`, `Γʹ`).
const NUMERAL_MARKS: [char; 7] = ['\'', '’', '‘', '΄', 'ʹ', '.', '·'];

const ORDINAL_UNITS: [&str; 9] = [
    "πρώτο", "δεύτερο", "τρίτο", "τέταρτο", "πέμπτο", "έκτο", "έβδομο", "όγδοο", "ένατο",
];

const ORDINAL_TENS: [&str; 9] = [
    "δέκατο",
    "εικοστό",
    "τριακοστό",
    "τεσσαρακοστό",
    "πεντηκοστό",
    "εξηκοστό",
    "εβδομηκοστό",
    "ογδοηκοστό",
    "ενενηκοστό",
];

const ORDINAL_HUNDREDS: [&str; 9] = [
    "εκατοστό",
    "διακοσιοστό",
    "τριακοσιοστό",
    "τετρακοσιοστό",
    "πεντακοσιοστό",
    "εξακοσιοστό",
    "επτακοσιοστό",
    "οκτακοσιοστό",
    "εννιακοσιοστό",
];

static GREEK_TO_INT: LazyLock<HashMap<String, u32>> = LazyLock::new(|| {
    (1..=MAX_ALPHABETIC)
        .filter_map(|n| int_to_greek(n).map(|label| (label, n)))
        .collect()
});

static ORDINALS: LazyLock<HashMap<String, u32>> = LazyLock::new(build_ordinals);

static NORMALIZED_ORDINALS: LazyLock<HashMap<String, u32>> = LazyLock::new(|| {
    ORDINALS
        .iter()
        .map(|(word, n)| (strip_accents_upper(word), *n))
        .collect()
});

/// Ordinal words sorted longest first, so `δέκατο τρίτο` wins over `δέκατο`.
static ORDINALS_LONGEST_FIRST: LazyLock<Vec<(&'static str, u32)>> = LazyLock::new(|| {
    let mut words: Vec<(&'static str, u32)> = ORDINALS
        .iter()
        .map(|(word, n)| (word.as_str(), *n))
        .collect();
    words.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.1.cmp(&b.1)));
    words
});

fn below_hundred(n: u32) -> Option<String> {
    match n {
        1..=9 => Some(ORDINAL_UNITS[(n - 1) as usize].to_string()),
        11 => Some("ενδέκατο".to_string()),
        12 => Some("δωδέκατο".to_string()),
        10..=99 => {
            let tens = ORDINAL_TENS[(n / 10 - 1) as usize];
            match n % 10 {
                0 => Some(tens.to_string()),
                unit => Some(format!("{tens} {}", ORDINAL_UNITS[(unit - 1) as usize])),
            }
        }
        _ => None,
    }
}

fn build_ordinals() -> HashMap<String, u32> {
    let mut table = HashMap::new();
    for n in 1..=99 {
        if let Some(word) = below_hundred(n) {
            table.insert(word, n);
        }
    }
    for (i, hundreds) in ORDINAL_HUNDREDS.iter().enumerate() {
        let base = (i as u32 + 1) * 100;
        table.insert((*hundreds).to_string(), base);
        for n in 1..=99 {
            if let Some(rest) = below_hundred(n) {
                table.insert(format!("{hundreds} {rest}"), base + n);
            }
        }
    }
    table.insert("χιλιοστό".to_string(), 1000);
    table
}

/// Convert an integer to its alphabetic Greek numeral.
///
/// Returns `None` outside `1..=999`.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::numeral::int_to_greek;
///
/// assert_eq!(int_to_greek(6).as_deref(), Some("ΣΤ"));
/// assert_eq!(int_to_greek(124).as_deref(), Some("ΡΚΔ"));
/// assert_eq!(int_to_greek(0), None);
/// ```
pub fn int_to_greek(n: u32) -> Option<String> {
    if n == 0 || n > MAX_ALPHABETIC {
        return None;
    }
    let mut out = String::new();
    let (hundreds, tens, units) = (n / 100, (n % 100) / 10, n % 10);
    if hundreds > 0 {
        out.push_str(HUNDREDS[(hundreds - 1) as usize]);
    }
    if tens > 0 {
        out.push_str(TENS[(tens - 1) as usize]);
    }
    if units > 0 {
        out.push_str(UNITS[(units - 1) as usize]);
    }
    Some(out)
}

/// Parse an alphabetic Greek numeral.
///
/// Accents, case and trailing numeral marks are ignored; the archaic
/// stigma and koppa forms are accepted. Unknown strings yield `None`.
///
/// # Examples
///
/// ```
/// use nomothesia_parser::numeral::greek_to_int;
///
/// assert_eq!(greek_to_int("Β'"), Some(2));
/// assert_eq!(greek_to_int("ιβ΄"), Some(12));
/// assert_eq!(greek_to_int("ΑΒΓ"), None);
/// ```
pub fn greek_to_int(label: &str) -> Option<u32> {
    let cleaned = strip_accents_upper(label.trim().trim_end_matches(NUMERAL_MARKS).trim());
    if cleaned.is_empty() {
        return None;
    }
    let cleaned = cleaned.replace('Ϛ', "ΣΤ");
    GREEK_TO_INT.get(&cleaned).copied()
}

/// Look up a lowercase, accented ordinal word (`πρώτο`, `δέκατο τρίτο`).
///
/// The lookup is case-sensitive: `ΠΡΩΤΟ` is not an ordinal here.
pub fn ordinal_word_to_int(word: &str) -> Option<u32> {
    ORDINALS.get(word).copied()
}

/// Look up an ordinal word after accent stripping and upper-casing.
pub fn normalized_ordinal_to_int(word: &str) -> Option<u32> {
    NORMALIZED_ORDINALS.get(&strip_accents_upper(word)).copied()
}

/// Match the longest ordinal word at the start of `text`.
///
/// The word must be followed by a non-letter (or end of input). Returns the
/// value and the byte length consumed.
pub fn match_ordinal_prefix(text: &str) -> Option<(u32, usize)> {
    let first = text.chars().next()?;
    if !first.is_lowercase() {
        return None;
    }
    ORDINALS_LONGEST_FIRST
        .iter()
        .find(|(word, _)| {
            text.starts_with(word)
                && !text[word.len()..]
                    .chars()
                    .next()
                    .is_some_and(char::is_alphabetic)
        })
        .map(|(word, n)| (*n, word.len()))
}

/// Decompose, drop combining marks and upper-case.
pub fn strip_accents_upper(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}

/// Ordering key for Part/Chapter labels; unknown labels sort first.
pub fn numeral_sort_key(label: &str) -> (u32, String) {
    (greek_to_int(label).unwrap_or(0), label.to_string())
}
