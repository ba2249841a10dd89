//! Configuration constants shared by the structure-recovery stages.

use std::sync::LazyLock;

use regex::Regex;

/// Opening Guillemet used to start quoted amendment text.
pub const QUOTE_OPEN: char = '«';

/// Closing Guillemet.
pub const QUOTE_CLOSE: char = '»';

/// Emphasis characters tolerated around (but not inside) header tokens.
pub const DECORATION_CHARS: [char; 4] = ['*', '_', '~', '`'];

/// Literal run that splits a decorated digit sequence, e.g. `1****18`.
pub const SPLIT_DIGITS_MARKER: &str = "****";

/// Paragraph marker that turns a header line into a sub-reference.
pub const PARAGRAPH_MARKER: &str = "παρ.";

/// Maximum number of consecutive repeated article numbers tolerated by
/// the sequence integrity check.
pub const MAX_CONSECUTIVE_REPEATS: usize = 5;

/// Words per model token used for rough size estimates in reports.
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Part keyword after normalization.
pub const PART_KEYWORD: &str = "ΜΕΡΟΣ";

/// Chapter keyword after normalization.
pub const CHAPTER_KEYWORD: &str = "ΚΕΦΑΛΑΙΟ";

/// Article keyword after normalization.
pub const ARTICLE_KEYWORD: &str = "ΑΡΘΡΟ";

/// Maximum edit distance accepted for a misspelt Part/Chapter keyword.
pub const KEYWORD_MAX_EDIT_DISTANCE: usize = 1;

/// Article range declared in a bill title, e.g. `(1-45)` or `(1 – 45)`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
pub static TITLE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(\d{1,3})\s*[–\-]\s*(\d{1,3})\s*\)").expect("valid regex")
});
