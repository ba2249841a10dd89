//! Output length targets derived from input length.

use serde::Serialize;

pub const DEFAULT_AVG_WORDS_PER_SENTENCE: f64 = 20.0;
pub const DEFAULT_TOKENS_PER_WORD: f64 = 2.5;
/// Headroom over the word target so output is not cut mid-sentence.
pub const DEFAULT_OVERSHOOT: f64 = 1.10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetParams {
    pub avg_words_per_sentence: f64,
    pub tokens_per_word: f64,
    pub overshoot: f64,
    /// Width of the accepted word band around the target, as a fraction.
    pub variance: Option<f64>,
}

impl Default for BudgetParams {
    fn default() -> Self {
        Self {
            avg_words_per_sentence: DEFAULT_AVG_WORDS_PER_SENTENCE,
            tokens_per_word: DEFAULT_TOKENS_PER_WORD,
            overshoot: DEFAULT_OVERSHOOT,
            variance: None,
        }
    }
}

impl BudgetParams {
    #[must_use]
    pub fn with_variance(mut self, variance: f64) -> Self {
        self.variance = Some(variance);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WordBand {
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Budget {
    pub target_words: usize,
    pub target_sentences: usize,
    pub token_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<WordBand>,
}

impl Budget {
    /// The same budget with at least `min_words` target words.
    #[must_use]
    pub fn with_min_words(self, min_words: usize, params: &BudgetParams) -> Self {
        if self.target_words >= min_words {
            return self;
        }
        from_target(min_words, params)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Budget for compressing `text` by `ratio` with default parameters.
pub fn plan(text: &str, ratio: f64) -> Budget {
    plan_with(text, ratio, &BudgetParams::default())
}

pub fn plan_with(text: &str, ratio: f64, params: &BudgetParams) -> Budget {
    let target_words = (stable_floor(word_count(text) as f64 * ratio) as usize).max(1);
    from_target(target_words, params)
}

// 40 * 2.5 * 1.10 is 110.00000000000001 in f64; round away that noise
// before taking the ceiling.
fn stable_ceil(x: f64) -> f64 {
    ((x * 1e6).round() / 1e6).ceil()
}

fn stable_floor(x: f64) -> f64 {
    ((x * 1e6).round() / 1e6).floor()
}

fn from_target(target_words: usize, params: &BudgetParams) -> Budget {
    let target_sentences =
        ((target_words as f64 / params.avg_words_per_sentence).round() as usize).max(1);
    let token_limit =
        stable_ceil(target_words as f64 * params.tokens_per_word * params.overshoot) as u32;
    let band = params.variance.map(|v| WordBand {
        min: (stable_floor(target_words as f64 * (1.0 - v)) as usize).max(1),
        max: stable_ceil(target_words as f64 * (1.0 + v)) as usize,
    });
    Budget {
        target_words,
        target_sentences,
        token_limit,
        band,
    }
}

/// Length figures for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthMetrics {
    pub words: usize,
    pub approx_tokens: usize,
    pub sentences: usize,
}

pub fn length_metrics(text: &str) -> LengthMetrics {
    let words = word_count(text);
    let sentences = text
        .split(['.', '!', ';', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    LengthMetrics {
        words,
        approx_tokens: stable_ceil(words as f64 * DEFAULT_TOKENS_PER_WORD) as usize,
        sentences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(n: usize) -> String {
        vec!["λέξη"; n].join(" ")
    }

    #[test]
    fn test_plan_400_words_at_ten_percent() {
        let budget = plan(&words(400), 0.10);
        assert_eq!(
            budget,
            Budget {
                target_words: 40,
                target_sentences: 2,
                token_limit: 110,
                band: None,
            }
        );
    }

    #[test]
    fn test_minimums_apply_to_tiny_input() {
        let budget = plan("μία", 0.1);
        assert_eq!(budget.target_words, 1);
        assert_eq!(budget.target_sentences, 1);
        assert_eq!(budget.token_limit, 3);

        let empty = plan("", 0.5);
        assert_eq!(empty.target_words, 1);
    }

    #[test]
    fn test_variance_band() {
        let params = BudgetParams::default().with_variance(0.2);
        let budget = plan_with(&words(100), 0.5, &params);
        assert_eq!(budget.target_words, 50);
        assert_eq!(budget.band, Some(WordBand { min: 40, max: 60 }));
    }

    #[test]
    fn test_with_min_words() {
        let params = BudgetParams::default();
        let budget = plan(&words(20), 0.5).with_min_words(30, &params);
        assert_eq!(budget.target_words, 30);
        assert_eq!(budget.token_limit, 83);

        let untouched = plan(&words(200), 0.5).with_min_words(30, &params);
        assert_eq!(untouched.target_words, 100);
    }

    #[test]
    fn test_length_metrics() {
        let metrics = length_metrics("Πρώτη πρόταση. Δεύτερη πρόταση; Τρίτη");
        assert_eq!(metrics.words, 5);
        assert_eq!(metrics.sentences, 3);
        assert_eq!(metrics.approx_tokens, 13);
    }
}
