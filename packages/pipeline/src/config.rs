use crate::classifier::UNVERIFIED_WINDOW_WORDS;
use crate::generation::retry::RetryPolicy;

/// Tuning for one summarization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Generation calls in flight at once.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// New-provision chunks shorter than this keep their own text.
    pub min_words_for_summary: usize,
    pub stage1_ratio: f64,
    pub chapter_ratio: f64,
    pub chapter_min_words: usize,
    pub part_ratio: f64,
    pub planning_share: f64,
    pub planning_floor_tokens: u32,
    pub beat_floor_tokens: u32,
    pub single_chapter_tokens: u32,
    pub unverified_window_words: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry: RetryPolicy::default(),
            min_words_for_summary: 80,
            stage1_ratio: 0.3,
            chapter_ratio: 0.5,
            chapter_min_words: 30,
            part_ratio: 0.6,
            planning_share: 0.3,
            planning_floor_tokens: 800,
            beat_floor_tokens: 600,
            single_chapter_tokens: 600,
            unverified_window_words: UNVERIFIED_WINDOW_WORDS,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl OrchestratorConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_retries: env_or("SUMMARIZER_MAX_RETRIES", defaults.retry.max_retries),
            plain_max_retries: env_or(
                "SUMMARIZER_PLAIN_MAX_RETRIES",
                defaults.retry.plain_max_retries,
            ),
            ..defaults.retry.clone()
        };

        Self {
            max_concurrency: env_or("SUMMARIZER_MAX_CONCURRENCY", defaults.max_concurrency).max(1),
            retry,
            min_words_for_summary: env_or("SUMMARIZER_MIN_WORDS", defaults.min_words_for_summary),
            stage1_ratio: env_or("SUMMARIZER_STAGE1_RATIO", defaults.stage1_ratio),
            unverified_window_words: env_or(
                "SUMMARIZER_UNVERIFIED_WINDOW_WORDS",
                defaults.unverified_window_words,
            ),
            ..defaults
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_plain_max_retries(mut self, plain_max_retries: u32) -> Self {
        self.retry.plain_max_retries = plain_max_retries;
        self
    }

    #[must_use]
    pub fn with_min_words_for_summary(mut self, words: usize) -> Self {
        self.min_words_for_summary = words;
        self
    }

    #[must_use]
    pub fn with_unverified_window_words(mut self, words: usize) -> Self {
        self.unverified_window_words = words;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::retry::{INITIAL_TEMPERATURE, RETRY_TEMPERATURE};

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.plain_max_retries, 2);
        assert_eq!(config.min_words_for_summary, 80);
        assert_eq!(config.unverified_window_words, 900);
        assert_eq!(config.retry.initial.temperature, INITIAL_TEMPERATURE);
        assert_eq!(config.retry.retry.temperature, RETRY_TEMPERATURE);
    }

    #[test]
    fn test_builders() {
        let config = OrchestratorConfig::default()
            .with_max_concurrency(0)
            .with_max_retries(5)
            .with_plain_max_retries(1)
            .with_min_words_for_summary(10)
            .with_unverified_window_words(300);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.plain_max_retries, 1);
        assert_eq!(config.min_words_for_summary, 10);
        assert_eq!(config.unverified_window_words, 300);
    }
}
