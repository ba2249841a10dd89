//! Dry-run views of a recovered hierarchy.
//!
//! Used to eyeball structure and size before any generation is attempted.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::config::WORDS_PER_TOKEN;
use crate::hierarchy::{BillHierarchy, ChapterNode, PartNode};

/// Rough size of a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LengthStats {
    pub words: usize,
    pub approx_tokens: usize,
}

impl LengthStats {
    pub fn of(text: &str) -> Self {
        let words = text.split_whitespace().count();
        Self {
            words,
            approx_tokens: (words as f64 / WORDS_PER_TOKEN).ceil() as usize,
        }
    }
}

/// Inputs for rendering.
pub struct DryRun<'a> {
    pub hierarchy: &'a BillHierarchy,
    /// Article id to article text size.
    pub stats: &'a HashMap<String, LengthStats>,
    /// Pre-rendered problems listed ahead of the tree.
    pub issues: &'a [String],
}

fn part_heading(part: &PartNode) -> String {
    part.numeral
        .as_ref()
        .map_or_else(|| "(χωρίς μέρος)".to_string(), ToString::to_string)
}

impl DryRun<'_> {
    fn article_stats(&self, id: &str) -> LengthStats {
        self.stats.get(id).copied().unwrap_or_default()
    }

    /// Markdown view with one bullet per article.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Dry-Run Hierarchy View\n\n");
        if !self.issues.is_empty() {
            out.push_str("## Continuity issues\n\n");
            for issue in self.issues {
                let _ = writeln!(out, "- {issue}");
            }
            out.push('\n');
        }
        for part in &self.hierarchy.parts {
            let _ = writeln!(out, "## Μέρος {}\n", part_heading(part));
            self.markdown_articles(&mut out, &part.articles);
            for chapter in &part.chapters {
                let _ = writeln!(out, "### Κεφάλαιο {}\n", chapter.numeral);
                self.markdown_articles(&mut out, &chapter.articles);
            }
        }
        out
    }

    fn markdown_articles(&self, out: &mut String, articles: &[String]) {
        if articles.is_empty() {
            return;
        }
        for id in articles {
            let stats = self.article_stats(id);
            let _ = writeln!(
                out,
                "* **Άρθρο {id}** – {} words / ~{} tokens",
                stats.words, stats.approx_tokens
            );
        }
        out.push('\n');
    }

    /// Indented plain-text view.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if !self.issues.is_empty() {
            out.push_str("CONTINUITY ISSUES\n");
            for issue in self.issues {
                let _ = writeln!(out, "  ! {issue}");
            }
            out.push('\n');
        }
        for part in &self.hierarchy.parts {
            let _ = writeln!(out, "ΜΕΡΟΣ {}", part_heading(part));
            self.text_articles(&mut out, &part.articles, 1);
            for ChapterNode { numeral, articles } in &part.chapters {
                let _ = writeln!(out, "  ΚΕΦΑΛΑΙΟ {numeral}");
                self.text_articles(&mut out, articles, 2);
            }
        }
        out
    }

    fn text_articles(&self, out: &mut String, articles: &[String], depth: usize) {
        let indent = "  ".repeat(depth);
        for id in articles {
            let stats = self.article_stats(id);
            let _ = writeln!(out, "{indent}ΑΡΘΡΟ {id} ({} λέξεις)", stats.words);
        }
    }
}
