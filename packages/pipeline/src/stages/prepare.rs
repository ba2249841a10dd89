//! Structure recovery for one document before any generation.

use std::collections::{HashMap, HashSet};

use nomothesia_parser::config::MAX_CONSECUTIVE_REPEATS;
use nomothesia_parser::grammar::match_line;
use nomothesia_parser::hierarchy::{verify_continuity, ContinuityIssue, PartNode};
use nomothesia_parser::sequence::check_sequence_integrity;
use nomothesia_parser::{chunk_document, map, BillHierarchy, TitleLine};
use tracing::{debug, warn};

use crate::classifier::{Classification, Classifier};
use crate::error::{PipelineError, Result};
use crate::models::{Anomaly, AnomalyKind};
use crate::source::{SourceArticle, SourceDocument};

/// A chunk with its place in the hierarchy and its label.
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    pub chunk_id: String,
    pub article_id: String,
    pub article_title: String,
    pub article_number: Option<u32>,
    pub part_id: String,
    pub chapter_id: String,
    /// Chunk text including its header line.
    pub text: String,
    /// Chunk text without its header line.
    pub body: String,
    pub classification: Classification,
}

impl PreparedChunk {
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ChapterGroup {
    pub id: String,
    pub label: String,
    /// Indices into [`PreparedDocument::chunks`].
    pub chunks: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct PartGroup {
    pub id: String,
    pub label: String,
    pub chapters: Vec<ChapterGroup>,
}

#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document_id: String,
    pub title: String,
    pub chunks: Vec<PreparedChunk>,
    pub parts: Vec<PartGroup>,
    pub anomalies: Vec<Anomaly>,
}

fn part_label(part: &PartNode) -> String {
    match &part.numeral {
        Some(numeral) => format!("ΜΕΡΟΣ {numeral}"),
        None => "ΓΕΝΙΚΕΣ ΔΙΑΤΑΞΕΙΣ".to_string(),
    }
}

fn article_number(article: &SourceArticle) -> Option<u32> {
    match_line(&article.title)
        .map(|m| m.number)
        .or_else(|| article.id.trim().parse().ok())
}

/// Chunks of one article. An article with no content still yields one
/// (empty) chunk so it is accounted for.
fn article_chunks(
    article: &SourceArticle,
    part_id: &str,
    chapter_id: &str,
    classifier: &Classifier,
) -> Vec<PreparedChunk> {
    let fallback_number = article_number(article);
    let mut chunks: Vec<PreparedChunk> = chunk_document(&article.content)
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|c| {
            let number = c.article_number.or(fallback_number);
            PreparedChunk {
                chunk_id: format!("{}#{}", article.id, c.index),
                article_id: article.id.clone(),
                article_title: article.title.clone(),
                article_number: number,
                part_id: part_id.to_string(),
                chapter_id: chapter_id.to_string(),
                classification: classifier.classify_text(&c.content_text, number),
                body: c.body().to_string(),
                text: c.content_text,
            }
        })
        .collect();

    if chunks.is_empty() {
        chunks.push(PreparedChunk {
            chunk_id: format!("{}#0", article.id),
            article_id: article.id.clone(),
            article_title: article.title.clone(),
            article_number: fallback_number,
            part_id: part_id.to_string(),
            chapter_id: chapter_id.to_string(),
            text: String::new(),
            body: String::new(),
            classification: classifier.classify_text("", fallback_number),
        });
    }
    chunks
}

fn mapping_anomalies(document: &SourceDocument) -> (BillHierarchy, Vec<Anomaly>) {
    let titles: Vec<TitleLine> = document
        .articles
        .iter()
        .map(|a| TitleLine::new(a.id.clone(), a.title.clone()))
        .collect();
    let mapping = map(&titles);

    let mut anomalies: Vec<Anomaly> = verify_continuity(&mapping.assignments)
        .into_iter()
        .map(|issue| {
            let id = match &issue {
                ContinuityIssue::FirstPartNotAlpha { id, .. }
                | ContinuityIssue::PartJump { id, .. }
                | ContinuityIssue::FirstChapterNotAlpha { id, .. }
                | ContinuityIssue::ChapterJump { id, .. } => id.clone(),
            };
            Anomaly::new(AnomalyKind::Continuity, id, issue.to_string())
        })
        .collect();
    // Mapper jumps are normally also continuity issues; keep the rest.
    for jump in &mapping.anomalies {
        if !anomalies.iter().any(|a| a.id == jump.id) {
            anomalies.push(Anomaly::new(
                AnomalyKind::Continuity,
                jump.id.clone(),
                format!(
                    "{} numbering jumps from {} to {}",
                    jump.level, jump.previous, jump.declared
                ),
            ));
        }
    }
    anomalies.extend(mapping.unknown_numerals.iter().map(|u| {
        Anomaly::new(
            AnomalyKind::UnknownNumeral,
            u.id.clone(),
            format!(
                "unknown {} numeral {}",
                u.level,
                u.token.as_deref().unwrap_or("(missing)")
            ),
        )
    }));

    (BillHierarchy::build(&mapping.assignments), anomalies)
}

/// Chunk, map and classify a document.
///
/// Fails only for input that cannot be processed at all; numbering
/// problems are recorded as anomalies.
pub fn prepare(document: &SourceDocument, classifier: &Classifier) -> Result<PreparedDocument> {
    if document.articles.is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "document '{}' has no articles",
            document.id
        )));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = document.articles.iter().find(|a| !seen.insert(a.id.as_str())) {
        return Err(PipelineError::InvalidInput(format!(
            "document '{}' repeats article id '{}'",
            document.id, duplicate.id
        )));
    }

    let (tree, mut anomalies) = mapping_anomalies(document);
    let articles: HashMap<&str, &SourceArticle> =
        document.articles.iter().map(|a| (a.id.as_str(), a)).collect();

    let mut chunks = Vec::new();
    let mut parts = Vec::with_capacity(tree.parts.len());

    for (p, part) in tree.parts.iter().enumerate() {
        let part_id = format!("meros_{p}");
        let mut containers: Vec<(String, &[String])> = Vec::new();
        if !part.articles.is_empty() {
            containers.push(("ΧΩΡΙΣ ΚΕΦΑΛΑΙΟ".to_string(), part.articles.as_slice()));
        }
        containers.extend(
            part.chapters
                .iter()
                .map(|c| (format!("ΚΕΦΑΛΑΙΟ {}", c.numeral), c.articles.as_slice())),
        );

        let mut chapters = Vec::with_capacity(containers.len());
        for (c, (label, article_ids)) in containers.into_iter().enumerate() {
            let chapter_id = format!("{part_id}/kefalaio_{c}");
            let mut indices = Vec::new();
            for article_id in article_ids {
                let Some(article) = articles.get(article_id.as_str()) else {
                    continue;
                };
                for chunk in article_chunks(article, &part_id, &chapter_id, classifier) {
                    indices.push(chunks.len());
                    chunks.push(chunk);
                }
            }
            chapters.push(ChapterGroup {
                id: chapter_id,
                label,
                chunks: indices,
            });
        }
        parts.push(PartGroup {
            id: part_id,
            label: part_label(part),
            chapters,
        });
    }

    let mut unresolved = HashSet::new();
    for chunk in chunks.iter().filter(|c| c.article_number.is_none()) {
        if unresolved.insert(chunk.article_id.as_str()) {
            anomalies.push(Anomaly::new(
                AnomalyKind::UnresolvedArticle,
                chunk.article_id.clone(),
                "article number not found in title, header or id",
            ));
        }
    }

    let numbered: Vec<(u32, &str)> = chunks
        .iter()
        .filter_map(|c| c.article_number.map(|n| (n, c.chunk_id.as_str())))
        .collect();
    let numbers: Vec<u32> = numbered.iter().map(|(n, _)| *n).collect();
    for gap in check_sequence_integrity(&numbers, MAX_CONSECUTIVE_REPEATS) {
        let id = numbered
            .get(gap.position)
            .map(|(_, id)| id.to_string())
            .unwrap_or_default();
        anomalies.push(Anomaly::new(
            AnomalyKind::NumberingGap,
            id,
            format!("article {} follows {}", gap.next, gap.previous),
        ));
    }

    if !anomalies.is_empty() {
        warn!(
            document = %document.id,
            anomalies = anomalies.len(),
            "structure anomalies recorded"
        );
    }
    debug!(
        document = %document.id,
        parts = parts.len(),
        chunks = chunks.len(),
        "document prepared"
    );

    Ok(PreparedDocument {
        document_id: document.id.clone(),
        title: document.title.clone(),
        chunks,
        parts,
        anomalies,
    })
}
