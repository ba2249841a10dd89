use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::classifier::Label;

/// Marker stored for chunks with no content.
pub const EMPTY_ARTICLE_MARKER: &str = "[ΚΕΝΟ ΑΡΘΡΟ]";
/// Marker stored for chunks whose generation could not be recovered.
pub const GENERATION_FAILED_MARKER: &str = "[ΣΦΑΛΜΑ ΠΑΡΑΓΩΓΗΣ]";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum ChangeType {
    #[serde(rename = "τροποποιείται")]
    #[strum(serialize = "τροποποιείται")]
    Amends,
    #[serde(rename = "καταργείται")]
    #[strum(serialize = "καταργείται")]
    Repeals,
    #[serde(rename = "αντικαθίσταται")]
    #[strum(serialize = "αντικαθίσταται")]
    Replaces,
    #[serde(rename = "προστίθεται")]
    #[strum(serialize = "προστίθεται")]
    Adds,
    #[serde(rename = "συμπληρώνεται")]
    #[strum(serialize = "συμπληρώνεται")]
    Supplements,
    #[serde(rename = "διαγράφεται")]
    #[strum(serialize = "διαγράφεται")]
    Deletes,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum ProvisionType {
    #[serde(rename = "ορισμός")]
    #[strum(serialize = "ορισμός")]
    Definition,
    #[serde(rename = "σκοπός")]
    #[strum(serialize = "σκοπός")]
    Purpose,
    #[serde(rename = "αρμοδιότητες")]
    #[strum(serialize = "αρμοδιότητες")]
    Powers,
    #[serde(rename = "διαδικασία")]
    #[strum(serialize = "διαδικασία")]
    Procedure,
    #[serde(rename = "οργάνωση")]
    #[strum(serialize = "οργάνωση")]
    Organization,
    #[serde(rename = "ρύθμιση")]
    #[strum(serialize = "ρύθμιση")]
    Regulation,
    #[serde(rename = "διάρθρωση")]
    #[strum(serialize = "διάρθρωση")]
    Structure,
}

/// Stage-1 record for a chunk that amends an existing law.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawModificationRecord {
    pub law_reference: String,
    pub article_number: String,
    pub change_type: ChangeType,
    pub major_change_summary: String,
    pub key_themes: Vec<String>,
}

/// Stage-1 record for a chunk that introduces new rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProvisionRecord {
    pub article_title: String,
    pub provision_type: ProvisionType,
    pub core_provision_summary: String,
    pub key_themes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage1Record {
    LawModification(LawModificationRecord),
    NewProvision(NewProvisionRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassThroughReason {
    /// Scope or subject article, kept for the Part introduction.
    Intro,
    /// Too short to be worth summarizing.
    Short,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage1Outcome {
    Summarized {
        record: Stage1Record,
        retries_used: u32,
        /// Recovered from output that failed its contract.
        salvaged: bool,
    },
    PassedThrough {
        reason: PassThroughReason,
        text: String,
    },
    Skipped {
        marker: String,
    },
    /// Contract exhausted and the last output could not be salvaged.
    Placeholder {
        marker: String,
        violations: Vec<String>,
    },
    /// The generation service itself failed.
    Failed {
        marker: String,
        error: String,
    },
}

/// Stage-1 result for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Entry {
    pub document_id: String,
    pub chunk_id: String,
    pub article_id: String,
    pub article_title: String,
    pub article_number: Option<u32>,
    pub part_id: String,
    pub chapter_id: String,
    pub label: Label,
    /// Leading words of an unverified citation chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unverified_excerpt: Option<String>,
    pub outcome: Stage1Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub document_id: String,
    pub part_id: String,
    pub chapter_id: String,
    pub label: String,
    pub summary: String,
    pub bullet_count: usize,
    pub retries_used: u32,
    pub salvaged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartStrategy {
    /// A single chapter summarized directly.
    FastPath,
    /// Narrative plan followed by one paragraph per beat.
    Plan,
    /// Single-shot summary over all chapters after the plan failed.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub section_title: String,
    pub section_role: String,
    pub source_chapters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativePlan {
    pub overall_narrative_arc: String,
    pub protagonist: String,
    pub problem: String,
    pub narrative_sections: Vec<NarrativeSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSummary {
    pub document_id: String,
    pub part_id: String,
    pub label: String,
    pub strategy: PartStrategy,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<NarrativePlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<String>,
    /// One line per amended law, most-amended first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifications: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPart {
    pub part_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyKind {
    Continuity,
    UnknownNumeral,
    NumberingGap,
    UnresolvedArticle,
    Salvage,
    PlanFallback,
}

/// Something noteworthy that did not stop processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Article, chunk, chapter or part the anomaly belongs to.
    pub id: String,
    pub detail: String,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            detail: detail.into(),
        }
    }
}

/// Token usage tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Per-document counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub chunks_total: usize,
    pub summarized: usize,
    pub passed_through: usize,
    pub skipped: usize,
    pub placeholders: usize,
    pub failed: usize,
    pub salvaged: usize,
    pub fast_path_parts: usize,
    pub planned_parts: usize,
    pub legacy_parts: usize,
    pub failed_parts: usize,
    pub usage: TokenUsage,
}

impl ProcessingSummary {
    pub fn count_stage1(&mut self, outcome: &Stage1Outcome) {
        self.chunks_total += 1;
        match outcome {
            Stage1Outcome::Summarized { salvaged, .. } => {
                self.summarized += 1;
                if *salvaged {
                    self.salvaged += 1;
                }
            }
            Stage1Outcome::PassedThrough { .. } => self.passed_through += 1,
            Stage1Outcome::Skipped { .. } => self.skipped += 1,
            Stage1Outcome::Placeholder { .. } => self.placeholders += 1,
            Stage1Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn count_part(&mut self, strategy: PartStrategy) {
        match strategy {
            PartStrategy::FastPath => self.fast_path_parts += 1,
            PartStrategy::Plan => self.planned_parts += 1,
            PartStrategy::Legacy => self.legacy_parts += 1,
        }
    }
}

/// Everything produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub document_id: String,
    pub title: String,
    pub stage1: Vec<Stage1Entry>,
    pub chapters: Vec<ChapterSummary>,
    pub parts: Vec<PartSummary>,
    pub failed_parts: Vec<FailedPart>,
    pub final_text: String,
    pub processing: ProcessingSummary,
    pub anomalies: Vec<Anomaly>,
}
