use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::classifier::{Classifier, Label};
use crate::config::OrchestratorConfig;
use crate::error::{PipelineError, Result};
use crate::generation::{ContractValidator, Generator, LlmClient};
use crate::models::{
    Anomaly, AnomalyKind, ChapterSummary, DocumentSummary, FailedPart, PartSummary,
    ProcessingSummary, Stage1Entry, Stage1Outcome,
};
use crate::modifications::modifications_summary;
use crate::source::{ArticleSource, SourceDocument};
use crate::stages::plan::IntroLines;
use crate::stages::prepare::{prepare, PartGroup};
use crate::stages::stage1::summarize_chunk;
use crate::stages::stage2::summarize_chapter;
use crate::stages::stage3::summarize_part;
use crate::stages::StageContext;

/// Result for one document of a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub document_id: String,
    pub result: Result<DocumentSummary>,
}

struct PartOutput {
    chapters: Vec<ChapterSummary>,
    summary: PartSummary,
    anomalies: Vec<Anomaly>,
}

/// Runs the three stages over whole documents.
pub struct Orchestrator<'a, C: LlmClient + ?Sized> {
    client: &'a C,
    config: &'a OrchestratorConfig,
    contracts: ContractValidator,
    classifier: Classifier,
}

fn intro_lines(entries: &[&Stage1Entry]) -> IntroLines {
    let mut intro = IntroLines::default();
    for entry in entries {
        let Stage1Outcome::PassedThrough { text, .. } = &entry.outcome else {
            continue;
        };
        match entry.label {
            Label::IntroScope if intro.scope.is_none() => intro.scope = Some(text.clone()),
            Label::IntroSubject if intro.subject.is_none() => intro.subject = Some(text.clone()),
            _ => {}
        }
    }
    intro
}

fn stage1_anomalies(entries: &[Stage1Entry]) -> Vec<Anomaly> {
    entries
        .iter()
        .filter_map(|entry| match &entry.outcome {
            Stage1Outcome::Summarized { salvaged: true, .. } => Some(Anomaly::new(
                AnomalyKind::Salvage,
                entry.chunk_id.clone(),
                "record recovered from output that failed its contract",
            )),
            Stage1Outcome::Placeholder { violations, .. } => Some(Anomaly::new(
                AnomalyKind::Salvage,
                entry.chunk_id.clone(),
                format!("placeholder stored: {}", violations.join(", ")),
            )),
            _ => None,
        })
        .collect()
}

/// Final document text: every Part with its law changes and summary.
pub fn render_final_text(parts: &[PartSummary]) -> String {
    parts
        .iter()
        .map(|part| {
            let mut block = format!("{}:\n", part.label);
            if !part.modifications.is_empty() {
                block.push_str(&format!("\nΑλλαγές:\n{}\n", part.modifications.join("\n")));
            }
            block.push_str(&format!("\nΠερίληψη:\n{}\n", part.text.trim()));
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl<'a, C: LlmClient + ?Sized> Orchestrator<'a, C> {
    pub fn new(client: &'a C, config: &'a OrchestratorConfig) -> Result<Self> {
        Ok(Self {
            client,
            config,
            contracts: ContractValidator::new()?,
            classifier: Classifier::new(config.unverified_window_words),
        })
    }

    async fn run_part(
        &self,
        ctx: &StageContext<'_, C>,
        document_id: &str,
        part: &PartGroup,
        entries: &[Stage1Entry],
    ) -> Result<PartOutput> {
        let part_entries: Vec<&Stage1Entry> =
            entries.iter().filter(|e| e.part_id == part.id).collect();

        let chapter_results = join_all(part.chapters.iter().map(|chapter| {
            let chapter_entries: Vec<&Stage1Entry> = part_entries
                .iter()
                .copied()
                .filter(|e| e.chapter_id == chapter.id)
                .collect();
            async move {
                summarize_chapter(ctx, document_id, &part.id, chapter, &chapter_entries).await
            }
        }))
        .await;

        let mut chapters = Vec::with_capacity(chapter_results.len());
        for result in chapter_results {
            if let Some(summary) = result? {
                chapters.push(summary);
            }
        }

        let intro = intro_lines(&part_entries);
        let refs: Vec<&ChapterSummary> = chapters.iter().collect();
        let (mut summary, anomalies) =
            summarize_part(ctx, document_id, part, &refs, &intro).await?;
        summary.modifications = modifications_summary(part_entries.iter().copied());

        Ok(PartOutput {
            chapters,
            summary,
            anomalies,
        })
    }

    /// Summarize one document.
    ///
    /// Malformed input and cancellation fail the whole document. Any other
    /// Part failure is recorded in `failed_parts` and the remaining Parts
    /// are still produced.
    #[instrument(skip_all, fields(document = %document.id))]
    pub async fn run_document(
        &self,
        document: &SourceDocument,
        cancel: CancellationToken,
    ) -> Result<DocumentSummary> {
        let prepared = prepare(document, &self.classifier)?;
        info!(
            chunks = prepared.chunks.len(),
            parts = prepared.parts.len(),
            "document prepared"
        );

        let generator = Generator::new(self.client, self.config.retry.clone(), cancel);
        let limiter = Semaphore::new(self.config.max_concurrency);
        let ctx = StageContext {
            generator: &generator,
            contracts: &self.contracts,
            config: self.config,
            limiter: &limiter,
        };

        let stage1 = join_all(
            prepared
                .chunks
                .iter()
                .map(|chunk| summarize_chunk(&ctx, &prepared.document_id, chunk)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let mut processing = ProcessingSummary::default();
        for entry in &stage1 {
            processing.count_stage1(&entry.outcome);
        }
        let mut anomalies = prepared.anomalies.clone();
        anomalies.extend(stage1_anomalies(&stage1));
        info!(
            summarized = processing.summarized,
            passed_through = processing.passed_through,
            skipped = processing.skipped,
            failed = processing.failed,
            "stage 1 complete"
        );

        let part_results = join_all(
            prepared
                .parts
                .iter()
                .map(|part| self.run_part(&ctx, &prepared.document_id, part, &stage1)),
        )
        .await;

        let mut chapters = Vec::new();
        let mut parts = Vec::new();
        let mut failed_parts = Vec::new();
        for (part, result) in prepared.parts.iter().zip(part_results) {
            match result {
                Ok(output) => {
                    processing.count_part(output.summary.strategy);
                    chapters.extend(output.chapters);
                    anomalies.extend(output.anomalies);
                    parts.push(output.summary);
                }
                Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    warn!(part = %part.id, error = %e, "part failed");
                    processing.failed_parts += 1;
                    failed_parts.push(FailedPart {
                        part_id: part.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        processing.usage = generator.usage();

        let final_text = render_final_text(&parts);
        info!(
            parts = parts.len(),
            failed_parts = failed_parts.len(),
            input_tokens = processing.usage.input_tokens,
            output_tokens = processing.usage.output_tokens,
            "document summarized"
        );

        Ok(DocumentSummary {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            document_id: prepared.document_id,
            title: prepared.title,
            stage1,
            chapters,
            parts,
            failed_parts,
            final_text,
            processing,
            anomalies,
        })
    }

    /// Fetch a document from `source` and summarize it.
    pub async fn run_from_source(
        &self,
        source: &dyn ArticleSource,
        document_id: &str,
        cancel: CancellationToken,
    ) -> Result<DocumentSummary> {
        let document = source.fetch_articles(document_id).await?;
        self.run_document(&document, cancel).await
    }

    /// Summarize several documents one after another.
    ///
    /// A failed document does not stop the batch; cancellation does.
    pub async fn run_batch(
        &self,
        source: &dyn ArticleSource,
        document_ids: &[String],
        cancel: CancellationToken,
    ) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(document_ids.len());
        for document_id in document_ids {
            if cancel.is_cancelled() {
                items.push(BatchItem {
                    document_id: document_id.clone(),
                    result: Err(PipelineError::Cancelled),
                });
                continue;
            }
            let result = self
                .run_from_source(source, document_id, cancel.clone())
                .await;
            if let Err(e) = &result {
                error!(document = %document_id, error = %e, "document failed");
            }
            items.push(BatchItem {
                document_id: document_id.clone(),
                result,
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn part(label: &str, text: &str, modifications: Vec<String>) -> PartSummary {
        PartSummary {
            document_id: "doc".to_string(),
            part_id: "meros_0".to_string(),
            label: label.to_string(),
            strategy: crate::models::PartStrategy::FastPath,
            text: text.to_string(),
            plan: None,
            paragraphs: Vec::new(),
            modifications,
        }
    }

    #[test]
    fn test_render_final_text() {
        let text = render_final_text(&[
            part(
                "ΜΕΡΟΣ Α'",
                "Ο σκοπός του μέρους είναι Α.",
                vec!["1 αλλαγή του ν. 1/2020 (1 κατάργηση).".to_string()],
            ),
            part("ΜΕΡΟΣ Β'", "Ο σκοπός του μέρους είναι Β.", vec![]),
        ]);
        assert_eq!(
            text,
            "ΜΕΡΟΣ Α':\n\nΑλλαγές:\n1 αλλαγή του ν. 1/2020 (1 κατάργηση).\n\n\
             Περίληψη:\nΟ σκοπός του μέρους είναι Α.\n\n\
             ΜΕΡΟΣ Β':\n\nΠερίληψη:\nΟ σκοπός του μέρους είναι Β.\n"
        );
    }

    #[test]
    fn test_intro_lines_take_first_of_each() {
        let entry = |label, text: &str| Stage1Entry {
            document_id: "doc".to_string(),
            chunk_id: "1#0".to_string(),
            article_id: "1".to_string(),
            article_title: "Σκοπός".to_string(),
            article_number: Some(1),
            part_id: "meros_0".to_string(),
            chapter_id: "meros_0/kefalaio_0".to_string(),
            label,
            unverified_excerpt: None,
            outcome: Stage1Outcome::PassedThrough {
                reason: crate::models::PassThroughReason::Intro,
                text: text.to_string(),
            },
        };
        let scope = entry(Label::IntroScope, "στήριξη");
        let subject = entry(Label::IntroSubject, "ρυθμίσεις");
        let intro = intro_lines(&[&scope, &subject]);
        assert_eq!(intro.scope.as_deref(), Some("στήριξη"));
        assert_eq!(intro.subject.as_deref(), Some("ρυθμίσεις"));
    }
}
