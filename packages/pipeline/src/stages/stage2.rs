//! Stage 2: fold a chapter's Stage-1 records into one summary.

use tracing::{debug, warn};

use crate::budget::{plan_with, BudgetParams};
use crate::error::{PipelineError, Result};
use crate::generation::contracts::{field_or_raw, string_field};
use crate::generation::prompt::{build_chapter_prompt, build_system_prompt};
use crate::generation::{ContractId, GenerationRequest, LlmClient};
use crate::models::{
    ChapterSummary, PassThroughReason, Stage1Entry, Stage1Outcome, Stage1Record,
};
use crate::stages::prepare::ChapterGroup;
use crate::stages::StageContext;

/// Bullet line for one Stage-1 entry, if it has something to say.
///
/// Intro articles feed the Part introduction instead; skipped, placeholder
/// and failed chunks contribute nothing.
pub fn bullet_line(entry: &Stage1Entry) -> Option<String> {
    match &entry.outcome {
        Stage1Outcome::Summarized {
            record: Stage1Record::LawModification(r),
            ..
        } => Some(format!(
            "• Στο νομοσχέδιο {} το {} του {}. Η σύνοψη της αλλαγής είναι: {}",
            r.change_type,
            r.article_number.trim(),
            r.law_reference.trim(),
            r.major_change_summary.trim()
        )),
        Stage1Outcome::Summarized {
            record: Stage1Record::NewProvision(r),
            ..
        } => Some(format!(
            "• {} ({}): {}",
            r.article_title.trim(),
            r.provision_type,
            r.core_provision_summary.trim()
        )),
        Stage1Outcome::PassedThrough {
            reason: PassThroughReason::Short,
            text,
        } => Some(format!("• {}: {}", entry.article_title.trim(), text)),
        _ => None,
    }
}

/// Bullets of a chapter ordered by article number, one per line.
///
/// Entries without an article number sort first, keeping document order.
pub fn chapter_bullets<'e>(entries: impl IntoIterator<Item = &'e Stage1Entry>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = entries
        .into_iter()
        .filter_map(|e| bullet_line(e).map(|b| (e.article_number.unwrap_or(0), b)))
        .collect();
    numbered.sort_by_key(|(number, _)| *number);
    numbered.into_iter().map(|(_, bullet)| bullet).collect()
}

/// Summarize one chapter; `None` when it has no bullets.
pub async fn summarize_chapter<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    document_id: &str,
    part_id: &str,
    chapter: &ChapterGroup,
    entries: &[&Stage1Entry],
) -> Result<Option<ChapterSummary>> {
    let bullets = chapter_bullets(entries.iter().copied());
    if bullets.is_empty() {
        debug!(chapter = %chapter.id, "chapter has no bullets, skipping");
        return Ok(None);
    }
    let joined = bullets.join("\n");

    let params = BudgetParams::default();
    let budget = plan_with(&joined, ctx.config.chapter_ratio, &params)
        .with_min_words(ctx.config.chapter_min_words, &params);
    let request = GenerationRequest::contract(
        build_system_prompt(),
        build_chapter_prompt(&chapter.label, &joined, &budget),
        ContractId::ChapterSummary,
    );

    let _permit = ctx.permit().await?;
    let result = ctx
        .generator
        .call_with_validation(&request, budget.token_limit, |output| {
            ctx.contracts.check(ContractId::ChapterSummary, output)
        })
        .await;

    let (summary, retries_used, salvaged) = match result {
        Ok(validated) => match string_field(&validated.text, "summary") {
            Some(summary) => (summary, validated.retries_used, false),
            None => {
                warn!(chapter = %chapter.id, "chapter summary has no text, keeping bullets");
                (joined.clone(), validated.retries_used, true)
            }
        },
        Err(PipelineError::Validation(err)) => {
            warn!(
                chapter = %chapter.id,
                violations = ?err.violations,
                "chapter summary failed its contract, salvaging last output"
            );
            let summary =
                field_or_raw(&err.last_output, "summary").unwrap_or_else(|| joined.clone());
            (summary, err.attempts.saturating_sub(1), true)
        }
        Err(e) => return Err(e),
    };

    Ok(Some(ChapterSummary {
        document_id: document_id.to_string(),
        part_id: part_id.to_string(),
        chapter_id: chapter.id.clone(),
        label: chapter.label.clone(),
        summary,
        bullet_count: bullets.len(),
        retries_used,
        salvaged,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use crate::config::OrchestratorConfig;
    use crate::generation::{ContractValidator, Generator, MockLlmClient};
    use crate::models::{
        ChangeType, LawModificationRecord, NewProvisionRecord, ProvisionType,
        EMPTY_ARTICLE_MARKER,
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    fn entry(number: u32, title: &str, outcome: Stage1Outcome) -> Stage1Entry {
        Stage1Entry {
            document_id: "doc".to_string(),
            chunk_id: format!("{number}#0"),
            article_id: number.to_string(),
            article_title: title.to_string(),
            article_number: Some(number),
            part_id: "meros_0".to_string(),
            chapter_id: "meros_0/kefalaio_0".to_string(),
            label: Label::NewProvision,
            unverified_excerpt: None,
            outcome,
        }
    }

    fn provision(number: u32, title: &str) -> Stage1Entry {
        entry(
            number,
            title,
            Stage1Outcome::Summarized {
                record: Stage1Record::NewProvision(NewProvisionRecord {
                    article_title: title.to_string(),
                    provision_type: ProvisionType::Procedure,
                    core_provision_summary: "Ορίζεται η διαδικασία.".to_string(),
                    key_themes: vec!["διαδικασία".to_string()],
                }),
                retries_used: 0,
                salvaged: false,
            },
        )
    }

    fn chapter() -> ChapterGroup {
        ChapterGroup {
            id: "meros_0/kefalaio_0".to_string(),
            label: "ΚΕΦΑΛΑΙΟ Α'".to_string(),
            chunks: vec![],
        }
    }

    #[test]
    fn test_bullet_formats() {
        let modification = entry(
            4,
            "Τροποποίηση",
            Stage1Outcome::Summarized {
                record: Stage1Record::LawModification(LawModificationRecord {
                    law_reference: "ν. 4887/2022".to_string(),
                    article_number: "άρθρο 5".to_string(),
                    change_type: ChangeType::Replaces,
                    major_change_summary: "Αλλάζει η προθεσμία.".to_string(),
                    key_themes: vec!["προθεσμίες".to_string()],
                }),
                retries_used: 0,
                salvaged: false,
            },
        );
        assert_eq!(
            bullet_line(&modification).as_deref(),
            Some(
                "• Στο νομοσχέδιο αντικαθίσταται το άρθρο 5 του ν. 4887/2022. \
                 Η σύνοψη της αλλαγής είναι: Αλλάζει η προθεσμία."
            )
        );
        assert_eq!(
            bullet_line(&provision(2, "Διαδικασία")).as_deref(),
            Some("• Διαδικασία (διαδικασία): Ορίζεται η διαδικασία.")
        );
        let skipped = entry(
            3,
            "Κενό",
            Stage1Outcome::Skipped {
                marker: EMPTY_ARTICLE_MARKER.to_string(),
            },
        );
        assert_eq!(bullet_line(&skipped), None);
    }

    #[test]
    fn test_bullets_sorted_by_article_number() {
        let entries = [provision(9, "Ένατο"), provision(2, "Δεύτερο"), provision(5, "Πέμπτο")];
        let bullets = chapter_bullets(entries.iter());
        assert!(bullets[0].contains("Δεύτερο"));
        assert!(bullets[1].contains("Πέμπτο"));
        assert!(bullets[2].contains("Ένατο"));
    }

    async fn run(client: &MockLlmClient, entries: &[Stage1Entry]) -> Result<Option<ChapterSummary>> {
        let config = OrchestratorConfig::default();
        let contracts = ContractValidator::new().expect("contracts");
        let limiter = Semaphore::new(config.max_concurrency);
        let generator = Generator::new(client, config.retry.clone(), CancellationToken::new());
        let ctx = StageContext {
            generator: &generator,
            contracts: &contracts,
            config: &config,
            limiter: &limiter,
        };
        let refs: Vec<&Stage1Entry> = entries.iter().collect();
        summarize_chapter(&ctx, "doc", "meros_0", &chapter(), &refs).await
    }

    #[tokio::test]
    async fn test_chapter_summary() {
        let client = MockLlmClient::with_response(r#"{"summary": "Το κεφάλαιο ρυθμίζει διαδικασίες."}"#);
        let summary = run(&client, &[provision(1, "Α"), provision(2, "Β")])
            .await
            .expect("summary")
            .expect("some");

        assert_eq!(summary.summary, "Το κεφάλαιο ρυθμίζει διαδικασίες.");
        assert_eq!(summary.bullet_count, 2);
        assert!(!summary.salvaged);
        let request = &client.requests()[0];
        assert_eq!(request.contract, Some(ContractId::ChapterSummary));
        assert!(request.prompt.contains("• Α (διαδικασία)"));
    }

    #[tokio::test]
    async fn test_chapter_without_bullets_is_skipped() {
        let client = MockLlmClient::with_responses(vec![]);
        let skipped = entry(
            1,
            "Κενό",
            Stage1Outcome::Skipped {
                marker: EMPTY_ARTICLE_MARKER.to_string(),
            },
        );
        assert_eq!(run(&client, &[skipped]).await.expect("ok"), None);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_contract_salvages_text() {
        let output = "Περίληψη χωρίς JSON.";
        let client = MockLlmClient::with_responses(vec![output, output, output]);
        let summary = run(&client, &[provision(1, "Α")])
            .await
            .expect("summary")
            .expect("some");
        assert!(summary.salvaged);
        assert_eq!(summary.summary, "Περίληψη χωρίς JSON.");
        assert_eq!(summary.retries_used, 2);
    }

    #[tokio::test]
    async fn test_blank_summary_keeps_bullets() {
        let output = r#"{"summary": " "}"#;
        let client = MockLlmClient::with_responses(vec![output, output, output]);
        let entries = [provision(1, "Α"), provision(2, "Β")];
        let summary = run(&client, &entries)
            .await
            .expect("summary")
            .expect("some");

        let expected = chapter_bullets(entries.iter()).join("\n");
        assert_eq!(summary.summary, expected);
        assert!(summary.salvaged);
        assert_eq!(summary.retries_used, 2);
        assert_eq!(client.request_count(), 3);
    }
}
