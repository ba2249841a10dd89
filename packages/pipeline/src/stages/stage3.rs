//! Stage 3: citizen-facing prose for one Part.
//!
//! A Part with one chapter is summarized directly. Otherwise a narrative
//! plan is requested and each beat becomes one paragraph; when no usable
//! plan comes back the Part falls back to a single-shot summary over all
//! of its chapters.

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::budget::{plan as plan_budget, DEFAULT_TOKENS_PER_WORD};
use crate::error::{PipelineError, Result};
use crate::generation::contracts::{field_or_raw, string_field};
use crate::generation::json_extract::clean_raw_text;
use crate::generation::prompt::{
    build_legacy_part_prompt, build_legacy_part_prose_prompt, build_paragraph_prompt,
    build_plan_prompt, build_planner_system_prompt, build_single_chapter_prompt,
    build_system_prompt,
};
use crate::generation::{ContractId, GenerationRequest, LlmClient};
use crate::models::{Anomaly, AnomalyKind, ChapterSummary, NarrativePlan, PartStrategy, PartSummary};
use crate::stages::plan::{
    beat_bounds, beat_input, drop_unknown_references, plan_input, plan_violations, IntroLines,
    KeyedChapters,
};
use crate::stages::prepare::PartGroup;
use crate::stages::StageContext;

/// Opening every Part summary starts with.
pub const FRAMING_PHRASE: &str = "Ο σκοπός του μέρους είναι";

/// Used when nothing else could be produced for a Part.
pub const DEFAULT_PART_SENTENCE: &str =
    "Ο σκοπός του μέρους είναι να ρυθμίσει τα ζητήματα που σχετίζονται με την εφαρμογή του.";

/// Token split between planning and paragraph synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartBudget {
    pub total: u32,
    pub planning: u32,
    pub synthesis: u32,
}

impl PartBudget {
    /// Split `total` tokens, keeping at least `planning_floor` for the plan.
    ///
    /// When the planning share would exceed half the total, the total is
    /// raised to twice the planning share.
    pub fn split(total: u32, share: f64, planning_floor: u32) -> Self {
        let planning = ((total as f64 * share) as u32).max(planning_floor);
        let total = if planning as f64 > total as f64 * 0.5 {
            planning * 2
        } else {
            total
        };
        Self {
            total,
            planning,
            synthesis: total - planning,
        }
    }

    /// Tokens per beat, never below `beat_floor`.
    pub fn per_beat(&self, beats: usize, beat_floor: u32) -> u32 {
        if beats == 0 {
            return beat_floor;
        }
        (self.synthesis / beats as u32).max(beat_floor)
    }
}

/// Make sure the text opens with [`FRAMING_PHRASE`].
///
/// The phrase is spliced in front with the first letter lower-cased.
pub fn ensure_framing(paragraph: &str) -> String {
    let paragraph = paragraph.trim();
    if paragraph.starts_with(FRAMING_PHRASE) {
        return paragraph.to_string();
    }
    let mut chars = paragraph.chars();
    let Some(first) = chars.next() else {
        return DEFAULT_PART_SENTENCE.to_string();
    };
    let lowered: String = first.to_lowercase().chain(chars).collect();
    format!("{FRAMING_PHRASE} {lowered}")
}

/// Join paragraphs in beat order, framing the first one.
pub fn assemble(paragraphs: &[String]) -> String {
    let mut kept = paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty());
    let Some(first) = kept.next() else {
        return DEFAULT_PART_SENTENCE.to_string();
    };
    std::iter::once(ensure_framing(first))
        .chain(kept.map(str::to_string))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_default(text: String) -> String {
    if text.trim().is_empty() {
        DEFAULT_PART_SENTENCE.to_string()
    } else {
        text
    }
}

/// Contract call whose exhaustion falls back to the salvaged string field.
async fn text_call<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    request: &GenerationRequest,
    contract: ContractId,
    field: &str,
    token_limit: u32,
) -> Result<(String, bool)> {
    let _permit = ctx.permit().await?;
    let result = ctx
        .generator
        .call_with_validation(request, token_limit, |output| {
            ctx.contracts.check(contract, output)
        })
        .await;
    match result {
        Ok(validated) => Ok((string_field(&validated.text, field).unwrap_or_default(), false)),
        Err(PipelineError::Validation(err)) => {
            warn!(contract = %contract, violations = ?err.violations, "salvaging last output");
            Ok((field_or_raw(&err.last_output, field).unwrap_or_default(), true))
        }
        Err(e) => Err(e),
    }
}

async fn fast_path<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    part: &PartGroup,
    chapter: &ChapterSummary,
) -> Result<String> {
    let request = GenerationRequest::contract(
        build_system_prompt(),
        build_single_chapter_prompt(&part.label, &chapter.summary),
        ContractId::PartSummary,
    );
    let (text, _) = text_call(
        ctx,
        &request,
        ContractId::PartSummary,
        "summary",
        ctx.config.single_chapter_tokens,
    )
    .await?;
    Ok(or_default(text))
}

async fn request_plan<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    chapters: &KeyedChapters,
    intro: &IntroLines,
    token_limit: u32,
) -> Result<NarrativePlan> {
    let input = serde_json::to_string_pretty(&plan_input(chapters, intro))?;
    let (min_beats, max_beats) = beat_bounds(chapters.len());
    let request = GenerationRequest::contract(
        build_planner_system_prompt(),
        build_plan_prompt(&input, chapters.keys(), min_beats, max_beats),
        ContractId::NarrativePlan,
    );

    let validated = {
        let _permit = ctx.permit().await?;
        ctx.generator
            .call_with_validation(&request, token_limit, |output| {
                plan_violations(ctx.contracts, output, chapters.keys())
            })
            .await?
    };

    let plan: NarrativePlan = ctx
        .contracts
        .parse(ContractId::NarrativePlan, &validated.text)?;
    let plan = drop_unknown_references(plan, chapters.keys());
    if plan.narrative_sections.is_empty() {
        return Err(PipelineError::InvalidPlan {
            violations: vec!["no section references a known chapter".to_string()],
        });
    }
    Ok(plan)
}

async fn synthesize_beat<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    plan: &NarrativePlan,
    index: usize,
    chapters: &KeyedChapters,
    token_limit: u32,
) -> Result<(String, bool)> {
    let input = serde_json::to_string_pretty(&beat_input(plan, index, chapters))?;
    let words = (token_limit as f64 / DEFAULT_TOKENS_PER_WORD) as usize;
    let request = GenerationRequest::contract(
        build_system_prompt(),
        build_paragraph_prompt(&input, words),
        ContractId::Paragraph,
    );
    debug!(beat = index, token_limit, "synthesizing beat");
    text_call(ctx, &request, ContractId::Paragraph, "paragraph", token_limit).await
}

async fn legacy<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    part: &PartGroup,
    chapters: &KeyedChapters,
    intro: &IntroLines,
) -> Result<String> {
    let summaries: Vec<String> = chapters.texts().map(str::to_string).collect();
    let intro_lines = intro.lines();
    let all_text = intro_lines
        .iter()
        .chain(&summaries)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    let budget = plan_budget(&all_text, ctx.config.part_ratio);

    let request = GenerationRequest::contract(
        build_system_prompt(),
        build_legacy_part_prompt(&part.label, &intro_lines, &summaries, &budget),
        ContractId::PartSummary,
    );
    let result = {
        let _permit = ctx.permit().await?;
        ctx.generator
            .call_with_validation(&request, budget.token_limit, |output| {
                ctx.contracts.check(ContractId::PartSummary, output)
            })
            .await
    };
    let salvaged = match result {
        Ok(validated) => string_field(&validated.text, "summary"),
        Err(PipelineError::Validation(err)) => {
            warn!(part = %part.id, violations = ?err.violations, "part summary failed its contract");
            string_field(&err.last_output, "summary")
        }
        Err(e) => return Err(e),
    };
    if let Some(text) = salvaged {
        return Ok(text);
    }

    info!(part = %part.id, "falling back to plain prose for part summary");
    let prose = GenerationRequest::plain(
        build_system_prompt(),
        build_legacy_part_prose_prompt(&part.label, &intro_lines, &summaries, &budget),
    );
    let outcome = {
        let _permit = ctx.permit().await?;
        ctx.generator
            .generate_plain_with_retry(&prose, budget.token_limit)
            .await?
    };
    Ok(or_default(clean_raw_text(&outcome.text)))
}

/// Summarize one Part from its chapter summaries.
///
/// Returns the summary and any anomalies worth reporting. Cancellation and
/// service errors are returned as errors; a Part is never assembled from a
/// partial set of beats.
#[instrument(skip_all, fields(part = %part.id))]
pub async fn summarize_part<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    document_id: &str,
    part: &PartGroup,
    chapter_summaries: &[&ChapterSummary],
    intro: &IntroLines,
) -> Result<(PartSummary, Vec<Anomaly>)> {
    let mut anomalies = Vec::new();
    let summary = |strategy, text, plan, paragraphs| PartSummary {
        document_id: document_id.to_string(),
        part_id: part.id.clone(),
        label: part.label.clone(),
        strategy,
        text,
        plan,
        paragraphs,
        modifications: Vec::new(),
    };

    match chapter_summaries {
        [] => {
            debug!("part has no chapter summaries, using the default sentence");
            return Ok((
                summary(
                    PartStrategy::FastPath,
                    DEFAULT_PART_SENTENCE.to_string(),
                    None,
                    Vec::new(),
                ),
                anomalies,
            ));
        }
        [only] => {
            let text = fast_path(ctx, part, only).await?;
            return Ok((summary(PartStrategy::FastPath, text, None, Vec::new()), anomalies));
        }
        _ => {}
    }

    let chapters = KeyedChapters::new(chapter_summaries.iter().map(|c| c.summary.as_str()));
    let all_text = intro
        .lines()
        .into_iter()
        .chain(chapters.texts().map(str::to_string))
        .collect::<Vec<_>>()
        .join(" ");
    let budget = PartBudget::split(
        plan_budget(&all_text, ctx.config.part_ratio).token_limit,
        ctx.config.planning_share,
        ctx.config.planning_floor_tokens,
    );

    let plan = match request_plan(ctx, &chapters, intro, budget.planning).await {
        Ok(plan) => plan,
        Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
        Err(e @ (PipelineError::Validation(_)
        | PipelineError::InvalidPlan { .. }
        | PipelineError::LlmResponseParse(_)
        | PipelineError::JsonExtraction(_)
        | PipelineError::Json(_))) => {
            warn!(error = %e, "narrative plan unusable, using single-shot summary");
            anomalies.push(Anomaly::new(AnomalyKind::PlanFallback, part.id.clone(), e.to_string()));
            let text = legacy(ctx, part, &chapters, intro).await?;
            return Ok((summary(PartStrategy::Legacy, text, None, Vec::new()), anomalies));
        }
        Err(e) => return Err(e),
    };

    let beats = plan.narrative_sections.len();
    let per_beat = budget.per_beat(beats, ctx.config.beat_floor_tokens);
    info!(beats, per_beat, planning = budget.planning, "narrative plan accepted");

    let results = join_all(
        (0..beats).map(|index| synthesize_beat(ctx, &plan, index, &chapters, per_beat)),
    )
    .await;

    let mut paragraphs = Vec::with_capacity(beats);
    for (index, result) in results.into_iter().enumerate() {
        let (paragraph, salvaged) = result?;
        if salvaged {
            anomalies.push(Anomaly::new(
                AnomalyKind::Salvage,
                format!("{}#beat_{index}", part.id),
                "paragraph taken from raw output",
            ));
        }
        paragraphs.push(paragraph);
    }

    let text = assemble(&paragraphs);
    Ok((summary(PartStrategy::Plan, text, Some(plan), paragraphs), anomalies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::generation::{ContractValidator, Generator, LlmRequest, MockLlmClient};
    use crate::stages::prepare::ChapterGroup;
    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    const PLAN_JSON: &str = r#"{
        "overall_narrative_arc": "Από το πρόβλημα στη λύση",
        "protagonist": "οι πολίτες",
        "problem": "η γραφειοκρατία",
        "narrative_sections": [
            {"section_title": "Πρόβλημα", "section_role": "εισαγωγή", "source_chapters": ["kefalaio_0"]},
            {"section_title": "Λύση", "section_role": "ανάπτυξη", "source_chapters": ["kefalaio_1", "kefalaio_5"]}
        ]
    }"#;

    fn part() -> PartGroup {
        PartGroup {
            id: "meros_0".to_string(),
            label: "ΜΕΡΟΣ Α'".to_string(),
            chapters: vec![ChapterGroup {
                id: "meros_0/kefalaio_0".to_string(),
                label: "ΚΕΦΑΛΑΙΟ Α'".to_string(),
                chunks: vec![],
            }],
        }
    }

    fn chapter(index: usize, text: &str) -> ChapterSummary {
        ChapterSummary {
            document_id: "doc".to_string(),
            part_id: "meros_0".to_string(),
            chapter_id: format!("meros_0/kefalaio_{index}"),
            label: format!("ΚΕΦΑΛΑΙΟ {index}"),
            summary: text.to_string(),
            bullet_count: 1,
            retries_used: 0,
            salvaged: false,
        }
    }

    async fn run(
        client: &MockLlmClient,
        chapters: &[ChapterSummary],
        cancel: CancellationToken,
    ) -> Result<(PartSummary, Vec<Anomaly>)> {
        let config = OrchestratorConfig::default();
        let contracts = ContractValidator::new().expect("contracts");
        let limiter = Semaphore::new(config.max_concurrency);
        let generator = Generator::new(client, config.retry.clone(), cancel);
        let ctx = StageContext {
            generator: &generator,
            contracts: &contracts,
            config: &config,
            limiter: &limiter,
        };
        let refs: Vec<&ChapterSummary> = chapters.iter().collect();
        summarize_part(&ctx, "doc", &part(), &refs, &IntroLines::default()).await
    }

    fn by_contract(plan: &'static str) -> MockLlmClient {
        MockLlmClient::from_fn(move |request: &LlmRequest| {
            Ok(match request.contract {
                Some(ContractId::NarrativePlan) => plan.to_string(),
                Some(ContractId::Paragraph) if request.prompt.contains("\"current_beat_index\": 0") => {
                    r#"{"paragraph": "Να μειωθεί η γραφειοκρατία."}"#.to_string()
                }
                Some(ContractId::Paragraph) => r#"{"paragraph": "Οι πολίτες εξυπηρετούνται ψηφιακά."}"#.to_string(),
                Some(ContractId::PartSummary) => r#"{"summary": "Ο σκοπός του μέρους είναι η απλούστευση."}"#.to_string(),
                _ => "άγνωστο".to_string(),
            })
        })
    }

    #[test]
    fn test_budget_split() {
        let budget = PartBudget::split(4000, 0.3, 800);
        assert_eq!(budget, PartBudget { total: 4000, planning: 1200, synthesis: 2800 });

        let small = PartBudget::split(1000, 0.3, 800);
        assert_eq!(small, PartBudget { total: 1600, planning: 800, synthesis: 800 });
        assert_eq!(small.per_beat(4, 600), 600);
        assert_eq!(budget.per_beat(2, 600), 1400);
    }

    #[test]
    fn test_ensure_framing() {
        assert_eq!(
            ensure_framing("Η στήριξη των πολιτών."),
            "Ο σκοπός του μέρους είναι η στήριξη των πολιτών."
        );
        assert_eq!(ensure_framing("Ο σκοπός του μέρους είναι Χ."), "Ο σκοπός του μέρους είναι Χ.");
    }

    #[test]
    fn test_assemble() {
        assert_eq!(assemble(&[]), DEFAULT_PART_SENTENCE);
        assert_eq!(assemble(&["  ".to_string()]), DEFAULT_PART_SENTENCE);
        assert_eq!(
            assemble(&["Να γίνει Α.".to_string(), "Β.".to_string()]),
            "Ο σκοπός του μέρους είναι να γίνει Α.\n\nΒ."
        );
    }

    #[tokio::test]
    async fn test_single_chapter_takes_fast_path() {
        let client = by_contract(PLAN_JSON);
        let (summary, anomalies) = run(&client, &[chapter(0, "Μόνο κεφάλαιο.")], CancellationToken::new())
            .await
            .expect("part");
        assert_eq!(summary.strategy, PartStrategy::FastPath);
        assert_eq!(summary.text, "Ο σκοπός του μέρους είναι η απλούστευση.");
        assert!(anomalies.is_empty());
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_plan_then_paragraphs() {
        let client = by_contract(PLAN_JSON);
        let (summary, _) = run(
            &client,
            &[chapter(0, "Πρώτο."), chapter(1, "Δεύτερο.")],
            CancellationToken::new(),
        )
        .await
        .expect("part");

        assert_eq!(summary.strategy, PartStrategy::Plan);
        let plan = summary.plan.expect("plan");
        assert_eq!(plan.narrative_sections[1].source_chapters, vec!["kefalaio_1"]);
        assert_eq!(
            summary.text,
            "Ο σκοπός του μέρους είναι να μειωθεί η γραφειοκρατία.\n\n\
             Οι πολίτες εξυπηρετούνται ψηφιακά."
        );
        // One plan call and one call per beat.
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn test_rejected_plan_falls_back_to_legacy() {
        let numeric = r#"{"overall_narrative_arc": "α", "protagonist": "β", "problem": "γ",
            "narrative_sections": [{"section_title": "Α", "section_role": "ρ", "source_chapters": [0]}]}"#;
        let client = by_contract(numeric);
        let (summary, anomalies) = run(
            &client,
            &[chapter(0, "Πρώτο."), chapter(1, "Δεύτερο.")],
            CancellationToken::new(),
        )
        .await
        .expect("part");

        assert_eq!(summary.strategy, PartStrategy::Legacy);
        assert_eq!(summary.text, "Ο σκοπός του μέρους είναι η απλούστευση.");
        assert_eq!(anomalies[0].kind, AnomalyKind::PlanFallback);
        // Three plan attempts, then one legacy call.
        assert_eq!(client.request_count(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_part_is_error() {
        let client = by_contract(PLAN_JSON);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run(&client, &[chapter(0, "Α."), chapter(1, "Β.")], cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(client.request_count(), 0);
    }
}
