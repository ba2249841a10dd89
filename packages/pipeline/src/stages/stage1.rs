//! Stage 1: one structured record per chunk.

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::budget::{plan, word_count};
use crate::classifier::Label;
use crate::error::{PipelineError, Result};
use crate::generation::contracts::parse_loose;
use crate::generation::prompt::{
    build_law_modification_prompt, build_new_provision_prompt, build_system_prompt,
};
use crate::generation::{ContractId, GenerationRequest, LlmClient};
use crate::models::{
    PassThroughReason, Stage1Entry, Stage1Outcome, Stage1Record, EMPTY_ARTICLE_MARKER,
    GENERATION_FAILED_MARKER,
};
use crate::stages::prepare::PreparedChunk;
use crate::stages::StageContext;

/// Room for the JSON wrapper around a record, whatever the chunk length.
const MIN_RECORD_TOKENS: u32 = 300;

/// Decide what happens to a chunk without calling the model, if possible.
fn local_outcome(chunk: &PreparedChunk, min_words: usize) -> Option<Stage1Outcome> {
    if chunk.is_empty() {
        return Some(Stage1Outcome::Skipped {
            marker: EMPTY_ARTICLE_MARKER.to_string(),
        });
    }
    let label = chunk.classification.label;
    if label.is_intro() {
        return Some(Stage1Outcome::PassedThrough {
            reason: PassThroughReason::Intro,
            text: chunk.body.trim().to_string(),
        });
    }
    if label == Label::NewProvision && word_count(&chunk.body) < min_words {
        return Some(Stage1Outcome::PassedThrough {
            reason: PassThroughReason::Short,
            text: chunk.body.trim().to_string(),
        });
    }
    None
}

fn request_for(chunk: &PreparedChunk, ratio: f64) -> (GenerationRequest, ContractId, u32) {
    let budget = plan(&chunk.body, ratio);
    let classification = &chunk.classification;
    let (prompt, contract) = match classification.label {
        Label::ModifiesLaw => {
            let citation = classification.citation.as_ref().map(|c| c.reference());
            (
                build_law_modification_prompt(
                    &chunk.body,
                    citation.as_deref(),
                    classification.quoted_change.as_ref(),
                    &budget,
                ),
                ContractId::LawModification,
            )
        }
        _ => (
            build_new_provision_prompt(&chunk.article_title, &chunk.body, &budget),
            ContractId::NewProvision,
        ),
    };
    (
        GenerationRequest::contract(build_system_prompt(), prompt, contract),
        contract,
        budget.token_limit.max(MIN_RECORD_TOKENS),
    )
}

fn into_record<T: DeserializeOwned, C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    contract: ContractId,
    output: &str,
    wrap: fn(T) -> Stage1Record,
) -> Result<Stage1Record> {
    ctx.contracts.parse::<T>(contract, output).map(wrap)
}

fn parse_record<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    contract: ContractId,
    output: &str,
) -> Result<Stage1Record> {
    match contract {
        ContractId::LawModification => {
            into_record(ctx, contract, output, Stage1Record::LawModification)
        }
        _ => into_record(ctx, contract, output, Stage1Record::NewProvision),
    }
}

fn salvage_record(contract: ContractId, output: &str) -> Result<Stage1Record> {
    match contract {
        ContractId::LawModification => {
            parse_loose(contract, output).map(Stage1Record::LawModification)
        }
        _ => parse_loose(contract, output).map(Stage1Record::NewProvision),
    }
}

async fn generate<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    chunk: &PreparedChunk,
) -> Result<Stage1Outcome> {
    let (request, contract, token_limit) = request_for(chunk, ctx.config.stage1_ratio);

    let _permit = ctx.permit().await?;
    let result = ctx
        .generator
        .call_with_validation(&request, token_limit, |output| {
            ctx.contracts.check(contract, output)
        })
        .await;

    match result {
        Ok(validated) => {
            let record = parse_record(ctx, contract, &validated.text)?;
            Ok(Stage1Outcome::Summarized {
                record,
                retries_used: validated.retries_used,
                salvaged: false,
            })
        }
        Err(PipelineError::Validation(err)) => match salvage_record(contract, &err.last_output) {
            Ok(record) => {
                info!(chunk = %chunk.chunk_id, contract = %contract, "salvaged record from last output");
                Ok(Stage1Outcome::Summarized {
                    record,
                    retries_used: err.attempts.saturating_sub(1),
                    salvaged: true,
                })
            }
            Err(salvage_err) => {
                warn!(
                    chunk = %chunk.chunk_id,
                    contract = %contract,
                    error = %salvage_err,
                    violations = ?err.violations,
                    "record could not be salvaged"
                );
                Ok(Stage1Outcome::Placeholder {
                    marker: GENERATION_FAILED_MARKER.to_string(),
                    violations: err.violations,
                })
            }
        },
        Err(e) => Err(e),
    }
}

/// Produce the Stage-1 entry for one chunk.
///
/// Only cancellation is returned as an error; every other failure is kept
/// in the entry's outcome so the rest of the document can proceed.
pub async fn summarize_chunk<C: LlmClient + ?Sized>(
    ctx: &StageContext<'_, C>,
    document_id: &str,
    chunk: &PreparedChunk,
) -> Result<Stage1Entry> {
    let outcome = match local_outcome(chunk, ctx.config.min_words_for_summary) {
        Some(outcome) => outcome,
        None => match generate(ctx, chunk).await {
            Ok(outcome) => outcome,
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => {
                warn!(chunk = %chunk.chunk_id, error = %e, "chunk generation failed");
                Stage1Outcome::Failed {
                    marker: GENERATION_FAILED_MARKER.to_string(),
                    error: e.to_string(),
                }
            }
        },
    };
    debug!(chunk = %chunk.chunk_id, label = ?chunk.classification.label, "stage 1 done");

    let unverified_excerpt = chunk
        .classification
        .quoted_change
        .as_ref()
        .filter(|q| !q.verified)
        .map(|q| q.text.clone());

    Ok(Stage1Entry {
        document_id: document_id.to_string(),
        chunk_id: chunk.chunk_id.clone(),
        article_id: chunk.article_id.clone(),
        article_title: chunk.article_title.clone(),
        article_number: chunk.article_number,
        part_id: chunk.part_id.clone(),
        chapter_id: chunk.chapter_id.clone(),
        label: chunk.classification.label,
        unverified_excerpt,
        outcome,
    })
}
