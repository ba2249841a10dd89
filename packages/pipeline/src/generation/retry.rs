//! Contract validation with retries, and completeness retries for prose.
//!
//! Sampling and the retry budget are passed in with every call. Nothing here
//! keeps state between invocations, so concurrent calls cannot affect each
//! other's temperature.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result, ValidationError};
use crate::generation::client::{LlmClient, LlmRequest};
use crate::generation::contracts::ContractId;
use crate::models::TokenUsage;

pub const INITIAL_TEMPERATURE: f64 = 0.01;
pub const RETRY_TEMPERATURE: f64 = 0.2;
pub const INITIAL_TOP_P: f64 = 0.95;
pub const RETRY_TOP_P: f64 = 0.9;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_PLAIN_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub top_p: f64,
}

/// Retry budget and sampling for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub plain_max_retries: u32,
    pub initial: Sampling,
    pub retry: Sampling,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            plain_max_retries: DEFAULT_PLAIN_MAX_RETRIES,
            initial: Sampling {
                temperature: INITIAL_TEMPERATURE,
                top_p: INITIAL_TOP_P,
            },
            retry: Sampling {
                temperature: RETRY_TEMPERATURE,
                top_p: RETRY_TOP_P,
            },
        }
    }
}

impl RetryPolicy {
    pub fn sampling_for(&self, attempt: u32) -> Sampling {
        if attempt == 0 {
            self.initial
        } else {
            self.retry
        }
    }
}

/// What the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Free prose, executed once.
    Plain,
    /// JSON that must satisfy the named contract.
    Contract(ContractId),
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub kind: RequestKind,
}

impl GenerationRequest {
    pub fn plain(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            kind: RequestKind::Plain,
        }
    }

    pub fn contract(
        system: impl Into<String>,
        prompt: impl Into<String>,
        contract: ContractId,
    ) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            kind: RequestKind::Contract(contract),
        }
    }

    fn contract_id(&self) -> Option<ContractId> {
        match self.kind {
            RequestKind::Plain => None,
            RequestKind::Contract(id) => Some(id),
        }
    }
}

/// Output that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub text: String,
    pub retries_used: u32,
}

/// Prose output and whether it still ends mid-sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainOutcome {
    pub text: String,
    pub retries_used: u32,
    pub truncated: bool,
}

const SENTENCE_ENDINGS: &[&str] = &[".", "?", "!", "…", ";", ".”", ".»", "?»", "!»", "…»", ".\"", "?\"", "!\""];

/// Whether trimmed prose ends with sentence-final punctuation.
///
/// `;` is the Greek question mark.
pub fn is_complete(text: &str) -> bool {
    let trimmed = text.trim_end();
    !trimmed.is_empty() && SENTENCE_ENDINGS.iter().any(|end| trimmed.ends_with(end))
}

/// Issues generation calls for one run.
///
/// Checks the cancellation token before every call and accumulates token
/// usage across calls.
pub struct Generator<'a, C: LlmClient + ?Sized> {
    client: &'a C,
    policy: RetryPolicy,
    cancel: CancellationToken,
    usage: Mutex<TokenUsage>,
}

impl<'a, C: LlmClient + ?Sized> Generator<'a, C> {
    pub fn new(client: &'a C, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            policy,
            cancel,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }

    async fn complete(
        &self,
        request: &GenerationRequest,
        token_limit: u32,
        sampling: Sampling,
    ) -> Result<String> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let llm_request = LlmRequest {
            system: request.system.clone(),
            prompt: request.prompt.clone(),
            max_tokens: token_limit,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            contract: request.contract_id(),
        };
        let response = self.client.complete(&llm_request).await?;
        if let Ok(mut usage) = self.usage.lock() {
            usage.add(&TokenUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            });
        }
        Ok(response.content)
    }

    /// Run `request`, retrying contract requests until `validate` is happy.
    ///
    /// Plain requests run once and are returned as-is. Contract requests run
    /// at most `max_retries + 1` times; exhaustion returns
    /// [`PipelineError::Validation`] carrying the last raw output.
    pub async fn call_with_validation<V>(
        &self,
        request: &GenerationRequest,
        token_limit: u32,
        validate: V,
    ) -> Result<Validated>
    where
        V: Fn(&str) -> Vec<String>,
    {
        let RequestKind::Contract(contract) = request.kind else {
            let text = self
                .complete(request, token_limit, self.policy.initial)
                .await?;
            return Ok(Validated {
                text,
                retries_used: 0,
            });
        };

        let attempts = self.policy.max_retries + 1;
        let mut last_output = String::new();
        let mut violations = Vec::new();

        for attempt in 0..attempts {
            let sampling = self.policy.sampling_for(attempt);
            debug!(
                contract = %contract,
                attempt,
                temperature = sampling.temperature,
                "contract request"
            );
            let output = self.complete(request, token_limit, sampling).await?;
            let found = validate(&output);
            if found.is_empty() {
                return Ok(Validated {
                    text: output,
                    retries_used: attempt,
                });
            }
            warn!(
                contract = %contract,
                attempt,
                violations = ?found,
                "output violates contract"
            );
            last_output = output;
            violations = found;
        }

        Err(PipelineError::Validation(ValidationError {
            last_output,
            violations,
            attempts,
        }))
    }

    /// Generate prose, re-asking from scratch while it ends mid-sentence.
    ///
    /// Never fails on incompleteness: the last output is returned with
    /// `truncated` set.
    pub async fn generate_plain_with_retry(
        &self,
        request: &GenerationRequest,
        token_limit: u32,
    ) -> Result<PlainOutcome> {
        let mut text = self
            .complete(request, token_limit, self.policy.initial)
            .await?;
        let mut retries_used = 0;

        while !is_complete(&text) && retries_used < self.policy.plain_max_retries {
            retries_used += 1;
            debug!(attempt = retries_used, "prose ended mid-sentence, regenerating");
            text = self
                .complete(request, token_limit, self.policy.retry)
                .await?;
        }

        let truncated = !is_complete(&text);
        if truncated {
            warn!(retries_used, "prose still incomplete after retries");
        }
        Ok(PlainOutcome {
            text,
            retries_used,
            truncated,
        })
    }
}
