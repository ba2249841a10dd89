//! The three generation stages and the preparation that feeds them.
//!
//! Stage 1 summarizes chunks, Stage 2 folds a chapter's records into one
//! summary, Stage 3 turns a Part's chapter summaries into narrative prose.

pub mod plan;
pub mod prepare;
pub mod stage1;
pub mod stage2;
pub mod stage3;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::OrchestratorConfig;
use crate::error::{PipelineError, Result};
use crate::generation::{ContractValidator, Generator, LlmClient};

/// What every stage needs to issue and check generation calls.
pub struct StageContext<'a, C: LlmClient + ?Sized> {
    pub generator: &'a Generator<'a, C>,
    pub contracts: &'a ContractValidator,
    pub config: &'a OrchestratorConfig,
    /// Bounds generation calls in flight across concurrent tasks.
    pub limiter: &'a Semaphore,
}

impl<'a, C: LlmClient + ?Sized> StageContext<'a, C> {
    /// Wait for a free generation slot.
    pub async fn permit(&self) -> Result<SemaphorePermit<'a>> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| PipelineError::Cancelled)
    }
}

impl<C: LlmClient + ?Sized> Clone for StageContext<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: LlmClient + ?Sized> Copy for StageContext<'_, C> {}
