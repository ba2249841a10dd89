mod client;
mod config;
pub mod contracts;
pub mod json_extract;
pub mod prompt;
pub mod retry;

pub use client::{AnthropicClient, LlmClient, LlmRequest, LlmResponse, Message, Role, CONTRACT_HEADER};
#[cfg(any(test, feature = "test-utils"))]
pub use client::test_support::MockLlmClient;
pub use config::{GenerationConfig, GenerationConfigBuilder};
pub use contracts::{ContractId, ContractValidator};
pub use retry::{
    GenerationRequest, Generator, PlainOutcome, RequestKind, RetryPolicy, Sampling, Validated,
};
