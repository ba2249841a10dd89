pub mod budget;
pub mod classifier;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod modifications;
pub mod orchestrator;
pub mod source;
pub mod stages;

pub use classifier::{Classification, Classifier, Label};
pub use config::OrchestratorConfig;
pub use error::{PipelineError, Result};
pub use generation::{AnthropicClient, GenerationConfig, LlmClient};
pub use models::{Anomaly, AnomalyKind, DocumentSummary, PartStrategy, Stage1Outcome};
pub use orchestrator::{BatchItem, Orchestrator};
pub use source::{ArticleSource, InMemorySource, JsonArticleSource, SourceArticle, SourceDocument};
