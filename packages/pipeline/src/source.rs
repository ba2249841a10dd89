//! Where documents come from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub articles: Vec<SourceArticle>,
}

impl SourceDocument {
    /// Read a document from a JSON file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let document: SourceDocument = serde_json::from_str(&raw)?;
        if document.articles.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "{}: document has no articles",
                path.display()
            )));
        }
        Ok(document)
    }
}

/// Supplies the articles of a document.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_articles(&self, document_id: &str) -> Result<SourceDocument>;
}

/// Reads `{dir}/{document_id}.json`.
#[derive(Debug, Clone)]
pub struct JsonArticleSource {
    dir: PathBuf,
}

impl JsonArticleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArticleSource for JsonArticleSource {
    async fn fetch_articles(&self, document_id: &str) -> Result<SourceDocument> {
        if document_id.contains(['/', '\\']) || document_id.starts_with('.') {
            return Err(PipelineError::InvalidInput(format!(
                "invalid document id '{document_id}'"
            )));
        }
        let path = self.dir.join(format!("{document_id}.json"));
        debug!(document = document_id, path = %path.display(), "reading document");
        SourceDocument::from_file(&path).await
    }
}

/// Documents held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<String, SourceDocument>,
}

impl InMemorySource {
    pub fn new(documents: impl IntoIterator<Item = SourceDocument>) -> Self {
        Self {
            documents: documents.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }
}

#[async_trait]
impl ArticleSource for InMemorySource {
    async fn fetch_articles(&self, document_id: &str) -> Result<SourceDocument> {
        self.documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown document '{document_id}'")))
    }
}
