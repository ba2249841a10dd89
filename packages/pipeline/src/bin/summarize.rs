use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nomothesia_pipeline::{
    AnthropicClient, GenerationConfig, Orchestrator, OrchestratorConfig, SourceDocument,
};

/// Summarize a Greek bill into per-Part narrative text.
#[derive(Parser, Debug)]
#[command(name = "nomothesia-summarize", version)]
struct Args {
    /// Document JSON: `{id, title, articles: [{id, title, content}]}`
    input: PathBuf,

    /// Where to write the summary JSON (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Generation calls in flight at once
    #[arg(long)]
    max_concurrency: Option<usize>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let generation = match GenerationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    let client = match AnthropicClient::new(&generation) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to create generation client");
            std::process::exit(1);
        }
    };

    let mut config = OrchestratorConfig::from_env();
    if let Some(max_concurrency) = args.max_concurrency {
        config = config.with_max_concurrency(max_concurrency);
    }

    let orchestrator = match Orchestrator::new(&client, &config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to load output contracts");
            std::process::exit(1);
        }
    };

    let document = match SourceDocument::from_file(&args.input).await {
        Ok(document) => document,
        Err(e) => {
            tracing::error!(error = %e, path = %args.input.display(), "failed to read document");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling generation");
            on_signal.cancel();
        }
    });

    let summary = match orchestrator.run_document(&document, cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(document = %document.id, error = %e, "summarization failed");
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&summary) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize summary");
            std::process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = tokio::fs::write(path, json).await {
                tracing::error!(error = %e, path = %path.display(), "failed to write summary");
                std::process::exit(1);
            }
            tracing::info!(path = %path.display(), "summary written");
        }
        None => println!("{json}"),
    }
}
